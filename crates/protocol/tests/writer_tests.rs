//! Integration tests for the batched register writer
//!
//! Drives write sessions against an in-memory transport and checks how
//! sequences are split into transfers:
//! - Batch limits and transfer counts
//! - Barrier handling
//! - Failure and short-write handling
//! - Image assembly properties

use protocol::{
    BatchConfig, BulkOut, BulkTransport, RegisterWrite, TransferCompletion, TransferStatus,
    TransportError, WriteError, WriteSession,
};
use std::collections::VecDeque;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

/// Transport that queues submissions until the test completes them
#[derive(Default)]
struct QueueTransport {
    pending: VecDeque<BulkOut>,
    history: Vec<Vec<u8>>,
    fail_after: Option<usize>,
}

impl BulkTransport for QueueTransport {
    type Device = &'static str;

    fn submit_bulk_out(
        &mut self,
        _device: &&'static str,
        transfer: BulkOut,
    ) -> Result<(), TransportError> {
        if self.fail_after == Some(self.history.len()) {
            return Err(TransportError::Other("out of memory".into()));
        }
        self.history.push(transfer.data.clone());
        self.pending.push_back(transfer);
        Ok(())
    }
}

type Outcome = Arc<Mutex<Option<Result<(), WriteError>>>>;

fn config(max_batch: usize) -> BatchConfig {
    BatchConfig {
        max_batch: NonZeroUsize::new(max_batch).unwrap(),
        ..BatchConfig::default()
    }
}

fn regs(count: usize) -> Vec<RegisterWrite> {
    (0..count)
        .map(|i| RegisterWrite::new(0x80 + (i % 0x7f) as u8, i as u8))
        .collect()
}

/// Run a session to the end, completing each transfer with `complete`
fn run_with<F>(
    transport: &mut QueueTransport,
    writes: Vec<RegisterWrite>,
    max_batch: usize,
    mut complete: F,
) -> Result<(), WriteError>
where
    F: FnMut(usize, BulkOut) -> TransferCompletion,
{
    let outcome: Outcome = Arc::default();
    let sink = outcome.clone();
    let calls = Arc::new(Mutex::new(0usize));
    let counter = calls.clone();

    let mut session = WriteSession::start(
        transport,
        "sensor",
        writes,
        config(max_batch),
        move |device: &&'static str, result| {
            assert_eq!(*device, "sensor");
            *counter.lock().unwrap() += 1;
            *sink.lock().unwrap() = Some(result);
        },
    );

    let mut index = 0;
    while let Some(s) = session {
        let transfer = transport
            .pending
            .pop_front()
            .expect("session alive without a transfer in flight");
        assert!(transport.pending.is_empty(), "more than one transfer in flight");
        let completion = complete(index, transfer);
        index += 1;
        session = s.on_transfer_complete(transport, completion);
    }

    assert_eq!(*calls.lock().unwrap(), 1, "callback must fire exactly once");
    let result = outcome.lock().unwrap().take();
    result.expect("callback never fired")
}

fn run(
    transport: &mut QueueTransport,
    writes: Vec<RegisterWrite>,
    max_batch: usize,
) -> Result<(), WriteError> {
    run_with(transport, writes, max_batch, |_, t| {
        TransferCompletion::completed(t.data)
    })
}

fn unpack(data: &[u8]) -> Vec<RegisterWrite> {
    data.chunks_exact(2)
        .map(|pair| RegisterWrite::new(pair[0], pair[1]))
        .collect()
}

mod batching {
    use super::*;

    #[test]
    fn test_small_sequence_single_transfer() {
        for n in 1..=16 {
            let mut transport = QueueTransport::default();
            let writes = regs(n);

            assert_eq!(run(&mut transport, writes.clone(), 16), Ok(()));
            assert_eq!(transport.history.len(), 1);
            assert_eq!(unpack(&transport.history[0]), writes);
        }
    }

    #[test]
    fn test_large_sequence_split_at_limit() {
        for n in [17usize, 32, 33, 100] {
            let mut transport = QueueTransport::default();
            let writes = regs(n);

            assert_eq!(run(&mut transport, writes.clone(), 16), Ok(()));
            assert_eq!(transport.history.len(), n.div_ceil(16));

            let (last, full) = transport.history.split_last().unwrap();
            assert!(full.iter().all(|t| t.len() == 32));
            assert!(!last.is_empty() && last.len() <= 32);

            let sent: Vec<_> = transport.history.iter().flat_map(|t| unpack(t)).collect();
            assert_eq!(sent, writes);
        }
    }

    #[test]
    fn test_limit_of_one() {
        let mut transport = QueueTransport::default();
        let writes = regs(5);

        assert_eq!(run(&mut transport, writes, 1), Ok(()));
        assert_eq!(transport.history.len(), 5);
        assert!(transport.history.iter().all(|t| t.len() == 2));
    }

    #[test]
    fn test_empty_sequence() {
        let mut transport = QueueTransport::default();
        assert_eq!(run(&mut transport, Vec::new(), 16), Ok(()));
        assert!(transport.history.is_empty());
    }
}

mod barriers {
    use super::*;

    #[test]
    fn test_barrier_splits_transfer() {
        let mut transport = QueueTransport::default();
        let mut writes = regs(3);
        writes.insert(1, RegisterWrite::barrier());

        assert_eq!(run(&mut transport, writes.clone(), 16), Ok(()));
        assert_eq!(transport.history.len(), 2);
        assert_eq!(unpack(&transport.history[0]), vec![writes[0]]);
        assert_eq!(unpack(&transport.history[1]), writes[2..].to_vec());
    }

    #[test]
    fn test_barriers_never_transmitted() {
        let mut transport = QueueTransport::default();
        let writes = vec![
            RegisterWrite::barrier(),
            RegisterWrite::new(0x80, 1),
            RegisterWrite::barrier(),
            RegisterWrite::barrier(),
            RegisterWrite::new(0x81, 2),
            RegisterWrite::new(0x82, 3),
            RegisterWrite::barrier(),
        ];

        assert_eq!(run(&mut transport, writes, 16), Ok(()));
        let sent: Vec<_> = transport.history.iter().flat_map(|t| unpack(t)).collect();
        assert!(sent.iter().all(|w| !w.is_barrier()));
        assert_eq!(sent.len(), 3);
        assert_eq!(transport.history.len(), 2);
    }

    #[test]
    fn test_only_barriers() {
        let mut transport = QueueTransport::default();
        let writes = vec![RegisterWrite::barrier(); 4];

        assert_eq!(run(&mut transport, writes, 16), Ok(()));
        assert!(transport.history.is_empty());
    }

    #[test]
    fn test_no_transfer_spans_a_barrier() {
        // Blocks of varying length separated by barriers
        let mut writes = Vec::new();
        for (block, len) in [5usize, 20, 1, 16, 17].into_iter().enumerate() {
            for i in 0..len {
                writes.push(RegisterWrite::new(0x80 + block as u8, i as u8));
            }
            writes.push(RegisterWrite::barrier());
        }

        let mut transport = QueueTransport::default();
        assert_eq!(run(&mut transport, writes, 16), Ok(()));

        for transfer in &transport.history {
            let blocks: Vec<u8> = unpack(transfer).iter().map(|w| w.reg).collect();
            assert!(blocks.windows(2).all(|w| w[0] == w[1]));
            assert!(blocks.len() <= 16);
        }
        // 5 | 16+4 | 1 | 16 | 16+1
        assert_eq!(transport.history.len(), 7);
    }
}

mod failures {
    use super::*;

    #[test]
    fn test_short_write_is_protocol_error() {
        let mut transport = QueueTransport::default();

        let result = run_with(&mut transport, regs(40), 16, |index, t| {
            let mut completion = TransferCompletion::completed(t.data);
            if index == 1 {
                completion.actual -= 2;
            }
            completion
        });

        assert_eq!(
            result,
            Err(WriteError::Protocol {
                requested: 32,
                actual: 30
            })
        );
        assert_eq!(result.unwrap_err().errno(), -71);
        // Third batch never submitted
        assert_eq!(transport.history.len(), 2);
    }

    #[test]
    fn test_transfer_error_is_io_error() {
        for status in [
            TransferStatus::Error,
            TransferStatus::TimedOut,
            TransferStatus::Stall,
            TransferStatus::NoDevice,
            TransferStatus::Cancelled,
        ] {
            let mut transport = QueueTransport::default();
            let result = run_with(&mut transport, regs(20), 16, |_, t| {
                TransferCompletion::failed(t.data, status)
            });

            assert!(matches!(result, Err(WriteError::Io(_))));
            assert_eq!(result.unwrap_err().errno(), -5);
            assert_eq!(transport.history.len(), 1);
        }
    }

    #[test]
    fn test_submission_failure_mid_sequence() {
        let mut transport = QueueTransport {
            fail_after: Some(2),
            ..Default::default()
        };

        let result = run(&mut transport, regs(48), 16);

        assert!(matches!(result, Err(WriteError::Io(ref msg)) if msg.contains("out of memory")));
        assert_eq!(transport.history.len(), 2);
    }

    #[test]
    fn test_submission_failure_on_first_transfer() {
        let mut transport = QueueTransport {
            fail_after: Some(0),
            ..Default::default()
        };

        let result = run(&mut transport, regs(3), 16);

        assert!(matches!(result, Err(WriteError::Io(_))));
        assert!(transport.history.is_empty());
    }
}

mod image {
    use protocol::{Image, assemble_image};

    #[test]
    fn test_reference_frame() {
        let mut out = [0u8; 4];
        assemble_image(&[0x12, 0x34], 2, 2, &mut out).unwrap();
        assert_eq!(out, [72, 144, 36, 108]);
    }

    #[test]
    fn test_deterministic() {
        let raw: Vec<u8> = (0..=255u8).cycle().take(128 * 4).collect();
        let first = Image::assemble(&raw, 128, 8).unwrap();
        let second = Image::assemble(&raw, 128, 8).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_every_pixel_is_a_scaled_sample() {
        let raw: Vec<u8> = (0..=255u8).cycle().take(64 * 8).collect();
        let image = Image::assemble(&raw, 64, 16).unwrap();
        assert!(image.data.iter().all(|p| p % 36 == 0 && *p <= 252));
    }
}
