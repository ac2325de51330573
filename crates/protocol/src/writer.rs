//! Batched register writer
//!
//! A [`WriteSession`] drives one register write sequence to completion. Each
//! step submits at most one transfer and then returns; the session is resumed
//! by passing it the transfer's completion. Nothing blocks and the call stack
//! does not grow with the length of the sequence.
//!
//! ```
//! use protocol::{BatchConfig, BulkOut, BulkTransport, RegisterWrite, TransferCompletion};
//! use protocol::{TransportError, WriteSession};
//!
//! struct Loopback(Vec<Vec<u8>>);
//!
//! impl BulkTransport for Loopback {
//!     type Device = ();
//!     fn submit_bulk_out(&mut self, _: &(), t: BulkOut) -> Result<(), TransportError> {
//!         self.0.push(t.data);
//!         Ok(())
//!     }
//! }
//!
//! let writes = [RegisterWrite::new(0x80, 0x01), RegisterWrite::new(0x81, 0x02)];
//! let mut transport = Loopback(Vec::new());
//! let mut session =
//!     WriteSession::start(&mut transport, (), &writes[..], BatchConfig::default(), |_, r| {
//!         assert!(r.is_ok())
//!     });
//!
//! while let Some(s) = session {
//!     let data = transport.0.remove(0);
//!     session = s.on_transfer_complete(&mut transport, TransferCompletion::completed(data));
//! }
//! ```

use crate::error::WriteError;
use crate::regwrite::{BatchConfig, RegisterWrite, next_batch, pack_batch};
use crate::transport::{BulkOut, BulkTransport, TransferCompletion};
use tracing::{debug, warn};

/// Completion callback, invoked exactly once per session
pub type WriteCallback<D> = Box<dyn FnOnce(&D, Result<(), WriteError>) + Send>;

/// Progress state of one register write sequence
///
/// Exists only while a transfer is in flight. Every path that ends the
/// sequence consumes the session after invoking the callback.
pub struct WriteSession<D, W> {
    device: D,
    writes: W,
    offset: usize,
    in_flight: usize,
    config: BatchConfig,
    callback: WriteCallback<D>,
}

impl<D, W> WriteSession<D, W>
where
    W: AsRef<[RegisterWrite]>,
{
    /// Start writing `writes` to `device`
    ///
    /// Returns `None` if the sequence finished without needing a transfer
    /// (empty or barriers only) or if the first submission failed; the
    /// callback has already run in both cases.
    pub fn start<T, F>(
        transport: &mut T,
        device: D,
        writes: W,
        config: BatchConfig,
        callback: F,
    ) -> Option<Self>
    where
        T: BulkTransport<Device = D> + ?Sized,
        F: FnOnce(&D, Result<(), WriteError>) + Send + 'static,
    {
        debug!("write {} regs", writes.as_ref().len());
        let session = Self {
            device,
            writes,
            offset: 0,
            in_flight: 0,
            config,
            callback: Box::new(callback),
        };
        session.submit_next(transport)
    }

    /// Resume the session with the completion of its in-flight transfer
    ///
    /// The transfer buffer is released here whatever the outcome. Returns the
    /// session if another transfer was submitted.
    pub fn on_transfer_complete<T>(
        mut self,
        transport: &mut T,
        completion: TransferCompletion,
    ) -> Option<Self>
    where
        T: BulkTransport<Device = D> + ?Sized,
    {
        let TransferCompletion {
            status,
            requested,
            actual,
            data,
        } = completion;
        drop(data);

        if !status.is_completed() {
            warn!(
                "register write transfer failed at offset {}: {:?}",
                self.offset, status
            );
            self.finish(Err(WriteError::Io(format!("transfer {:?}", status))));
            return None;
        }

        if requested != actual {
            warn!(
                "short register write at offset {}: {} of {} bytes",
                self.offset, actual, requested
            );
            self.finish(Err(WriteError::Protocol { requested, actual }));
            return None;
        }

        self.offset += self.in_flight;
        self.in_flight = 0;
        self.submit_next(transport)
    }

    /// Index of the first write not yet confirmed by the device
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Number of writes in the transfer currently in flight
    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    fn submit_next<T>(mut self, transport: &mut T) -> Option<Self>
    where
        T: BulkTransport<Device = D> + ?Sized,
    {
        let Some(batch) = next_batch(self.writes.as_ref(), self.offset, self.config.max_batch)
        else {
            self.offset = self.writes.as_ref().len();
            debug!("all registers written");
            self.finish(Ok(()));
            return None;
        };

        let data = pack_batch(&self.writes.as_ref()[batch.clone()]);
        debug!(
            "submitting {} register writes ({}..{}) in {} bytes",
            batch.len(),
            batch.start,
            batch.end,
            data.len()
        );

        let transfer = BulkOut {
            endpoint: self.config.endpoint,
            data,
            timeout: self.config.timeout,
        };
        if let Err(e) = transport.submit_bulk_out(&self.device, transfer) {
            warn!("failed to submit register write transfer: {}", e);
            self.finish(Err(e.into()));
            return None;
        }

        self.offset = batch.start;
        self.in_flight = batch.len();
        Some(self)
    }

    fn finish(self, result: Result<(), WriteError>) {
        let Self {
            device, callback, ..
        } = self;
        callback(&device, result);
    }
}

impl<D: std::fmt::Debug, W> std::fmt::Debug for WriteSession<D, W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WriteSession")
            .field("device", &self.device)
            .field("offset", &self.offset)
            .field("in_flight", &self.in_flight)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
