//! Async register write runner
//!
//! Drives a [`WriteSession`] over the transfer bridge and resolves once the
//! session's completion callback has fired.

use common::{DeviceAddress, TransferBridge, TransferEvent};
use protocol::{
    BatchConfig, RegisterWrite, TransferCompletion, TransferStatus, WriteError, WriteSession,
};
use tokio::sync::oneshot;
use tracing::{debug, warn};

/// Write `writes` to `device` and wait for the outcome
///
/// Completions for other devices are logged and skipped. If the USB thread
/// goes away mid-session the in-flight transfer is treated as cancelled, so
/// the session still finishes with an I/O error.
pub async fn write_registers<W>(
    bridge: &mut TransferBridge,
    device: DeviceAddress,
    writes: W,
    config: BatchConfig,
) -> Result<(), WriteError>
where
    W: AsRef<[RegisterWrite]>,
{
    let (tx, rx) = oneshot::channel();
    let mut session = WriteSession::start(bridge, device, writes, config, move |_, result| {
        let _ = tx.send(result);
    });

    while let Some(s) = session {
        let completion = match bridge.recv_event().await {
            Ok(TransferEvent::Completed {
                device: from,
                completion,
            }) => {
                if from != device {
                    warn!("Ignoring completion for device {} while writing {}", from, device);
                    session = Some(s);
                    continue;
                }
                completion
            }
            Err(e) => {
                debug!("Transfer bridge closed mid-session: {}", e);
                TransferCompletion::failed(Vec::new(), TransferStatus::Cancelled)
            }
        };

        session = s.on_transfer_complete(bridge, completion);
    }

    rx.await
        .unwrap_or_else(|_| Err(WriteError::Io("write session dropped its callback".to_string())))
}
