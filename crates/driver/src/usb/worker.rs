//! USB worker thread
//!
//! Owns the opened sensor and executes bulk transfers one at a time, so
//! completions reach the async side in submission order. Talks to the Tokio
//! runtime only through the transfer bridge.

use crate::usb::transfers::{BulkWriter, execute_bulk_out};
use common::{DeviceAddress, TransferCommand, TransferEvent, TransferWorker};
use protocol::{TransferCompletion, TransferStatus};
use std::io;
use std::thread::JoinHandle;
use tracing::{debug, info, warn};

/// USB worker thread state
pub struct UsbWorkerThread<W> {
    writer: W,
    address: DeviceAddress,
    worker: TransferWorker,
}

impl<W: BulkWriter> UsbWorkerThread<W> {
    /// Create a worker serving the device at `address`
    pub fn new(writer: W, address: DeviceAddress, worker: TransferWorker) -> Self {
        Self {
            writer,
            address,
            worker,
        }
    }

    /// Process commands until shutdown or until the bridge goes away
    ///
    /// Returns the writer so the caller decides when the device is closed.
    pub fn run(self) -> W {
        info!("USB worker started for device {}", self.address);

        loop {
            let cmd = match self.worker.recv_command() {
                Ok(cmd) => cmd,
                Err(_) => {
                    debug!("Transfer bridge closed");
                    break;
                }
            };

            match cmd {
                TransferCommand::Shutdown => {
                    info!("USB worker shutting down");
                    break;
                }
                TransferCommand::SubmitBulkOut { device, transfer } => {
                    let completion = if device == self.address {
                        execute_bulk_out(&self.writer, transfer)
                    } else {
                        warn!(
                            "Transfer for device {} rejected, worker owns {}",
                            device, self.address
                        );
                        TransferCompletion::failed(transfer.data, TransferStatus::NoDevice)
                    };

                    if self
                        .worker
                        .send_event(TransferEvent::Completed { device, completion })
                        .is_err()
                    {
                        debug!("Event receiver dropped, stopping");
                        break;
                    }
                }
            }
        }

        info!("USB worker stopped");
        self.writer
    }
}

/// Spawn the USB worker thread
///
/// The thread runs until a Shutdown command arrives or the bridge is
/// dropped, then hands the writer back through the join handle.
pub fn spawn_usb_worker<W>(
    writer: W,
    address: DeviceAddress,
    worker: TransferWorker,
) -> io::Result<JoinHandle<W>>
where
    W: BulkWriter + Send + 'static,
{
    std::thread::Builder::new()
        .name("usb-worker".to_string())
        .spawn(move || UsbWorkerThread::new(writer, address, worker).run())
}
