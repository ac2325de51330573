//! Bulk transfer execution
//!
//! Runs a [`BulkOut`] synchronously on the USB thread and turns the rusb
//! result into a [`TransferCompletion`].

use protocol::{BulkOut, TransferCompletion, TransferStatus};
use rusb::{DeviceHandle, UsbContext};
use std::time::Duration;
use tracing::{debug, warn};

/// Anything that can perform a blocking bulk OUT write
pub trait BulkWriter {
    /// Write `data` to `endpoint`, returning the number of bytes accepted
    fn write_bulk(&self, endpoint: u8, data: &[u8], timeout: Duration) -> rusb::Result<usize>;
}

impl<T: UsbContext> BulkWriter for DeviceHandle<T> {
    fn write_bulk(&self, endpoint: u8, data: &[u8], timeout: Duration) -> rusb::Result<usize> {
        DeviceHandle::write_bulk(self, endpoint, data, timeout)
    }
}

/// Execute a bulk OUT transfer
///
/// The submitted buffer is handed back inside the completion so the
/// submitter can release it.
pub fn execute_bulk_out<W: BulkWriter + ?Sized>(
    writer: &W,
    transfer: BulkOut,
) -> TransferCompletion {
    let BulkOut {
        endpoint,
        data,
        timeout,
    } = transfer;

    debug!(
        "Bulk OUT: endpoint={:#04x}, len={}, timeout={:?}",
        endpoint,
        data.len(),
        timeout
    );

    match writer.write_bulk(endpoint, &data, timeout) {
        Ok(written) => {
            if written != data.len() {
                warn!("Short bulk write: {} of {} bytes", written, data.len());
            }
            TransferCompletion {
                status: TransferStatus::Completed,
                requested: data.len(),
                actual: written,
                data,
            }
        }
        Err(e) => {
            warn!("Bulk OUT to {:#04x} failed: {}", endpoint, e);
            TransferCompletion::failed(data, map_rusb_error(e))
        }
    }
}

/// Map rusb errors to transfer statuses
pub fn map_rusb_error(err: rusb::Error) -> TransferStatus {
    match err {
        rusb::Error::Timeout => TransferStatus::TimedOut,
        rusb::Error::Pipe => TransferStatus::Stall,
        rusb::Error::NoDevice => TransferStatus::NoDevice,
        rusb::Error::Interrupted => TransferStatus::Cancelled,
        _ => TransferStatus::Error,
    }
}
