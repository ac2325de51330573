//! Bulk transport boundary
//!
//! The write session never talks to USB directly. It hands fully packed
//! transfers to a [`BulkTransport`], and whoever owns the session feeds the
//! matching [`TransferCompletion`]s back, one per accepted submission, in
//! submission order.

use crate::error::TransportError;
use std::time::Duration;

/// A bulk OUT transfer ready for submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkOut {
    /// Endpoint address (direction bit clear)
    pub endpoint: u8,
    /// Payload; ownership passes to the transport
    pub data: Vec<u8>,
    /// Transfer timeout
    pub timeout: Duration,
}

/// Outcome reported by the transport for a submitted transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferStatus {
    /// Transfer finished (possibly short, check `actual`)
    Completed,
    /// Generic transfer failure
    Error,
    /// Timed out before completing
    TimedOut,
    /// Endpoint stalled
    Stall,
    /// Device was disconnected
    NoDevice,
    /// Transfer was cancelled, usually because the device was closed
    Cancelled,
}

impl TransferStatus {
    /// Whether the transfer ran to completion
    pub fn is_completed(&self) -> bool {
        matches!(self, TransferStatus::Completed)
    }
}

/// Completion of one submitted transfer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferCompletion {
    /// Final status
    pub status: TransferStatus,
    /// Number of bytes submitted
    pub requested: usize,
    /// Number of bytes the device accepted
    pub actual: usize,
    /// The submitted buffer, returned to be released by the receiver
    pub data: Vec<u8>,
}

impl TransferCompletion {
    /// Completion for a transfer that moved every byte
    pub fn completed(data: Vec<u8>) -> Self {
        let len = data.len();
        Self {
            status: TransferStatus::Completed,
            requested: len,
            actual: len,
            data,
        }
    }

    /// Completion for a transfer that failed with `status`
    pub fn failed(data: Vec<u8>, status: TransferStatus) -> Self {
        Self {
            status,
            requested: data.len(),
            actual: 0,
            data,
        }
    }
}

/// Asynchronous bulk OUT submission
///
/// `submit_bulk_out` must not block on the transfer itself. An `Ok` return
/// obliges the transport to deliver exactly one [`TransferCompletion`] for it.
pub trait BulkTransport {
    /// Opaque device identifier, passed through untouched
    type Device;

    /// Queue a transfer for `device`
    fn submit_bulk_out(
        &mut self,
        device: &Self::Device,
        transfer: BulkOut,
    ) -> Result<(), TransportError>;
}

impl<T: BulkTransport + ?Sized> BulkTransport for &mut T {
    type Device = T::Device;

    fn submit_bulk_out(
        &mut self,
        device: &Self::Device,
        transfer: BulkOut,
    ) -> Result<(), TransportError> {
        (**self).submit_bulk_out(device, transfer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_completed_helper() {
        let completion = TransferCompletion::completed(vec![0x80, 0x01]);
        assert!(completion.status.is_completed());
        assert_eq!(completion.requested, 2);
        assert_eq!(completion.actual, 2);
    }

    #[test]
    fn test_failed_helper() {
        let completion = TransferCompletion::failed(vec![1, 2, 3, 4], TransferStatus::Stall);
        assert!(!completion.status.is_completed());
        assert_eq!(completion.requested, 4);
        assert_eq!(completion.actual, 0);
    }
}
