//! Test utilities for aeslib-rs
//!
//! Provides a recording transport and helpers for building register tables
//! without hardware.
//!
//! # Example
//!
//! ```
//! use common::test_utils::{RecordingTransport, create_register_table};
//! use protocol::{BatchConfig, WriteSession};
//!
//! let mut transport = RecordingTransport::default();
//! let session = WriteSession::start(
//!     &mut transport,
//!     common::DeviceAddress::new(1, 2),
//!     create_register_table(4),
//!     BatchConfig::default(),
//!     |_, _| {},
//! );
//! assert!(session.is_some());
//! assert_eq!(transport.submitted().len(), 1);
//! ```

use crate::usb_types::DeviceAddress;
use protocol::{BulkOut, BulkTransport, RegisterWrite, TransferCompletion, TransportError};
use std::future::Future;
use std::time::Duration;

/// Default test timeout (5 seconds)
pub const DEFAULT_TEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Transport that records every submission
///
/// Submissions can be made to fail from a given index onwards with
/// [`RecordingTransport::reject_from`].
#[derive(Debug, Default)]
pub struct RecordingTransport {
    submitted: Vec<(DeviceAddress, BulkOut)>,
    reject_from: Option<usize>,
}

impl RecordingTransport {
    /// Reject the `index`-th submission and every one after it
    pub fn reject_from(index: usize) -> Self {
        Self {
            submitted: Vec::new(),
            reject_from: Some(index),
        }
    }

    /// Every accepted submission, in order
    pub fn submitted(&self) -> &[(DeviceAddress, BulkOut)] {
        &self.submitted
    }

    /// Completion for the most recent submission, as if the device took
    /// every byte
    pub fn complete_last(&self) -> Option<TransferCompletion> {
        self.submitted
            .last()
            .map(|(_, t)| TransferCompletion::completed(t.data.clone()))
    }

    /// All payload bytes sent so far, decoded back into register writes
    pub fn sent_writes(&self) -> Vec<RegisterWrite> {
        self.submitted
            .iter()
            .flat_map(|(_, t)| t.data.chunks_exact(2))
            .map(|pair| RegisterWrite::new(pair[0], pair[1]))
            .collect()
    }
}

impl BulkTransport for RecordingTransport {
    type Device = DeviceAddress;

    fn submit_bulk_out(
        &mut self,
        device: &DeviceAddress,
        transfer: BulkOut,
    ) -> Result<(), TransportError> {
        if self
            .reject_from
            .is_some_and(|index| self.submitted.len() >= index)
        {
            return Err(TransportError::QueueFull);
        }
        self.submitted.push((*device, transfer));
        Ok(())
    }
}

/// Create a register table of `count` writes with no barriers
///
/// Registers cycle through 0x80..=0xfe so none of them is a barrier.
pub fn create_register_table(count: usize) -> Vec<RegisterWrite> {
    (0..count)
        .map(|i| RegisterWrite::new(0x80 + (i % 0x7f) as u8, (i * 7) as u8))
        .collect()
}

/// Create a register table made of blocks separated by barriers
///
/// # Example
/// ```
/// use common::test_utils::create_blocked_register_table;
///
/// let table = create_blocked_register_table(&[2, 3]);
/// assert_eq!(table.len(), 6);
/// assert!(table[2].is_barrier());
/// ```
pub fn create_blocked_register_table(blocks: &[usize]) -> Vec<RegisterWrite> {
    let mut table = Vec::new();
    for (index, &len) in blocks.iter().enumerate() {
        if index > 0 {
            table.push(RegisterWrite::barrier());
        }
        table.extend(create_register_table(len));
    }
    table
}

/// Run an async test with a timeout
///
/// # Example
/// ```
/// use common::test_utils::{with_timeout, DEFAULT_TEST_TIMEOUT};
///
/// #[tokio::test]
/// async fn test_with_timeout() {
///     let result = with_timeout(DEFAULT_TEST_TIMEOUT, async { 42 })
///         .await
///         .unwrap();
///     assert_eq!(result, 42);
/// }
/// ```
pub async fn with_timeout<T, F>(duration: Duration, future: F) -> Result<T, TimeoutError>
where
    F: Future<Output = T>,
{
    tokio::time::timeout(duration, future)
        .await
        .map_err(|_| TimeoutError { duration })
}

/// Error returned when a test times out
#[derive(Debug)]
pub struct TimeoutError {
    /// The timeout duration that was exceeded
    pub duration: Duration,
}

impl std::fmt::Display for TimeoutError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Test timed out after {:?}", self.duration)
    }
}

impl std::error::Error for TimeoutError {}
