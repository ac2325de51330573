//! Protocol error types

use thiserror::Error;

/// errno value reported for transport and transfer failures
pub const EIO: i32 = 5;

/// errno value reported when a transfer moved fewer bytes than requested
pub const EPROTO: i32 = 71;

/// Errors raised by the pure transforms in this crate
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProtocolError {
    /// Image dimensions the packed sample format cannot describe
    #[error("Invalid image dimensions: {width}x{height} (height must be even, size must fit)")]
    InvalidDimensions { width: usize, height: usize },

    /// Input buffer too small for operation
    #[error("Buffer too small: needed {needed}, got {available}")]
    BufferTooSmall { needed: usize, available: usize },

    /// Output buffer does not match the image size
    #[error("Output buffer size mismatch: expected {expected} bytes, got {actual}")]
    BufferSizeMismatch { expected: usize, actual: usize },

    /// Batch size outside the range a transfer can carry
    #[error("Invalid batch size: {0} (must be at least 1)")]
    InvalidBatchSize(usize),
}

/// Type alias for protocol results
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Terminal failure of a register write sequence
///
/// Either variant ends the whole sequence. Writes from batches that already
/// completed stay applied on the device.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum WriteError {
    /// Submission rejected or transfer reported as failed
    #[error("I/O error: {0}")]
    Io(String),

    /// Device accepted a different number of bytes than were sent
    #[error("Protocol error: requested {requested} bytes, transferred {actual}")]
    Protocol { requested: usize, actual: usize },
}

impl WriteError {
    /// Negative errno equivalent (`-EIO` or `-EPROTO`)
    pub fn errno(&self) -> i32 {
        match self {
            WriteError::Io(_) => -EIO,
            WriteError::Protocol { .. } => -EPROTO,
        }
    }
}

/// Failure to hand a transfer to the transport
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    /// Submission queue is full
    #[error("Transfer queue full")]
    QueueFull,

    /// Transport has shut down
    #[error("Transport closed")]
    Closed,

    /// Any other submission failure
    #[error("Submission failed: {0}")]
    Other(String),
}

impl From<TransportError> for WriteError {
    fn from(err: TransportError) -> Self {
        WriteError::Io(err.to_string())
    }
}
