//! Register programming and image assembly for AuthenTec-style USB sensors
//!
//! This crate holds the parts shared by every driver of the sensor family:
//! batching register writes into bulk transfers, and decoding the packed
//! raw frame format into 8-bit grayscale images. It performs no I/O itself;
//! transfers go through a [`BulkTransport`] supplied by the caller.
//!
//! # Example
//!
//! ```
//! use protocol::{RegisterWrite, plan_batches, DEFAULT_MAX_BATCH};
//! use std::num::NonZeroUsize;
//!
//! let writes = [
//!     RegisterWrite::new(0x80, 0x01),
//!     RegisterWrite::barrier(),
//!     RegisterWrite::new(0x80, 0x12),
//!     RegisterWrite::new(0x85, 0x00),
//! ];
//!
//! let max = NonZeroUsize::new(DEFAULT_MAX_BATCH).unwrap();
//! let batches: Vec<_> = plan_batches(&writes, max).collect();
//! assert_eq!(batches, vec![0..1, 2..4]);
//! ```
//!
//! # Image assembly
//!
//! ```
//! use protocol::assemble_image;
//!
//! let mut out = [0u8; 4];
//! assemble_image(&[0x12, 0x34], 2, 2, &mut out).unwrap();
//! assert_eq!(out, [72, 144, 36, 108]);
//! ```

pub mod error;
pub mod image;
pub mod regwrite;
pub mod transport;
pub mod writer;

pub use error::{EIO, EPROTO, ProtocolError, Result, TransportError, WriteError};
pub use image::{Image, SAMPLE_SCALE, assemble_image, raw_frame_len};
pub use regwrite::{
    BARRIER_REGISTER, BatchConfig, Batches, DEFAULT_ENDPOINT_OUT, DEFAULT_MAX_BATCH,
    DEFAULT_TIMEOUT, RegisterWrite, next_batch, pack_batch, plan_batches,
};
pub use transport::{BulkOut, BulkTransport, TransferCompletion, TransferStatus};
pub use writer::{WriteCallback, WriteSession};
