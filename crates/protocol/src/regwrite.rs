//! Register write model and batch planning
//!
//! A register write is a `(register, value)` byte pair. Writes are sent to the
//! sensor in bulk OUT transfers, packed back to back:
//!
//! ```text
//! [reg 0][value 0][reg 1][value 1] ... [reg n-1][value n-1]
//! ```
//!
//! Register 0 does not exist on the device. A write to it is a *barrier*: it is
//! never transmitted, and the writes on either side of it always end up in
//! different transfers.

use crate::error::{ProtocolError, Result};
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::ops::Range;
use std::time::Duration;

/// Register id reserved for barriers
pub const BARRIER_REGISTER: u8 = 0;

/// Maximum number of register writes the sensors accept in one transfer
pub const DEFAULT_MAX_BATCH: usize = 16;

/// Bulk OUT endpoint used for register writes
pub const DEFAULT_ENDPOINT_OUT: u8 = 0x02;

/// Bulk transfer timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(4000);

/// A single register write
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RegisterWrite {
    /// Register id (0 = barrier)
    pub reg: u8,
    /// Value to store
    pub value: u8,
}

impl RegisterWrite {
    /// Create a register write
    pub const fn new(reg: u8, value: u8) -> Self {
        Self { reg, value }
    }

    /// Create a barrier entry
    pub const fn barrier() -> Self {
        Self {
            reg: BARRIER_REGISTER,
            value: 0,
        }
    }

    /// Whether this entry is a barrier
    pub const fn is_barrier(&self) -> bool {
        self.reg == BARRIER_REGISTER
    }
}

impl From<(u8, u8)> for RegisterWrite {
    fn from((reg, value): (u8, u8)) -> Self {
        Self::new(reg, value)
    }
}

/// Transfer parameters for register writes
///
/// These are properties of the sensor family, not of the batching algorithm,
/// so they are injected by the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchConfig {
    /// Maximum number of writes per transfer
    pub max_batch: NonZeroUsize,
    /// Bulk OUT endpoint address
    pub endpoint: u8,
    /// Per-transfer timeout
    pub timeout: Duration,
}

impl BatchConfig {
    /// Create a config, rejecting a zero batch size
    pub fn new(max_batch: usize, endpoint: u8, timeout: Duration) -> Result<Self> {
        let max_batch =
            NonZeroUsize::new(max_batch).ok_or(ProtocolError::InvalidBatchSize(max_batch))?;
        Ok(Self {
            max_batch,
            endpoint,
            timeout,
        })
    }
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_batch: NonZeroUsize::new(DEFAULT_MAX_BATCH).unwrap_or(NonZeroUsize::MIN),
            endpoint: DEFAULT_ENDPOINT_OUT,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// Find the next batch starting at or after `offset`
///
/// Leading barriers are skipped. The returned range is never empty, holds at
/// most `max_batch` writes and stops before the first barrier it would reach.
/// Returns `None` once only barriers (or nothing) remain.
pub fn next_batch(
    writes: &[RegisterWrite],
    offset: usize,
    max_batch: NonZeroUsize,
) -> Option<Range<usize>> {
    let start = offset
        + writes
            .get(offset..)?
            .iter()
            .position(|w| !w.is_barrier())?;

    let limit = (writes.len() - start).min(max_batch.get());
    let window = &writes[start..start + limit];
    let len = window
        .iter()
        .position(RegisterWrite::is_barrier)
        .unwrap_or(limit);

    Some(start..start + len)
}

/// Pack writes into a transfer payload, two bytes per write
pub fn pack_batch(batch: &[RegisterWrite]) -> Vec<u8> {
    let mut data = Vec::with_capacity(batch.len() * 2);
    for write in batch {
        data.push(write.reg);
        data.push(write.value);
    }
    data
}

/// Iterator over every batch of a sequence, in transmission order
///
/// Yields exactly the ranges a write session would submit if every transfer
/// succeeded.
#[derive(Debug, Clone)]
pub struct Batches<'a> {
    writes: &'a [RegisterWrite],
    offset: usize,
    max_batch: NonZeroUsize,
}

impl<'a> Iterator for Batches<'a> {
    type Item = Range<usize>;

    fn next(&mut self) -> Option<Self::Item> {
        let batch = next_batch(self.writes, self.offset, self.max_batch)?;
        self.offset = batch.end;
        Some(batch)
    }
}

/// Plan the transfers for a whole sequence without submitting anything
pub fn plan_batches(writes: &[RegisterWrite], max_batch: NonZeroUsize) -> Batches<'_> {
    Batches {
        writes,
        offset: 0,
        max_batch,
    }
}
