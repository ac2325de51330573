//! Register table files
//!
//! Calibration and init sequences are kept out of the code as TOML tables:
//!
//! ```toml
//! [[writes]]
//! reg = 0x80
//! value = 0x01
//!
//! [[writes]]
//! barrier = true
//!
//! [[writes]]
//! reg = 0x80
//! value = 0x12
//! ```
//!
//! A `barrier` entry (or a write to register 0) forces the writes before and
//! after it into separate transfers.

use anyhow::{Context, Result, anyhow};
use protocol::{BARRIER_REGISTER, RegisterWrite};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct TableFile {
    #[serde(default)]
    writes: Vec<TableEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct TableEntry {
    #[serde(default)]
    reg: Option<u8>,
    #[serde(default)]
    value: Option<u8>,
    #[serde(default)]
    barrier: bool,
}

impl TableEntry {
    fn to_write(&self, index: usize) -> Result<RegisterWrite> {
        match (self.barrier, self.reg, self.value) {
            (true, None, None) => Ok(RegisterWrite::barrier()),
            (true, _, _) => Err(anyhow!(
                "entry {}: barrier entries take no reg or value",
                index
            )),
            (false, Some(reg), Some(value)) => Ok(RegisterWrite::new(reg, value)),
            (false, Some(BARRIER_REGISTER), None) => Ok(RegisterWrite::barrier()),
            (false, None, _) => Err(anyhow!("entry {}: missing reg", index)),
            (false, Some(reg), None) => {
                Err(anyhow!("entry {}: missing value for reg {:#04x}", index, reg))
            }
        }
    }
}

/// Parse a register table from TOML text
pub fn parse_table(content: &str) -> Result<Vec<RegisterWrite>> {
    let file: TableFile = toml::from_str(content).context("Invalid register table")?;
    file.writes
        .iter()
        .enumerate()
        .map(|(index, entry)| entry.to_write(index))
        .collect()
}

/// Load a register table file
pub fn load_table(path: &Path) -> Result<Vec<RegisterWrite>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read register table: {}", path.display()))?;

    let writes = parse_table(&content)
        .with_context(|| format!("Failed to parse register table: {}", path.display()))?;

    tracing::debug!("Loaded {} entries from {}", writes.len(), path.display());
    Ok(writes)
}

/// Render a register table as TOML
pub fn format_table(writes: &[RegisterWrite]) -> Result<String> {
    let file = TableFile {
        writes: writes
            .iter()
            .map(|w| {
                if w.is_barrier() {
                    TableEntry {
                        reg: None,
                        value: None,
                        barrier: true,
                    }
                } else {
                    TableEntry {
                        reg: Some(w.reg),
                        value: Some(w.value),
                        barrier: false,
                    }
                }
            })
            .collect(),
    };
    toml::to_string_pretty(&file).context("Failed to serialize register table")
}
