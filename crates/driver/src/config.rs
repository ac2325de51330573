//! Driver configuration management

use anyhow::{Context, Result, anyhow};
use common::DeviceFilter;
use protocol::{BatchConfig, DEFAULT_ENDPOINT_OUT, DEFAULT_MAX_BATCH};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DriverConfig {
    #[serde(default)]
    pub driver: DriverSettings,
    #[serde(default)]
    pub usb: UsbSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriverSettings {
    #[serde(default = "DriverSettings::default_log_level")]
    pub log_level: String,
}

impl Default for DriverSettings {
    fn default() -> Self {
        Self {
            log_level: Self::default_log_level(),
        }
    }
}

impl DriverSettings {
    fn default_log_level() -> String {
        "info".to_string()
    }
}

/// USB transport settings
///
/// # Example Configuration
/// ```toml
/// [usb]
/// filter = "0x08ff:0x2580"
/// interface = 0
/// endpoint_out = 0x02
/// timeout_ms = 4000
/// max_batch = 16
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsbSettings {
    /// Which sensor to open (VID:PID, `*` wildcards allowed)
    #[serde(default = "UsbSettings::default_filter")]
    pub filter: DeviceFilter,
    /// Interface to claim
    #[serde(default)]
    pub interface: u8,
    /// Bulk OUT endpoint for register writes
    #[serde(default = "UsbSettings::default_endpoint_out")]
    pub endpoint_out: u8,
    /// Per-transfer timeout in milliseconds
    #[serde(default = "UsbSettings::default_timeout_ms")]
    pub timeout_ms: u64,
    /// Maximum register writes per transfer
    #[serde(default = "UsbSettings::default_max_batch")]
    pub max_batch: usize,
    /// Commands that may be queued for the USB thread
    #[serde(default = "UsbSettings::default_queue_depth")]
    pub queue_depth: usize,
}

impl Default for UsbSettings {
    fn default() -> Self {
        Self {
            filter: Self::default_filter(),
            interface: 0,
            endpoint_out: Self::default_endpoint_out(),
            timeout_ms: Self::default_timeout_ms(),
            max_batch: Self::default_max_batch(),
            queue_depth: Self::default_queue_depth(),
        }
    }
}

impl UsbSettings {
    fn default_filter() -> DeviceFilter {
        // AuthenTec, any product
        DeviceFilter {
            vendor_id: Some(0x08ff),
            product_id: None,
        }
    }

    fn default_endpoint_out() -> u8 {
        DEFAULT_ENDPOINT_OUT
    }

    fn default_timeout_ms() -> u64 {
        4000
    }

    fn default_max_batch() -> usize {
        DEFAULT_MAX_BATCH
    }

    fn default_queue_depth() -> usize {
        common::DEFAULT_QUEUE_DEPTH
    }

    /// Transfer timeout
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Batch parameters for register write sessions
    pub fn batch_config(&self) -> Result<BatchConfig> {
        BatchConfig::new(self.max_batch, self.endpoint_out, self.timeout())
            .context("Invalid USB batch settings")
    }
}

impl DriverConfig {
    /// Load configuration from the specified path
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        let config_path = if let Some(p) = path {
            PathBuf::from(shellexpand::tilde(&p.to_string_lossy()).as_ref())
        } else {
            // Try standard locations in order
            let candidates = [
                Self::default_path(),
                PathBuf::from("/etc/aeslib/driver.toml"),
            ];

            candidates
                .into_iter()
                .find(|p| p.exists())
                .ok_or_else(|| anyhow!("No configuration file found, using defaults"))?
        };

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let config = Self::parse(&content)
            .with_context(|| format!("Failed to parse config file: {}", config_path.display()))?;

        tracing::info!("Loaded configuration from: {}", config_path.display());
        Ok(config)
    }

    /// Parse and validate configuration from TOML text
    pub fn parse(content: &str) -> Result<Self> {
        let config: DriverConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration or return defaults if not found
    pub fn load_or_default() -> Self {
        match Self::load(None) {
            Ok(config) => config,
            Err(e) => {
                tracing::debug!("Failed to load config: {}, using defaults", e);
                Self::default()
            }
        }
    }

    /// Save configuration to the specified path
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize configuration")?;

        // Create parent directories if they don't exist
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        tracing::info!("Saved configuration to: {}", path.display());
        Ok(())
    }

    /// Get the default configuration file path
    pub fn default_path() -> PathBuf {
        if let Some(config_dir) = dirs::config_dir() {
            config_dir.join("aeslib").join("driver.toml")
        } else {
            PathBuf::from(".config/aeslib/driver.toml")
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.driver.log_level.as_str()) {
            return Err(anyhow!(
                "Invalid log level '{}', must be one of: {}",
                self.driver.log_level,
                valid_levels.join(", ")
            ));
        }

        if self.usb.endpoint_out & 0x80 != 0 {
            return Err(anyhow!(
                "Invalid endpoint_out {:#04x}, direction bit must be clear for OUT endpoints",
                self.usb.endpoint_out
            ));
        }

        if self.usb.max_batch == 0 {
            return Err(anyhow!("max_batch must be at least 1"));
        }

        if self.usb.timeout_ms == 0 {
            return Err(anyhow!("timeout_ms must be greater than 0"));
        }

        if self.usb.queue_depth == 0 {
            return Err(anyhow!("queue_depth must be at least 1"));
        }

        Ok(())
    }
}
