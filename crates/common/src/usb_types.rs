//! USB device addressing and filtering

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Location of a device on the host (bus number, device address)
///
/// Used as the opaque device handle for register writes; it is only ever
/// compared and logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceAddress {
    /// Bus number
    pub bus: u8,
    /// Device address on the bus
    pub address: u8,
}

impl DeviceAddress {
    pub const fn new(bus: u8, address: u8) -> Self {
        Self { bus, address }
    }
}

impl fmt::Display for DeviceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:03}:{:03}", self.bus, self.address)
    }
}

/// VID:PID device filter
///
/// Parsed from strings like `0x08ff:0x2580`, `0x08ff:*` or `*:*`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DeviceFilter {
    /// Vendor id, `None` matches any vendor
    pub vendor_id: Option<u16>,
    /// Product id, `None` matches any product
    pub product_id: Option<u16>,
}

impl DeviceFilter {
    /// Filter for one exact device model
    pub const fn exact(vendor_id: u16, product_id: u16) -> Self {
        Self {
            vendor_id: Some(vendor_id),
            product_id: Some(product_id),
        }
    }

    /// Whether a device with these ids passes the filter
    pub fn matches(&self, vendor_id: u16, product_id: u16) -> bool {
        self.vendor_id.is_none_or(|v| v == vendor_id)
            && self.product_id.is_none_or(|p| p == product_id)
    }

    fn parse_id(id: &str, name: &str) -> Result<Option<u16>, String> {
        if id == "*" {
            return Ok(None);
        }

        let hex_part = id
            .strip_prefix("0x")
            .or_else(|| id.strip_prefix("0X"))
            .ok_or_else(|| {
                format!(
                    "Invalid {} '{}', must start with '0x' (e.g., '0x08ff')",
                    name, id
                )
            })?;

        if hex_part.is_empty() || hex_part.len() > 4 {
            return Err(format!(
                "Invalid {} '{}', hex part must be 1-4 digits",
                name, id
            ));
        }

        u16::from_str_radix(hex_part, 16)
            .map(Some)
            .map_err(|_| format!("Invalid {} '{}', not a valid hex number", name, id))
    }
}

impl FromStr for DeviceFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.trim().split(':').collect();
        if parts.len() != 2 {
            return Err(format!(
                "Invalid filter format '{}', expected VID:PID (e.g., '0x08ff:0x2580' or '0x08ff:*')",
                s
            ));
        }

        Ok(Self {
            vendor_id: Self::parse_id(parts[0], "VID")?,
            product_id: Self::parse_id(parts[1], "PID")?,
        })
    }
}

impl TryFrom<String> for DeviceFilter {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<DeviceFilter> for String {
    fn from(filter: DeviceFilter) -> Self {
        filter.to_string()
    }
}

impl fmt::Display for DeviceFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.vendor_id {
            Some(v) => write!(f, "0x{:04x}", v)?,
            None => write!(f, "*")?,
        }
        write!(f, ":")?;
        match self.product_id {
            Some(p) => write!(f, "0x{:04x}", p),
            None => write!(f, "*"),
        }
    }
}
