//! Userspace driver plumbing for AuthenTec swipe sensors
//!
//! Loads register tables and configuration, opens the sensor over rusb, and
//! runs batched register write sessions through a dedicated USB thread.

pub mod config;
pub mod runner;
pub mod table;
pub mod usb;

pub use config::DriverConfig;
pub use runner::write_registers;
