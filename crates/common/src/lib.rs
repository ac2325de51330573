//! Common utilities for aeslib-rs
//!
//! This crate provides functionality shared by the sensor drivers and tools:
//! error handling, logging setup, USB device addressing and filters, and the
//! channel bridge that carries transfers between async code and the blocking
//! USB worker thread.

pub mod channel;
pub mod error;
pub mod logging;
pub mod test_utils;
pub mod usb_types;

pub use channel::{
    DEFAULT_QUEUE_DEPTH, TransferBridge, TransferCommand, TransferEvent, TransferWorker,
    create_transfer_bridge,
};
pub use error::{Error, Result};
pub use logging::setup_logging;
pub use usb_types::{DeviceAddress, DeviceFilter};
