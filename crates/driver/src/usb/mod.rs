//! USB subsystem
//!
//! Sensor discovery, the bulk transfer executor and the dedicated worker
//! thread that keeps blocking libusb calls off the Tokio runtime.

pub mod device;
pub mod transfers;
pub mod worker;

pub use device::{SensorDevice, SensorInfo, list_sensors};
pub use transfers::{BulkWriter, execute_bulk_out, map_rusb_error};
pub use worker::{UsbWorkerThread, spawn_usb_worker};
