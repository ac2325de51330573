//! Sensor device discovery and access
//!
//! Wraps an opened rusb handle with the claimed interface, and restores the
//! kernel driver when the sensor is closed.

use common::{DeviceAddress, DeviceFilter};
use rusb::{Context, Device, DeviceHandle, UsbContext};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::usb::transfers::BulkWriter;

/// Descriptor summary of a connected sensor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SensorInfo {
    /// Bus location
    pub address: DeviceAddress,
    /// USB Vendor ID
    pub vendor_id: u16,
    /// USB Product ID
    pub product_id: u16,
    /// Manufacturer string (if available)
    pub manufacturer: Option<String>,
    /// Product string (if available)
    pub product: Option<String>,
}

/// List connected devices matching `filter`
pub fn list_sensors<T: UsbContext>(
    context: &T,
    filter: &DeviceFilter,
) -> Result<Vec<SensorInfo>, rusb::Error> {
    let mut sensors = Vec::new();

    for device in context.devices()?.iter() {
        let descriptor = match device.device_descriptor() {
            Ok(d) => d,
            Err(e) => {
                debug!(
                    "Skipping device {:03}:{:03}: {}",
                    device.bus_number(),
                    device.address(),
                    e
                );
                continue;
            }
        };

        if !filter.matches(descriptor.vendor_id(), descriptor.product_id()) {
            continue;
        }

        let (manufacturer, product) = read_strings(&device, &descriptor);
        sensors.push(SensorInfo {
            address: DeviceAddress::new(device.bus_number(), device.address()),
            vendor_id: descriptor.vendor_id(),
            product_id: descriptor.product_id(),
            manufacturer,
            product,
        });
    }

    debug!("Found {} device(s) matching {}", sensors.len(), filter);
    Ok(sensors)
}

/// Read manufacturer and product strings, if the device lets us open it
fn read_strings<T: UsbContext>(
    device: &Device<T>,
    descriptor: &rusb::DeviceDescriptor,
) -> (Option<String>, Option<String>) {
    let Ok(handle) = device.open() else {
        return (None, None);
    };

    let manufacturer = descriptor
        .manufacturer_string_index()
        .and_then(|idx| handle.read_string_descriptor_ascii(idx).ok());

    let product = descriptor
        .product_string_index()
        .and_then(|idx| handle.read_string_descriptor_ascii(idx).ok());

    (manufacturer, product)
}

/// An opened sensor with its interface claimed
pub struct SensorDevice {
    handle: DeviceHandle<Context>,
    address: DeviceAddress,
    interface: u8,
    reattach_kernel_driver: bool,
}

impl SensorDevice {
    /// Open the first device matching `filter` and claim `interface`
    ///
    /// Any kernel driver bound to the interface is detached first and
    /// reattached when the sensor is dropped.
    pub fn open(context: &Context, filter: &DeviceFilter, interface: u8) -> common::Result<Self> {
        let device = context
            .devices()
            .map_err(|e| common::Error::Usb(format!("Failed to enumerate devices: {}", e)))?
            .iter()
            .find(|d| {
                d.device_descriptor()
                    .map(|desc| filter.matches(desc.vendor_id(), desc.product_id()))
                    .unwrap_or(false)
            })
            .ok_or_else(|| common::Error::Usb(format!("No device matching {}", filter)))?;

        let address = DeviceAddress::new(device.bus_number(), device.address());
        let handle = device
            .open()
            .map_err(|e| common::Error::Usb(format!("Failed to open {}: {}", address, e)))?;

        debug!("Opened device {}", address);

        let reattach_kernel_driver = match handle.kernel_driver_active(interface) {
            Ok(true) => {
                debug!(
                    "Detaching kernel driver from interface {} on device {}",
                    interface, address
                );
                handle.detach_kernel_driver(interface).map_err(|e| {
                    common::Error::Usb(format!(
                        "Failed to detach kernel driver from interface {}: {}",
                        interface, e
                    ))
                })?;
                true
            }
            Ok(false) => false,
            Err(e) => {
                debug!(
                    "Could not check kernel driver status for interface {}: {}",
                    interface, e
                );
                false
            }
        };

        handle.claim_interface(interface).map_err(|e| {
            common::Error::Usb(format!("Failed to claim interface {}: {}", interface, e))
        })?;

        info!("Claimed interface {} on device {}", interface, address);

        Ok(Self {
            handle,
            address,
            interface,
            reattach_kernel_driver,
        })
    }

    /// Bus location of the sensor
    pub fn address(&self) -> DeviceAddress {
        self.address
    }
}

impl BulkWriter for SensorDevice {
    fn write_bulk(&self, endpoint: u8, data: &[u8], timeout: Duration) -> rusb::Result<usize> {
        self.handle.write_bulk(endpoint, data, timeout)
    }
}

impl Drop for SensorDevice {
    fn drop(&mut self) {
        if let Err(e) = self.handle.release_interface(self.interface) {
            warn!("Failed to release interface {}: {}", self.interface, e);
        }

        if self.reattach_kernel_driver {
            if let Err(e) = self.handle.attach_kernel_driver(self.interface) {
                debug!(
                    "Could not reattach kernel driver to interface {}: {}",
                    self.interface, e
                );
            }
        }

        debug!("Closed device {}", self.address);
    }
}
