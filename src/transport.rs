use std::time::Duration;

use rusb::{DeviceDescriptor, DeviceHandle, GlobalContext, Recipient, RequestType};
use tracing::{debug, warn};

use crate::config::DeviceConfig;
use crate::error::DriverError;

/// Vendor control transfers addressed to the device.
///
/// Both calls return the number of bytes that actually moved in the data stage, which may be
/// fewer than requested.
pub trait ControlTransport {
    fn read_control(
        &mut self,
        request: u8,
        value: u16,
        index: u16,
        buf: &mut [u8],
    ) -> Result<usize, DriverError>;

    fn write_control(
        &mut self,
        request: u8,
        value: u16,
        index: u16,
        data: &[u8],
    ) -> Result<usize, DriverError>;
}

/// A real device on the bus, driven through libusb
pub struct UsbTransport {
    handle: DeviceHandle<GlobalContext>,
    timeout: Duration,
}

impl UsbTransport {
    /// Opens the first device matching the configured ids and, if given, string descriptors.
    ///
    /// Devices that cannot be inspected are skipped with a warning.
    pub fn open(config: &DeviceConfig) -> Result<Self, DriverError> {
        for device in rusb::devices()?.iter() {
            let descriptor = match device.device_descriptor() {
                Ok(descriptor) => descriptor,
                Err(err) => {
                    warn!(
                        bus = device.bus_number(),
                        address = device.address(),
                        "Could not read device descriptor: {}",
                        err
                    );
                    continue;
                }
            };
            if !config.matches_ids(descriptor.vendor_id(), descriptor.product_id()) {
                continue;
            }

            let handle = match device.open() {
                Ok(handle) => handle,
                Err(err) => {
                    warn!(
                        bus = device.bus_number(),
                        address = device.address(),
                        "Could not open device: {}",
                        err
                    );
                    continue;
                }
            };

            if config.filters_strings() {
                let (manufacturer, product) =
                    match read_strings(&handle, &descriptor, config.timeout) {
                        Ok(strings) => strings,
                        Err(err) => {
                            warn!(
                                bus = device.bus_number(),
                                address = device.address(),
                                "Could not read string descriptors: {}",
                                err
                            );
                            continue;
                        }
                    };
                if !config.matches_strings(manufacturer.as_deref(), product.as_deref()) {
                    continue;
                }
            }

            debug!(
                bus = device.bus_number(),
                address = device.address(),
                "Opened device {:04x}:{:04x}",
                config.vendor_id,
                config.product_id
            );
            // Only endpoint 0 is used, so there is no interface to claim
            return Ok(UsbTransport {
                handle,
                timeout: config.timeout,
            });
        }

        Err(DriverError::DeviceNotFound {
            vendor_id: config.vendor_id,
            product_id: config.product_id,
        })
    }
}

/// Manufacturer and product strings in the device's first language
fn read_strings(
    handle: &DeviceHandle<GlobalContext>,
    descriptor: &DeviceDescriptor,
    timeout: Duration,
) -> Result<(Option<String>, Option<String>), rusb::Error> {
    let Some(language) = handle.read_languages(timeout)?.first().copied() else {
        return Ok((None, None));
    };
    let manufacturer = handle
        .read_manufacturer_string(language, descriptor, timeout)
        .ok();
    let product = handle
        .read_product_string(language, descriptor, timeout)
        .ok();
    Ok((manufacturer, product))
}

impl ControlTransport for UsbTransport {
    fn read_control(
        &mut self,
        request: u8,
        value: u16,
        index: u16,
        buf: &mut [u8],
    ) -> Result<usize, DriverError> {
        let request_type =
            rusb::request_type(rusb::Direction::In, RequestType::Vendor, Recipient::Device);
        let bytes_read = self
            .handle
            .read_control(request_type, request, value, index, buf, self.timeout)?;
        Ok(bytes_read)
    }

    fn write_control(
        &mut self,
        request: u8,
        value: u16,
        index: u16,
        data: &[u8],
    ) -> Result<usize, DriverError> {
        let request_type =
            rusb::request_type(rusb::Direction::Out, RequestType::Vendor, Recipient::Device);
        let bytes_written = self
            .handle
            .write_control(request_type, request, value, index, data, self.timeout)?;
        Ok(bytes_written)
    }
}
