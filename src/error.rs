use custom_class_device::SetupError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DriverError {
    #[error("rusb error")]
    RusbError(#[from] rusb::Error),
    #[error("malformed setup packet")]
    Setup(#[from] SetupError),
    #[error("could not find USB device with vid={vendor_id:#06x} pid={product_id:#06x}")]
    DeviceNotFound { vendor_id: u16, product_id: u16 },
    #[error("status string needs at least 4 bytes, got {0}")]
    StatusTooShort(usize),
    #[error("expected {expected} bytes from the device, got {actual}")]
    UnexpectedLength { expected: usize, actual: usize },
}
