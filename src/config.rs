use std::num::ParseIntError;
use std::time::Duration;

use custom_class_device::protocol::{DEFAULT_PRODUCT_ID, DEFAULT_VENDOR_ID};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(5000);

/// Which device to talk to, and how long to wait for each control transfer
#[derive(Debug, Clone)]
pub struct DeviceConfig {
    pub vendor_id: u16,
    pub product_id: u16,
    /// Only match devices whose manufacturer string equals this
    pub manufacturer: Option<String>,
    /// Only match devices whose product string equals this
    pub product: Option<String>,
    pub timeout: Duration,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        DeviceConfig {
            vendor_id: DEFAULT_VENDOR_ID,
            product_id: DEFAULT_PRODUCT_ID,
            manufacturer: None,
            product: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl DeviceConfig {
    pub fn matches_ids(&self, vendor_id: u16, product_id: u16) -> bool {
        vendor_id == self.vendor_id && product_id == self.product_id
    }

    pub fn filters_strings(&self) -> bool {
        self.manufacturer.is_some() || self.product.is_some()
    }

    /// Whether the string descriptors read from a device satisfy the filters. A string the
    /// device did not provide never matches a filter.
    pub fn matches_strings(&self, manufacturer: Option<&str>, product: Option<&str>) -> bool {
        let matches = |filter: &Option<String>, name: Option<&str>| {
            filter.as_deref().map_or(true, |filter| Some(filter) == name)
        };
        matches(&self.manufacturer, manufacturer) && matches(&self.product, product)
    }
}

/// Parses `0x` prefixed hex or plain decimal
pub fn parse_u16(s: &str) -> Result<u16, ParseIntError> {
    match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u16::from_str_radix(hex, 16),
        None => s.parse(),
    }
}
