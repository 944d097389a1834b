use bytes::Buf;

use crate::error::SetupError;

// Shared VID/PID pair, borrowed from a Logitech mouse. For demonstration only.
pub const DEFAULT_VENDOR_ID: u16 = 0x046d;
pub const DEFAULT_PRODUCT_ID: u16 = 0xc00e;

/// Output lines controllable through SET_LED / GET_LED
pub const LED_MASK: u8 = 0x1f;
/// Heartbeat line toggled by the firmware main loop
pub const HEARTBEAT_LED: u8 = 0x20;

pub const STATUS_BUFFER_SIZE: usize = 16;
pub const DATA_BUFFER_SIZE: usize = 512;

// Low speed devices are limited to 8 byte packets on endpoint 0
pub const ENDPOINT0_PACKET_SIZE: usize = 8;

pub const SETUP_PACKET_SIZE: usize = 8;

/// Vendor requests understood by the device. The codes must match on both ends of the cable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Request {
    SetLed = 1,
    GetLed = 2,
    StatusRead = 3,
    StatusWrite = 4,
    DataWrite = 5,
    DataRead = 6,
}

impl Request {
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(Request::SetLed),
            2 => Some(Request::GetLed),
            3 => Some(Request::StatusRead),
            4 => Some(Request::StatusWrite),
            5 => Some(Request::DataWrite),
            6 => Some(Request::DataRead),
            _ => None,
        }
    }

    pub fn code(self) -> u8 {
        self as u8
    }
}

impl From<Request> for u8 {
    fn from(request: Request) -> u8 {
        request.code()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Host to device
    Out,
    /// Device to host
    In,
}

/// bmRequestType for a vendor request addressed to the device
pub fn vendor_request_type(direction: Direction) -> u8 {
    let direction = match direction {
        Direction::Out => 0b0000_0000,
        Direction::In => 0b1000_0000,
    };
    direction | 0b0100_0000
}

/// The 8 byte SETUP stage of a control transfer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SetupPacket {
    /// bmRequestType
    pub request_type: u8,
    /// bRequest
    pub request: u8,
    /// wValue
    pub value: u16,
    /// wIndex
    pub index: u16,
    /// wLength
    pub length: u16,
}

impl SetupPacket {
    pub fn vendor(
        direction: Direction,
        request: impl Into<u8>,
        value: u16,
        index: u16,
        length: u16,
    ) -> Self {
        SetupPacket {
            request_type: vendor_request_type(direction),
            request: request.into(),
            value,
            index,
            length,
        }
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SetupError> {
        if bytes.len() != SETUP_PACKET_SIZE {
            return Err(SetupError::InvalidLength(bytes.len()));
        }
        let mut bytes = bytes;

        Ok(SetupPacket {
            request_type: bytes.get_u8(),
            request: bytes.get_u8(),
            value: bytes.get_u16_le(),
            index: bytes.get_u16_le(),
            length: bytes.get_u16_le(),
        })
    }

    pub fn to_bytes(&self) -> [u8; SETUP_PACKET_SIZE] {
        let [value_lo, value_hi] = self.value.to_le_bytes();
        let [index_lo, index_hi] = self.index.to_le_bytes();
        let [length_lo, length_hi] = self.length.to_le_bytes();
        [
            self.request_type,
            self.request,
            value_lo,
            value_hi,
            index_lo,
            index_hi,
            length_lo,
            length_hi,
        ]
    }

    pub fn direction(&self) -> Direction {
        if self.request_type & 0x80 != 0 {
            Direction::In
        } else {
            Direction::Out
        }
    }

    pub fn decoded_request(&self) -> Option<Request> {
        Request::from_code(self.request)
    }
}
