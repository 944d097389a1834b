use tracing::{debug, trace};

use crate::hal::LedPort;
use crate::protocol::{Request, SetupPacket, DATA_BUFFER_SIZE, LED_MASK, STATUS_BUFFER_SIZE};
use crate::transfer::{TransferProgress, WriteStatus};

pub const INITIAL_STATUS: &[u8] = b"Hello, USB!";

/// What the device answers to a SETUP packet
#[derive(Debug, PartialEq, Eq)]
pub enum SetupResponse<'a> {
    /// Data stage served straight from this slice. Empty for a plain acknowledgement.
    Reply(&'a [u8]),
    /// The data stage is served packet by packet through
    /// [`ControlHandler::on_write_packet`] or [`ControlHandler::on_read_packet`].
    Chunked,
}

/// The callbacks a USB driver invokes while servicing endpoint 0.
///
/// All three are called synchronously from the driver's poll routine, one transfer at a time.
pub trait ControlHandler {
    fn on_setup(&mut self, setup: &SetupPacket) -> SetupResponse<'_>;

    /// Consumes one OUT packet of a chunked transfer.
    fn on_write_packet(&mut self, packet: &[u8]) -> WriteStatus;

    /// Produces one IN packet of a chunked transfer. Returns 0 once the transfer is exhausted.
    fn on_read_packet(&mut self, slot: &mut [u8]) -> usize;
}

/// Device state behind the vendor requests: the LED port, the status string and the data buffer.
pub struct Dispatcher<P: LedPort> {
    port: P,
    status: [u8; STATUS_BUFFER_SIZE],
    data: [u8; DATA_BUFFER_SIZE],
    led_reply: [u8; 1],
    progress: TransferProgress,
}

impl<P: LedPort> Dispatcher<P> {
    pub fn new(port: P) -> Self {
        let mut status = [0u8; STATUS_BUFFER_SIZE];
        status[..INITIAL_STATUS.len()].copy_from_slice(INITIAL_STATUS);

        Dispatcher {
            port,
            status,
            data: [0u8; DATA_BUFFER_SIZE],
            led_reply: [0u8; 1],
            progress: TransferProgress::default(),
        }
    }

    pub fn port(&self) -> &P {
        &self.port
    }

    pub fn port_mut(&mut self) -> &mut P {
        &mut self.port
    }

    pub fn status(&self) -> &[u8; STATUS_BUFFER_SIZE] {
        &self.status
    }

    pub fn data(&self) -> &[u8; DATA_BUFFER_SIZE] {
        &self.data
    }

    pub fn progress(&self) -> TransferProgress {
        self.progress
    }
}

impl<P: LedPort> ControlHandler for Dispatcher<P> {
    fn on_setup(&mut self, setup: &SetupPacket) -> SetupResponse<'_> {
        let Some(request) = setup.decoded_request() else {
            debug!(request = setup.request, "Ignoring unknown request");
            return SetupResponse::Reply(&[]);
        };
        debug!(?request, value = setup.value, index = setup.index, length = setup.length, "Setup");

        match request {
            Request::SetLed => {
                let [leds, _] = setup.value.to_le_bytes();
                self.port
                    .modify(|port| (port & !LED_MASK) | (leds & LED_MASK));
                SetupResponse::Reply(&[])
            }
            Request::GetLed => {
                self.led_reply[0] = self.port.read() & LED_MASK;
                SetupResponse::Reply(&self.led_reply)
            }
            Request::StatusRead => SetupResponse::Reply(&self.status),
            Request::StatusWrite => {
                let [value_lo, value_hi] = setup.value.to_le_bytes();
                let [index_lo, index_hi] = setup.index.to_le_bytes();
                self.status[..4].copy_from_slice(&[value_lo, value_hi, index_lo, index_hi]);
                SetupResponse::Reply(&[])
            }
            Request::DataWrite | Request::DataRead => {
                self.progress.arm(setup.length, self.data.len());
                trace!(length = self.progress.length(), "Armed chunked transfer");
                SetupResponse::Chunked
            }
        }
    }

    fn on_write_packet(&mut self, packet: &[u8]) -> WriteStatus {
        let taken = self.progress.receive(&mut self.data, packet);
        trace!(
            taken,
            transferred = self.progress.transferred(),
            length = self.progress.length(),
            "Received packet"
        );

        if self.progress.is_complete() {
            WriteStatus::Complete
        } else {
            WriteStatus::InProgress
        }
    }

    fn on_read_packet(&mut self, slot: &mut [u8]) -> usize {
        let produced = self.progress.send(&self.data, slot);
        trace!(
            produced,
            transferred = self.progress.transferred(),
            length = self.progress.length(),
            "Sent packet"
        );
        produced
    }
}
