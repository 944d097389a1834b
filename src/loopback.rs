use custom_class_device::hal::MemoryPort;
use custom_class_device::protocol::{Direction, SetupPacket, ENDPOINT0_PACKET_SIZE};
use custom_class_device::{ControlHandler, Dispatcher, SetupResponse, WriteStatus};
use tracing::trace;

use crate::error::DriverError;
use crate::transport::ControlTransport;

/// The device firmware running in-process.
///
/// Each control transfer is played against the [`Dispatcher`] the way a low speed USB driver would:
/// the SETUP stage goes to `on_setup`, and chunked data stages are split into 8 byte packets.
pub struct LoopbackTransport {
    dispatcher: Dispatcher<MemoryPort>,
}

impl LoopbackTransport {
    pub fn new() -> Self {
        LoopbackTransport {
            dispatcher: Dispatcher::new(MemoryPort::new()),
        }
    }

    pub fn dispatcher(&self) -> &Dispatcher<MemoryPort> {
        &self.dispatcher
    }
}

impl Default for LoopbackTransport {
    fn default() -> Self {
        Self::new()
    }
}

fn w_length(len: usize) -> u16 {
    u16::try_from(len).unwrap_or(u16::MAX)
}

/// Puts a vendor SETUP stage on the wire and decodes it on the device end.
pub fn setup_stage(
    direction: Direction,
    request: u8,
    value: u16,
    index: u16,
    length: u16,
) -> Result<SetupPacket, DriverError> {
    let wire = SetupPacket::vendor(direction, request, value, index, length).to_bytes();
    trace!("SETUP {:02x?}", wire);
    Ok(SetupPacket::from_bytes(&wire)?)
}

impl ControlTransport for LoopbackTransport {
    fn read_control(
        &mut self,
        request: u8,
        value: u16,
        index: u16,
        buf: &mut [u8],
    ) -> Result<usize, DriverError> {
        let length = w_length(buf.len());
        let setup = setup_stage(Direction::In, request, value, index, length)?;
        let length = usize::from(length);

        match self.dispatcher.on_setup(&setup) {
            SetupResponse::Reply(data) => {
                // Never send more than the host asked for
                let count = data.len().min(length);
                buf[..count].copy_from_slice(&data[..count]);
                Ok(count)
            }
            SetupResponse::Chunked => {
                let mut received = 0;
                while received < length {
                    let end = (received + ENDPOINT0_PACKET_SIZE).min(length);
                    let slot = &mut buf[received..end];
                    let slot_len = slot.len();
                    let produced = self.dispatcher.on_read_packet(slot);
                    received += produced;
                    trace!(produced, received, "IN packet");
                    // A short packet ends the data stage
                    if produced < slot_len {
                        break;
                    }
                }
                Ok(received)
            }
        }
    }

    fn write_control(
        &mut self,
        request: u8,
        value: u16,
        index: u16,
        data: &[u8],
    ) -> Result<usize, DriverError> {
        let length = w_length(data.len());
        let setup = setup_stage(Direction::Out, request, value, index, length)?;
        let data = &data[..usize::from(length)];

        match self.dispatcher.on_setup(&setup) {
            // The data stage, if any, is acknowledged and dropped
            SetupResponse::Reply(_) => Ok(data.len()),
            SetupResponse::Chunked => {
                for packet in data.chunks(ENDPOINT0_PACKET_SIZE) {
                    let status = self.dispatcher.on_write_packet(packet);
                    trace!(len = packet.len(), ?status, "OUT packet");
                    if status == WriteStatus::Complete {
                        break;
                    }
                }
                Ok(self.dispatcher.progress().transferred())
            }
        }
    }
}
