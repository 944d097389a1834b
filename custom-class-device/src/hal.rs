//! The bits of hardware the firmware touches, kept behind traits so the request handling can run
//! anywhere.

use crate::dispatcher::ControlHandler;

/// An 8 bit output port register
pub trait LedPort {
    fn read(&self) -> u8;
    fn write(&mut self, value: u8);
    /// Configures the lines in `mask` as outputs
    fn make_output(&mut self, mask: u8);

    fn modify(&mut self, f: impl FnOnce(u8) -> u8) {
        let value = self.read();
        self.write(f(value));
    }
}

pub trait Watchdog {
    fn enable(&mut self, timeout_ms: u32);
    fn feed(&mut self);
}

pub trait Delay {
    fn delay_ms(&mut self, ms: u32);
}

/// The USB device driver. `poll` services pending transactions on endpoint 0 and calls back into
/// `handler` synchronously while doing so.
pub trait UsbBus {
    fn disconnect(&mut self);
    fn connect(&mut self);
    fn poll(&mut self, handler: &mut dyn ControlHandler);
}

/// Port register kept in memory, used on the host side of the simulation.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MemoryPort {
    value: u8,
    // Data direction register, a set bit is an output
    direction: u8,
}

impl MemoryPort {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn outputs(&self) -> u8 {
        self.direction
    }
}

impl LedPort for MemoryPort {
    fn read(&self) -> u8 {
        self.value
    }

    fn write(&mut self, value: u8) {
        self.value = value;
    }

    fn make_output(&mut self, mask: u8) {
        self.direction |= mask;
    }
}
