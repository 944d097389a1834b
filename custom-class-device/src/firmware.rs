use tracing::{debug, trace};

use crate::dispatcher::Dispatcher;
use crate::hal::{Delay, LedPort, UsbBus, Watchdog};
use crate::protocol::{HEARTBEAT_LED, LED_MASK};

pub const WATCHDOG_TIMEOUT_MS: u32 = 1000;

// Longer than the 250 ms the host needs to notice the disconnect
const REENUMERATION_DELAY_MS: u32 = 255;

/// The device main loop: keeps the watchdog fed, services USB and blinks the heartbeat LED.
pub struct Firmware<P: LedPort, B: UsbBus, W: Watchdog, D: Delay> {
    dispatcher: Dispatcher<P>,
    bus: B,
    watchdog: W,
    delay: D,
    counter: u16,
    heartbeat: bool,
}

impl<P: LedPort, B: UsbBus, W: Watchdog, D: Delay> Firmware<P, B, W, D> {
    pub fn new(port: P, bus: B, watchdog: W, delay: D) -> Self {
        Firmware {
            dispatcher: Dispatcher::new(port),
            bus,
            watchdog,
            delay,
            counter: 0,
            heartbeat: false,
        }
    }

    /// Arms the watchdog and forces the host to re-enumerate the device.
    pub fn start(&mut self) {
        self.watchdog.enable(WATCHDOG_TIMEOUT_MS);
        debug!("Main starts");

        self.bus.disconnect();
        for _ in 0..REENUMERATION_DELAY_MS {
            self.watchdog.feed();
            self.delay.delay_ms(1);
        }
        self.bus.connect();

        self.dispatcher
            .port_mut()
            .make_output(LED_MASK | HEARTBEAT_LED);
        debug!("Main loop starts");
    }

    /// One iteration of the main loop.
    pub fn poll_once(&mut self) {
        trace!("Main loop iterates");
        self.watchdog.feed();
        self.bus.poll(&mut self.dispatcher);

        self.counter = self.counter.wrapping_add(1);
        if self.counter == 0 {
            self.heartbeat = !self.heartbeat;
            let heartbeat = self.heartbeat;
            self.dispatcher.port_mut().modify(|port| {
                if heartbeat {
                    port | HEARTBEAT_LED
                } else {
                    port & !HEARTBEAT_LED
                }
            });
        }
    }

    pub fn run(&mut self) -> ! {
        self.start();
        loop {
            self.poll_once();
        }
    }

    pub fn dispatcher(&self) -> &Dispatcher<P> {
        &self.dispatcher
    }

    pub fn bus_mut(&mut self) -> &mut B {
        &mut self.bus
    }
}
