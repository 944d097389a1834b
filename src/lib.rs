//! Host side of the custom-class example: finds the device, talks to it with vendor control
//! transfers, and can stand in for it with an in-process simulation.

pub mod config;
pub mod driver;
pub mod error;
pub mod loopback;
pub mod transport;

pub use config::DeviceConfig;
pub use driver::{CustomClassDevice, TestReport};
pub use error::DriverError;
pub use loopback::LoopbackTransport;
pub use transport::{ControlTransport, UsbTransport};
