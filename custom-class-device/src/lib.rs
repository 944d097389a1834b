//! Device side of the custom-class example: a vendor request dispatcher serving LED control, a
//! status string and a 512 byte data buffer over endpoint 0.

pub mod dispatcher;
pub mod error;
pub mod firmware;
pub mod hal;
pub mod protocol;
pub mod transfer;

pub use dispatcher::{ControlHandler, Dispatcher, SetupResponse};
pub use error::SetupError;
pub use protocol::{Request, SetupPacket};
pub use transfer::{TransferProgress, WriteStatus};
