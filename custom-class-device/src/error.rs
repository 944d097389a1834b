use thiserror::Error;

#[derive(Error, Debug)]
pub enum SetupError {
    #[error("setup packet must be 8 bytes, got {0}")]
    InvalidLength(usize),
}
