use thiserror::Error;

#[derive(Debug, Error)]
pub enum HwError {
    #[error("gpio error: {0}")]
    Gpio(String),
    #[error("sensor read timeout")]
    Timeout,
    #[error("bridge channel {channel} did not attach")]
    NotAttached { channel: u32 },
    #[error("bridge channel {channel} already closed")]
    Closed { channel: u32 },
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, HwError>;
