use thiserror::Error;

#[derive(Debug, Error)]
pub enum HwError {
    #[error("gpio error: {0}")]
    Gpio(String),
    #[error("adc error: {0}")]
    Adc(String),
    #[error("port {0} is not wired")]
    UnknownPort(u8),
    #[error("signal fault on port {0}")]
    Fault(u8),
    #[error("registry rejected {driver}: {reason}")]
    Rejected { driver: String, reason: String },
    #[error("unknown device handle {0}")]
    UnknownHandle(u64),
    #[error("simulator state poisoned")]
    Poisoned,
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, HwError>;
