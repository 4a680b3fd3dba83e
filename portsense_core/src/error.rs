use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PortError {
    /// Signal matched no classification entry; the port waits for removal.
    #[error("classification ambiguous on {port}: {detail}")]
    ClassificationAmbiguous { port: String, detail: String },
    /// Registry refused a valid classification; the port stays device-less.
    #[error("attach failed on {port}: {reason}")]
    AttachFailed { port: String, reason: String },
    /// Pin/signal collaborator failure while bringing a port up.
    #[error("resource unavailable on {port}: {reason}")]
    ResourceUnavailable { port: String, reason: String },
    #[error("invalid mode '{mode}' for {port}")]
    InvalidModeTransition { port: String, mode: String },
    #[error("unknown port: {0}")]
    UnknownPort(String),
    #[error("port {0} is already configured")]
    DuplicatePort(String),
    #[error("dispatcher stopped")]
    DispatcherStopped,
}

#[derive(Debug, Error, Clone)]
pub enum BuildError {
    #[error("missing signal source")]
    MissingIo,
    #[error("missing device registry")]
    MissingRegistry,
    #[error("invalid config: {0}")]
    InvalidConfig(&'static str),
}

pub type Result<T> = eyre::Result<T>;
pub use eyre::Report;
