use thiserror::Error;

pub type Result<T> = std::result::Result<T, ProcessError>;

#[derive(Debug, Error)]
pub enum ProcessError {
    /// Polling or committing against the bus failed. Store failures are not
    /// errors at this level — they drop the message and are logged.
    #[error("Bus error: {0}")]
    Bus(#[from] loghouse_bus::BusError),

    #[error("Configuration error: {0}")]
    Config(String),
}
