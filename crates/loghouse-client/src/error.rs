use thiserror::Error;

pub type Result<T> = std::result::Result<T, PublishError>;

#[derive(Debug, Error)]
pub enum PublishError {
    /// The API key does not match the project's registered credential.
    #[error("Invalid API key for project '{0}'")]
    Unauthorized(String),

    /// The request body is empty or fails structured-payload validation.
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// The access-control collaborator could not be reached.
    #[error("Access store error: {0}")]
    Store(#[from] loghouse_store::StoreError),

    /// The single publish attempt failed.
    #[error("Publish failed: {0}")]
    Bus(#[from] loghouse_bus::BusError),

    /// The publisher was misconfigured (no channels, missing access store).
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<loghouse_core::CoreError> for PublishError {
    fn from(e: loghouse_core::CoreError) -> Self {
        PublishError::BadRequest(e.to_string())
    }
}
