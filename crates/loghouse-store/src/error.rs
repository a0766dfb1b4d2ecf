use thiserror::Error;

pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid record id: {0}")]
    InvalidRecordId(#[from] uuid::Error),

    /// Connection establishment exhausted its retry budget, or an operation
    /// timed out. Treated identically to any other store failure by callers.
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}
