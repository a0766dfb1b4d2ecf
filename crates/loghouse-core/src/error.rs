use thiserror::Error;

pub type Result<T> = std::result::Result<T, CoreError>;

#[derive(Debug, Error)]
pub enum CoreError {
    /// The outer envelope is structurally broken (empty project id, empty
    /// payload).
    #[error("Invalid envelope: {0}")]
    InvalidEnvelope(String),

    /// The inner event payload violates the validated contract (missing
    /// name, zero timestamp).
    #[error("Invalid event payload: {0}")]
    InvalidPayload(String),

    /// The bytes are not well-formed JSON for the expected shape.
    #[error("Malformed JSON: {0}")]
    Json(#[from] serde_json::Error),
}
