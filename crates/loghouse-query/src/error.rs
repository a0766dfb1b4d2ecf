use thiserror::Error;

pub type Result<T> = std::result::Result<T, QueryError>;

#[derive(Debug, Error)]
pub enum QueryError {
    /// The filter grammar was violated (e.g. a malformed `search_keys`
    /// pair). The whole filter is rejected; there is no partial parse.
    #[error("Invalid filter: {0}")]
    InvalidFilter(String),

    /// Single-record lookup found no payload row for the id.
    #[error("Log record not found")]
    NotFound,

    /// A stored payload failed to parse as a validated event. Ingestion
    /// validates everything it accepts, so this indicates corruption.
    #[error("Stored payload is corrupt: {0}")]
    CorruptPayload(String),

    /// The index store failed; without the metadata scan there is nothing
    /// to return. (Payload-store failures during hydration are tolerated
    /// and never surface here.)
    #[error("Store error: {0}")]
    Store(#[from] loghouse_store::StoreError),
}
