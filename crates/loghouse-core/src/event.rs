//! Validated event payload.
//!
//! The logical event carried inside a [`crate::LogEnvelope`]. Ingestion only
//! accepts this structured shape; the query and aggregation paths depend on
//! `name` and `searchable_keys` being present, so a passthrough body with
//! neither would be unqueryable downstream.

use std::collections::HashMap;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;

use crate::error::{CoreError, Result};

/// A single structured log event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEventPayload {
    /// Event type, e.g. `"click"` or `"checkout_failed"`. Must be non-empty.
    pub name: String,

    /// Event time in milliseconds since the Unix epoch. Distinct from
    /// ingestion time; must be non-zero.
    pub timestamp: i64,

    /// Equality-filterable key/value pairs. Insertion order is irrelevant.
    #[serde(default)]
    pub searchable_keys: HashMap<String, String>,

    /// The full event body, arbitrary JSON, carried verbatim.
    pub full_payload: Box<RawValue>,
}

impl LogEventPayload {
    /// Parse and validate an event payload from raw JSON bytes.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let event: LogEventPayload = serde_json::from_slice(bytes)?;
        event.validate()?;
        Ok(event)
    }

    /// Serialize back to JSON bytes.
    pub fn encode(&self) -> Result<Bytes> {
        Ok(Bytes::from(serde_json::to_vec(self)?))
    }

    /// Check the validated-contract invariants: non-empty `name`, non-zero
    /// `timestamp`.
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(CoreError::InvalidPayload("name is empty".into()));
        }
        if self.timestamp == 0 {
            return Err(CoreError::InvalidPayload("timestamp is zero".into()));
        }
        Ok(())
    }
}
