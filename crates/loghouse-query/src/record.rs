//! The hydrated read model.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;
use uuid::Uuid;

/// A queryable log record: index metadata plus, when hydration succeeded,
/// the original `full_payload`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogRecord {
    /// Processor-minted record id.
    pub id: Uuid,
    pub project_id: String,
    pub event_name: String,
    /// Event time, milliseconds since the Unix epoch.
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub searchable_keys: HashMap<String, String>,
    /// Absent when the payload projection was missing or unreachable at
    /// read time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Box<RawValue>>,
}
