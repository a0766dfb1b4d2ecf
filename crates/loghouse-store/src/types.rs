//! Row and filter types shared by every storage backend.

use std::collections::HashMap;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One row of the payload projection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayloadEntry {
    pub project_id: String,
    /// Event time in milliseconds since the Unix epoch.
    pub event_timestamp: i64,
    /// Processor-minted UUIDv7; join key to the index projection.
    pub record_id: Uuid,
    /// The validated event payload, verbatim as published.
    pub raw_payload: Bytes,
}

/// One row of the index projection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    pub project_id: String,
    pub event_name: String,
    pub event_timestamp: i64,
    pub record_id: Uuid,
    pub searchable_keys: HashMap<String, String>,
}

/// Grouped aggregation result for one event name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventAggregate {
    pub event_name: String,
    pub total_count: u64,
    /// Maximum event timestamp observed for this name, epoch milliseconds.
    pub last_seen: i64,
}

/// Conjunctive filter over the index projection.
///
/// Every populated field narrows the result; all constraints are ANDed.
/// This is the structured predicate list each backend compiles to its own
/// parameterized query — caller-controlled values never reach query text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogFilter {
    /// Exact event-name match.
    pub event_name: Option<String>,
    /// Inclusive lower bound on event timestamp (epoch milliseconds).
    pub start_time: Option<i64>,
    /// Inclusive upper bound on event timestamp (epoch milliseconds).
    pub end_time: Option<i64>,
    /// Exact `key = value` constraints against `searchable_keys`.
    pub search_keys: Vec<(String, String)>,
}

impl LogFilter {
    pub fn is_empty(&self) -> bool {
        self.event_name.is_none()
            && self.start_time.is_none()
            && self.end_time.is_none()
            && self.search_keys.is_empty()
    }
}

/// Pagination window for index queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub limit: u32,
    pub offset: u32,
}

impl Page {
    pub const DEFAULT_LIMIT: u32 = 100;

    pub fn new(limit: u32, offset: u32) -> Self {
        Self { limit, offset }
    }
}

impl Default for Page {
    fn default() -> Self {
        Self {
            limit: Self::DEFAULT_LIMIT,
            offset: 0,
        }
    }
}

/// A registered project, as seen through the access-control boundary.
///
/// `log_ttl_seconds` is retention intent recorded with the project; the
/// pipeline stores it but enforcement belongs to an external reaper.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Project {
    pub id: String,
    pub name: String,
    pub log_ttl_seconds: i64,
}
