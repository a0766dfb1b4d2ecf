//! Request and response models for the REST endpoints.

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct IngestResponse {
    pub status: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
}

/// Query parameters for the log query endpoint.
#[derive(Debug, Deserialize, IntoParams)]
pub struct LogQueryParams {
    /// Exact event-name match.
    pub event_name: Option<String>,
    /// Inclusive lower bound on event timestamp, epoch milliseconds.
    pub start_time: Option<i64>,
    /// Inclusive upper bound on event timestamp, epoch milliseconds.
    pub end_time: Option<i64>,
    /// Equality filters, `k1:v1,k2:v2` syntax.
    pub search_keys: Option<String>,
    /// Page size (default 100, capped server-side).
    pub limit: Option<u32>,
    /// Rows to skip (default 0).
    pub offset: Option<u32>,
}

/// Query parameters for the aggregation endpoint: the query grammar minus
/// pagination.
#[derive(Debug, Deserialize, IntoParams)]
pub struct AggregateQueryParams {
    pub event_name: Option<String>,
    pub start_time: Option<i64>,
    pub end_time: Option<i64>,
    pub search_keys: Option<String>,
}
