//! Storage boundary for Loghouse.
//!
//! A durable log record is split across two stores that share one identity,
//! `(project_id, event_timestamp, record_id)`:
//!
//! - the **payload store** keeps the full raw event, keyed for
//!   reverse-chronological scans within a project;
//! - the **index store** keeps the filterable metadata projection, clustered
//!   by `(project_id, event_name, event_timestamp)`, and answers grouped
//!   aggregation queries.
//!
//! The two projections are written independently by the stream processor and
//! are not guaranteed to both exist for a given identity; readers must treat
//! a missing payload as a normal outcome.
//!
//! A third trait, [`AccessControl`], is the interface to the account
//! management subsystem (projects, API keys, users, sessions). That
//! subsystem is out of scope here; this crate only consumes its three
//! checks and ships a minimal SQLite-backed implementation for single-node
//! use and tests.
//!
//! ## Backends
//!
//! All three boundaries are traits, shared as `Arc<dyn ...>` across the
//! publisher, processor, and federator. SQLite implementations (with
//! in-memory constructors for tests) are the default backend; PostgreSQL
//! implementations live behind the `postgres` cargo feature. Queries use
//! sqlx's runtime API (`sqlx::query(...).bind(...)`) so the workspace builds
//! without a DATABASE_URL, and every caller-supplied value is bound as a
//! parameter — never concatenated into query text.

pub mod error;
pub mod retry;
pub mod sqlite;
pub mod types;

#[cfg(feature = "postgres")]
pub mod postgres;

pub use error::{Result, StoreError};
pub use retry::{connect_with_retry, RetrySettings};
pub use sqlite::{SqliteAccessStore, SqliteIndexStore, SqlitePayloadStore};
pub use types::{EventAggregate, IndexEntry, LogFilter, Page, PayloadEntry, Project};

#[cfg(feature = "postgres")]
pub use postgres::{PgAccessStore, PgIndexStore, PgPayloadStore};

use async_trait::async_trait;
use bytes::Bytes;
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Wide-column payload projection: full raw payloads keyed by record
/// identity.
#[async_trait]
pub trait PayloadStore: Send + Sync {
    /// Append one payload row. Rows are immutable once written.
    async fn insert(&self, entry: &PayloadEntry) -> Result<()>;

    /// Point lookup by full record identity. `Ok(None)` when the row is
    /// absent — callers treat that as a hydration miss, not an error.
    async fn fetch(
        &self,
        project_id: &str,
        event_timestamp: i64,
        record_id: Uuid,
    ) -> Result<Option<Bytes>>;

    /// Lookup by record id alone, for single-record reads that bypass
    /// project/time scoping.
    async fn fetch_by_record_id(&self, record_id: Uuid) -> Result<Option<PayloadEntry>>;

    /// Connectivity check for health reporting.
    async fn ping(&self) -> Result<()>;
}

/// Columnar metadata projection: filterable rows plus grouped aggregation.
#[async_trait]
pub trait IndexStore: Send + Sync {
    /// Append one index row. Rows are immutable once written.
    async fn insert(&self, entry: &IndexEntry) -> Result<()>;

    /// Filtered, paginated scan ordered by the store's natural clustering
    /// `(event_name, event_timestamp, record_id)` within the project.
    async fn query(
        &self,
        project_id: &str,
        filter: &LogFilter,
        page: &Page,
    ) -> Result<Vec<IndexEntry>>;

    /// Grouped `(event_name, count, max(event_timestamp))` over the same
    /// filter grammar, without pagination.
    async fn aggregate(&self, project_id: &str, filter: &LogFilter)
        -> Result<Vec<EventAggregate>>;

    /// Connectivity check for health reporting.
    async fn ping(&self) -> Result<()>;
}

/// Interface to the account-management subsystem.
///
/// Credentials are compared by SHA-256 digest (see [`hash_credential`]);
/// plaintext keys and session tokens are never stored.
#[async_trait]
pub trait AccessControl: Send + Sync {
    /// Does `api_key` match the registered credential of `project_id`?
    async fn validate_credential(&self, project_id: &str, api_key: &str) -> Result<bool>;

    /// Does `user_id` hold a grant for `project_id`?
    async fn check_access(&self, user_id: &str, project_id: &str) -> Result<bool>;

    /// Resolve a session token to a user id, if the session exists and has
    /// not expired.
    async fn resolve_session(&self, token: &str) -> Result<Option<String>>;

    /// Connectivity check for health reporting.
    async fn ping(&self) -> Result<()>;
}

/// SHA-256 hex digest of an API key or session token.
pub fn hash_credential(secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    format!("{:x}", hasher.finalize())
}

pub(crate) fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_credential_is_stable_hex() {
        let digest = hash_credential("sk_live_abc");
        assert_eq!(digest.len(), 64);
        assert_eq!(digest, hash_credential("sk_live_abc"));
        assert_ne!(digest, hash_credential("sk_live_abd"));
    }
}
