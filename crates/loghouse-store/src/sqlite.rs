//! SQLite-backed store implementations.
//!
//! The default backend: embedded, zero-configuration, good for single-node
//! deployments and the test suites (in-memory constructors). Each store owns
//! its own pool, mirroring the deployment topology where the payload store,
//! the index store, and the account database are separate systems.
//!
//! Schema creation is idempotent (`CREATE TABLE IF NOT EXISTS`) and runs on
//! construction, so a fresh database bootstraps itself and an existing one
//! is left untouched.
//!
//! `searchable_keys` is stored as a JSON text column and filtered with
//! parameterized `json_extract` predicates; the JSON path is a bound value,
//! never spliced into the statement.

use std::collections::HashMap;
use std::str::FromStr;

use async_trait::async_trait;
use bytes::Bytes;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use uuid::Uuid;

use crate::error::Result;
use crate::types::{EventAggregate, IndexEntry, LogFilter, Page, PayloadEntry, Project};
use crate::{hash_credential, now_ms, AccessControl, IndexStore, PayloadStore};

async fn open_pool(path: &str) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(&format!("sqlite://{path}"))?
        .create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .connect_with(options)
        .await?;
    Ok(pool)
}

/// A single-connection pool over a private in-memory database.
///
/// One connection only: every pooled connection to `:memory:` would
/// otherwise open its own empty database.
async fn open_memory_pool() -> Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await?;
    Ok(pool)
}

// ============================================================
// PAYLOAD STORE
// ============================================================

/// SQLite payload projection: `(project_id, event_timestamp DESC,
/// record_id DESC)` primary key for reverse-chronological scans, plus a
/// record-id index for unscoped single-record lookups.
pub struct SqlitePayloadStore {
    pool: SqlitePool,
}

impl SqlitePayloadStore {
    pub async fn new(path: &str) -> Result<Self> {
        let store = Self {
            pool: open_pool(path).await?,
        };
        store.init_schema().await?;
        Ok(store)
    }

    /// In-memory database, for tests.
    pub async fn new_in_memory() -> Result<Self> {
        let store = Self {
            pool: open_memory_pool().await?,
        };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS log_payloads (
                project_id TEXT NOT NULL,
                event_timestamp INTEGER NOT NULL,
                record_id TEXT NOT NULL,
                raw_payload TEXT NOT NULL,
                PRIMARY KEY (project_id, event_timestamp DESC, record_id DESC)
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_log_payloads_record_id
             ON log_payloads (record_id)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl PayloadStore for SqlitePayloadStore {
    async fn insert(&self, entry: &PayloadEntry) -> Result<()> {
        sqlx::query(
            "INSERT INTO log_payloads (project_id, event_timestamp, record_id, raw_payload)
             VALUES (?, ?, ?, ?)",
        )
        .bind(&entry.project_id)
        .bind(entry.event_timestamp)
        .bind(entry.record_id.to_string())
        .bind(String::from_utf8_lossy(&entry.raw_payload).into_owned())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn fetch(
        &self,
        project_id: &str,
        event_timestamp: i64,
        record_id: Uuid,
    ) -> Result<Option<Bytes>> {
        let row = sqlx::query(
            "SELECT raw_payload FROM log_payloads
             WHERE project_id = ? AND event_timestamp = ? AND record_id = ?",
        )
        .bind(project_id)
        .bind(event_timestamp)
        .bind(record_id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| Bytes::from(r.get::<String, _>("raw_payload"))))
    }

    async fn fetch_by_record_id(&self, record_id: Uuid) -> Result<Option<PayloadEntry>> {
        let row = sqlx::query(
            "SELECT project_id, event_timestamp, record_id, raw_payload
             FROM log_payloads WHERE record_id = ?",
        )
        .bind(record_id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| {
            Ok(PayloadEntry {
                project_id: r.get("project_id"),
                event_timestamp: r.get("event_timestamp"),
                record_id: Uuid::parse_str(&r.get::<String, _>("record_id"))?,
                raw_payload: Bytes::from(r.get::<String, _>("raw_payload")),
            })
        })
        .transpose()
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

// ============================================================
// INDEX STORE
// ============================================================

/// SQLite index projection, clustered `(project_id, event_name,
/// event_timestamp)` to match the query and aggregation access paths.
pub struct SqliteIndexStore {
    pool: SqlitePool,
}

impl SqliteIndexStore {
    pub async fn new(path: &str) -> Result<Self> {
        let store = Self {
            pool: open_pool(path).await?,
        };
        store.init_schema().await?;
        Ok(store)
    }

    /// In-memory database, for tests.
    pub async fn new_in_memory() -> Result<Self> {
        let store = Self {
            pool: open_memory_pool().await?,
        };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS log_index (
                project_id TEXT NOT NULL,
                event_name TEXT NOT NULL,
                event_timestamp INTEGER NOT NULL,
                record_id TEXT NOT NULL,
                searchable_keys TEXT NOT NULL DEFAULT '{}',
                received_at INTEGER NOT NULL,
                PRIMARY KEY (project_id, event_name, event_timestamp, record_id)
            )",
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl IndexStore for SqliteIndexStore {
    async fn insert(&self, entry: &IndexEntry) -> Result<()> {
        let keys_json = serde_json::to_string(&entry.searchable_keys)?;
        sqlx::query(
            "INSERT INTO log_index
                 (project_id, event_name, event_timestamp, record_id, searchable_keys, received_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&entry.project_id)
        .bind(&entry.event_name)
        .bind(entry.event_timestamp)
        .bind(entry.record_id.to_string())
        .bind(keys_json)
        .bind(now_ms())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn query(
        &self,
        project_id: &str,
        filter: &LogFilter,
        page: &Page,
    ) -> Result<Vec<IndexEntry>> {
        let mut sql = String::from(
            "SELECT event_name, event_timestamp, record_id, searchable_keys
             FROM log_index WHERE project_id = ?",
        );

        if filter.event_name.is_some() {
            sql.push_str(" AND event_name = ?");
        }
        if filter.start_time.is_some() {
            sql.push_str(" AND event_timestamp >= ?");
        }
        if filter.end_time.is_some() {
            sql.push_str(" AND event_timestamp <= ?");
        }
        for _ in &filter.search_keys {
            sql.push_str(" AND json_extract(searchable_keys, ?) = ?");
        }
        sql.push_str(" ORDER BY event_name, event_timestamp, record_id LIMIT ? OFFSET ?");

        let mut query = sqlx::query(&sql).bind(project_id);
        if let Some(name) = &filter.event_name {
            query = query.bind(name);
        }
        if let Some(t) = filter.start_time {
            query = query.bind(t);
        }
        if let Some(t) = filter.end_time {
            query = query.bind(t);
        }
        for (key, value) in &filter.search_keys {
            query = query.bind(format!("$.\"{key}\"")).bind(value);
        }
        query = query.bind(page.limit as i64).bind(page.offset as i64);

        let rows = query.fetch_all(&self.pool).await?;

        rows.into_iter()
            .map(|r| {
                let keys: HashMap<String, String> =
                    serde_json::from_str(&r.get::<String, _>("searchable_keys"))
                        .unwrap_or_default();
                Ok(IndexEntry {
                    project_id: project_id.to_string(),
                    event_name: r.get("event_name"),
                    event_timestamp: r.get("event_timestamp"),
                    record_id: Uuid::parse_str(&r.get::<String, _>("record_id"))?,
                    searchable_keys: keys,
                })
            })
            .collect()
    }

    async fn aggregate(
        &self,
        project_id: &str,
        filter: &LogFilter,
    ) -> Result<Vec<EventAggregate>> {
        let mut sql = String::from(
            "SELECT event_name, COUNT(*) AS total_count, MAX(event_timestamp) AS last_seen
             FROM log_index WHERE project_id = ?",
        );

        if filter.event_name.is_some() {
            sql.push_str(" AND event_name = ?");
        }
        if filter.start_time.is_some() {
            sql.push_str(" AND event_timestamp >= ?");
        }
        if filter.end_time.is_some() {
            sql.push_str(" AND event_timestamp <= ?");
        }
        for _ in &filter.search_keys {
            sql.push_str(" AND json_extract(searchable_keys, ?) = ?");
        }
        sql.push_str(" GROUP BY event_name ORDER BY event_name");

        let mut query = sqlx::query(&sql).bind(project_id);
        if let Some(name) = &filter.event_name {
            query = query.bind(name);
        }
        if let Some(t) = filter.start_time {
            query = query.bind(t);
        }
        if let Some(t) = filter.end_time {
            query = query.bind(t);
        }
        for (key, value) in &filter.search_keys {
            query = query.bind(format!("$.\"{key}\"")).bind(value);
        }

        let rows = query.fetch_all(&self.pool).await?;

        Ok(rows
            .into_iter()
            .map(|r| EventAggregate {
                event_name: r.get("event_name"),
                total_count: r.get::<i64, _>("total_count") as u64,
                last_seen: r.get("last_seen"),
            })
            .collect())
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

// ============================================================
// ACCESS CONTROL
// ============================================================

/// SQLite-backed slice of the account subsystem: just enough to validate
/// credentials, check project grants, and resolve sessions. Project and
/// user management proper lives elsewhere; the seed methods here exist for
/// single-node bootstrap and tests.
pub struct SqliteAccessStore {
    pool: SqlitePool,
}

impl SqliteAccessStore {
    pub async fn new(path: &str) -> Result<Self> {
        let store = Self {
            pool: open_pool(path).await?,
        };
        store.init_schema().await?;
        Ok(store)
    }

    /// In-memory database, for tests.
    pub async fn new_in_memory() -> Result<Self> {
        let store = Self {
            pool: open_memory_pool().await?,
        };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS projects (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                api_key_hash TEXT NOT NULL,
                log_ttl_seconds INTEGER NOT NULL DEFAULT 0,
                created_at INTEGER NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS user_project_access (
                user_id TEXT NOT NULL,
                project_id TEXT NOT NULL,
                role TEXT NOT NULL DEFAULT 'member',
                PRIMARY KEY (user_id, project_id)
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS sessions (
                token_hash TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                expires_at INTEGER NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Register a project with its API key. The key is stored as a SHA-256
    /// digest only.
    pub async fn register_project(
        &self,
        project: &Project,
        api_key: &str,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO projects (id, name, api_key_hash, log_ttl_seconds, created_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&project.id)
        .bind(&project.name)
        .bind(hash_credential(api_key))
        .bind(project.log_ttl_seconds)
        .bind(now_ms())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Grant `user_id` access to `project_id`. Idempotent.
    pub async fn grant_access(&self, user_id: &str, project_id: &str) -> Result<()> {
        sqlx::query(
            "INSERT OR IGNORE INTO user_project_access (user_id, project_id, role)
             VALUES (?, ?, 'member')",
        )
        .bind(user_id)
        .bind(project_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Record a session token for `user_id`, valid until `expires_at`
    /// (epoch milliseconds). The token is stored as a digest only.
    pub async fn create_session(
        &self,
        token: &str,
        user_id: &str,
        expires_at: i64,
    ) -> Result<()> {
        sqlx::query(
            "INSERT OR REPLACE INTO sessions (token_hash, user_id, expires_at)
             VALUES (?, ?, ?)",
        )
        .bind(hash_credential(token))
        .bind(user_id)
        .bind(expires_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl AccessControl for SqliteAccessStore {
    async fn validate_credential(&self, project_id: &str, api_key: &str) -> Result<bool> {
        let row = sqlx::query("SELECT 1 FROM projects WHERE id = ? AND api_key_hash = ?")
            .bind(project_id)
            .bind(hash_credential(api_key))
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    async fn check_access(&self, user_id: &str, project_id: &str) -> Result<bool> {
        let row = sqlx::query(
            "SELECT 1 FROM user_project_access WHERE user_id = ? AND project_id = ?",
        )
        .bind(user_id)
        .bind(project_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.is_some())
    }

    async fn resolve_session(&self, token: &str) -> Result<Option<String>> {
        let row = sqlx::query(
            "SELECT user_id FROM sessions WHERE token_hash = ? AND expires_at > ?",
        )
        .bind(hash_credential(token))
        .bind(now_ms())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|r| r.get("user_id")))
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
