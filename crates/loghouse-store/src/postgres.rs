//! PostgreSQL-backed store implementations (feature `postgres`).
//!
//! The multi-node backend. Same trait surface and semantics as the SQLite
//! implementations; differences are mechanical: `$n` placeholders, `BIGINT`
//! timestamps, and `searchable_keys` as JSONB filtered with parameterized
//! `->>` predicates.
//!
//! Placeholder positions are assigned while the predicate list is compiled,
//! and values are bound in the same order — caller-controlled strings never
//! reach query text.

use std::collections::HashMap;

use async_trait::async_trait;
use bytes::Bytes;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::Row;
use uuid::Uuid;

use crate::error::Result;
use crate::types::{EventAggregate, IndexEntry, LogFilter, Page, PayloadEntry, Project};
use crate::{hash_credential, now_ms, AccessControl, IndexStore, PayloadStore};

async fn open_pool(url: &str) -> Result<PgPool> {
    let pool = PgPoolOptions::new().max_connections(20).connect(url).await?;
    Ok(pool)
}

/// Append the filter predicates to `sql`, continuing placeholder numbering
/// from `next` (the first unused placeholder index). Returns the next unused
/// index.
fn push_filter_sql(sql: &mut String, filter: &LogFilter, mut next: u32) -> u32 {
    if filter.event_name.is_some() {
        sql.push_str(&format!(" AND event_name = ${next}"));
        next += 1;
    }
    if filter.start_time.is_some() {
        sql.push_str(&format!(" AND event_timestamp >= ${next}"));
        next += 1;
    }
    if filter.end_time.is_some() {
        sql.push_str(&format!(" AND event_timestamp <= ${next}"));
        next += 1;
    }
    for _ in &filter.search_keys {
        sql.push_str(&format!(
            " AND searchable_keys ->> ${} = ${}",
            next,
            next + 1
        ));
        next += 2;
    }
    next
}

/// Bind the filter values in the order [`push_filter_sql`] numbered them.
fn bind_filter<'q>(
    mut query: sqlx::query::Query<'q, sqlx::Postgres, sqlx::postgres::PgArguments>,
    filter: &'q LogFilter,
) -> sqlx::query::Query<'q, sqlx::Postgres, sqlx::postgres::PgArguments> {
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
        query = query.bind(key).bind(value);
    }
    query
}

// ============================================================
// PAYLOAD STORE
// ============================================================

pub struct PgPayloadStore {
    pool: PgPool,
}

impl PgPayloadStore {
    pub async fn new(url: &str) -> Result<Self> {
        let store = Self {
            pool: open_pool(url).await?,
        };
        store.init_schema().await?;
        Ok(store)
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn init_schema(&self) -> Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS log_payloads (
                project_id TEXT NOT NULL,
                event_timestamp BIGINT NOT NULL,
                record_id TEXT NOT NULL,
                raw_payload TEXT NOT NULL,
                PRIMARY KEY (project_id, event_timestamp, record_id)
            )",
        )
        .execute(&self.pool)
        .await?;

        // Reverse-chronological scans within a project.
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_log_payloads_scan
             ON log_payloads (project_id, event_timestamp DESC, record_id DESC)",
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
impl PayloadStore for PgPayloadStore {
    async fn insert(&self, entry: &PayloadEntry) -> Result<()> {
        sqlx::query(
            "INSERT INTO log_payloads (project_id, event_timestamp, record_id, raw_payload)
             VALUES ($1, $2, $3, $4)",
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
             WHERE project_id = $1 AND event_timestamp = $2 AND record_id = $3",
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
             FROM log_payloads WHERE record_id = $1",
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

pub struct PgIndexStore {
    pool: PgPool,
}

impl PgIndexStore {
    pub async fn new(url: &str) -> Result<Self> {
        let store = Self {
            pool: open_pool(url).await?,
        };
        store.init_schema().await?;
        Ok(store)
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn init_schema(&self) -> Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS log_index (
                project_id TEXT NOT NULL,
                event_name TEXT NOT NULL,
                event_timestamp BIGINT NOT NULL,
                record_id TEXT NOT NULL,
                searchable_keys JSONB NOT NULL DEFAULT '{}'::jsonb,
                received_at BIGINT NOT NULL,
                PRIMARY KEY (project_id, event_name, event_timestamp, record_id)
            )",
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl IndexStore for PgIndexStore {
    async fn insert(&self, entry: &IndexEntry) -> Result<()> {
        let keys_json = serde_json::to_value(&entry.searchable_keys)?;
        sqlx::query(
            "INSERT INTO log_index
                 (project_id, event_name, event_timestamp, record_id, searchable_keys, received_at)
             VALUES ($1, $2, $3, $4, $5, $6)",
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
             FROM log_index WHERE project_id = $1",
        );
        let next = push_filter_sql(&mut sql, filter, 2);
        sql.push_str(&format!(
            " ORDER BY event_name, event_timestamp, record_id LIMIT ${} OFFSET ${}",
            next,
            next + 1
        ));

        let query = sqlx::query(&sql).bind(project_id);
        let query = bind_filter(query, filter)
            .bind(page.limit as i64)
            .bind(page.offset as i64);

        let rows = query.fetch_all(&self.pool).await?;

        rows.into_iter()
            .map(|r| {
                let keys: HashMap<String, String> =
                    serde_json::from_value(r.get("searchable_keys")).unwrap_or_default();
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
             FROM log_index WHERE project_id = $1",
        );
        push_filter_sql(&mut sql, filter, 2);
        sql.push_str(" GROUP BY event_name ORDER BY event_name");

        let query = sqlx::query(&sql).bind(project_id);
        let rows = bind_filter(query, filter).fetch_all(&self.pool).await?;

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

pub struct PgAccessStore {
    pool: PgPool,
}

impl PgAccessStore {
    pub async fn new(url: &str) -> Result<Self> {
        let store = Self {
            pool: open_pool(url).await?,
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
                log_ttl_seconds BIGINT NOT NULL DEFAULT 0,
                created_at BIGINT NOT NULL
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
                expires_at BIGINT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn register_project(&self, project: &Project, api_key: &str) -> Result<()> {
        sqlx::query(
            "INSERT INTO projects (id, name, api_key_hash, log_ttl_seconds, created_at)
             VALUES ($1, $2, $3, $4, $5)",
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

    pub async fn grant_access(&self, user_id: &str, project_id: &str) -> Result<()> {
        sqlx::query(
            "INSERT INTO user_project_access (user_id, project_id, role)
             VALUES ($1, $2, 'member')
             ON CONFLICT (user_id, project_id) DO NOTHING",
        )
        .bind(user_id)
        .bind(project_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn create_session(
        &self,
        token: &str,
        user_id: &str,
        expires_at: i64,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO sessions (token_hash, user_id, expires_at)
             VALUES ($1, $2, $3)
             ON CONFLICT (token_hash)
             DO UPDATE SET user_id = $2, expires_at = $3",
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
impl AccessControl for PgAccessStore {
    async fn validate_credential(&self, project_id: &str, api_key: &str) -> Result<bool> {
        let row = sqlx::query("SELECT 1 FROM projects WHERE id = $1 AND api_key_hash = $2")
            .bind(project_id)
            .bind(hash_credential(api_key))
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    async fn check_access(&self, user_id: &str, project_id: &str) -> Result<bool> {
        let row = sqlx::query(
            "SELECT 1 FROM user_project_access WHERE user_id = $1 AND project_id = $2",
        )
        .bind(user_id)
        .bind(project_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.is_some())
    }

    async fn resolve_session(&self, token: &str) -> Result<Option<String>> {
        let row = sqlx::query(
            "SELECT user_id FROM sessions WHERE token_hash = $1 AND expires_at > $2",
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
