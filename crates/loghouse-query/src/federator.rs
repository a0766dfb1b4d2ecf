//! Query federation and aggregation over the two stores.

use std::sync::Arc;

use loghouse_core::LogEventPayload;
use loghouse_store::{
    EventAggregate, IndexStore, LogFilter, Page, PayloadStore,
};
use serde_json::value::RawValue;
use tracing::warn;
use uuid::Uuid;

use crate::error::{QueryError, Result};
use crate::record::LogRecord;

/// Hard upper bound on a caller-supplied page limit.
pub const MAX_LIMIT: u32 = 1000;

fn clamp_page(page: Page) -> Page {
    Page {
        limit: page.limit.min(MAX_LIMIT),
        offset: page.offset,
    }
}

/// Pull the `full_payload` back out of a stored validated event.
fn extract_full_payload(record_id: Uuid, raw: &[u8]) -> Option<Box<RawValue>> {
    match LogEventPayload::decode(raw) {
        Ok(event) => Some(event.full_payload),
        Err(e) => {
            warn!(record_id = %record_id, error = %e, "Stored payload failed to parse; returning row without payload");
            None
        }
    }
}

/// Composes the index scan with per-row payload hydration.
pub struct QueryFederator {
    index_store: Arc<dyn IndexStore>,
    payload_store: Arc<dyn PayloadStore>,
}

impl QueryFederator {
    pub fn new(index_store: Arc<dyn IndexStore>, payload_store: Arc<dyn PayloadStore>) -> Self {
        Self {
            index_store,
            payload_store,
        }
    }

    /// Filtered, paginated scan with hydration.
    ///
    /// Rows come back in the index store's natural clustering order, so the
    /// same filter and page always yield the same sequence while no new
    /// data arrives. Hydration failures degrade individual rows to
    /// `payload: None` — they never fail the query.
    pub async fn query_logs(
        &self,
        project_id: &str,
        filter: &LogFilter,
        page: Page,
    ) -> Result<Vec<LogRecord>> {
        let page = clamp_page(page);
        let rows = self.index_store.query(project_id, filter, &page).await?;

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            let payload = match self
                .payload_store
                .fetch(project_id, row.event_timestamp, row.record_id)
                .await
            {
                Ok(Some(raw)) => extract_full_payload(row.record_id, &raw),
                Ok(None) => {
                    warn!(
                        project = project_id,
                        record_id = %row.record_id,
                        "Payload row missing during hydration"
                    );
                    None
                }
                Err(e) => {
                    warn!(
                        project = project_id,
                        record_id = %row.record_id,
                        error = %e,
                        "Payload fetch failed during hydration"
                    );
                    None
                }
            };

            records.push(LogRecord {
                id: row.record_id,
                project_id: row.project_id,
                event_name: row.event_name,
                timestamp: row.event_timestamp,
                searchable_keys: row.searchable_keys,
                payload,
            });
        }

        Ok(records)
    }

    /// Single-record lookup by id alone, bypassing project/time scoping in
    /// the store. The project check still applies: a row belonging to a
    /// different project is reported as [`QueryError::NotFound`] rather
    /// than leaked.
    pub async fn get_log(&self, project_id: &str, record_id: Uuid) -> Result<LogRecord> {
        let entry = self
            .payload_store
            .fetch_by_record_id(record_id)
            .await?
            .ok_or(QueryError::NotFound)?;

        if entry.project_id != project_id {
            return Err(QueryError::NotFound);
        }

        let event = LogEventPayload::decode(&entry.raw_payload)
            .map_err(|e| QueryError::CorruptPayload(e.to_string()))?;

        Ok(LogRecord {
            id: record_id,
            project_id: entry.project_id,
            event_name: event.name,
            timestamp: entry.event_timestamp,
            searchable_keys: event.searchable_keys,
            payload: Some(event.full_payload),
        })
    }
}

/// Grouped counts over the index store. Never touches the payload store.
pub struct Aggregator {
    index_store: Arc<dyn IndexStore>,
}

impl Aggregator {
    pub fn new(index_store: Arc<dyn IndexStore>) -> Self {
        Self { index_store }
    }

    /// `(event_name, total_count, last_seen)` per event name matching the
    /// filter, ordered by event name.
    pub async fn aggregate_logs(
        &self,
        project_id: &str,
        filter: &LogFilter,
    ) -> Result<Vec<EventAggregate>> {
        Ok(self.index_store.aggregate(project_id, filter).await?)
    }
}
