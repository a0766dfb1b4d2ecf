//! Federator behavior: hydration, partial results, single-record lookup,
//! and aggregation.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use loghouse_query::{Aggregator, QueryError, QueryFederator};
use loghouse_store::{
    IndexEntry, IndexStore, LogFilter, Page, PayloadEntry, PayloadStore, SqliteIndexStore,
    SqlitePayloadStore, StoreError,
};
use uuid::Uuid;

fn event_json(name: &str, timestamp: i64, payload: &str) -> String {
    format!(
        r#"{{"name":"{name}","timestamp":{timestamp},"searchable_keys":{{"user":"u1"}},"full_payload":{payload}}}"#
    )
}

/// Write both projections for one event, as the processor would.
async fn seed_record(
    index: &SqliteIndexStore,
    payloads: &SqlitePayloadStore,
    project: &str,
    name: &str,
    timestamp: i64,
    payload_json: &str,
) -> Uuid {
    let record_id = Uuid::now_v7();
    payloads
        .insert(&PayloadEntry {
            project_id: project.to_string(),
            event_timestamp: timestamp,
            record_id,
            raw_payload: Bytes::from(event_json(name, timestamp, payload_json)),
        })
        .await
        .unwrap();
    index
        .insert(&IndexEntry {
            project_id: project.to_string(),
            event_name: name.to_string(),
            event_timestamp: timestamp,
            record_id,
            searchable_keys: [("user".to_string(), "u1".to_string())].into(),
        })
        .await
        .unwrap();
    record_id
}

/// Payload store that errors on every scoped fetch.
struct BrokenPayloadStore;

#[async_trait]
impl PayloadStore for BrokenPayloadStore {
    async fn insert(&self, _entry: &PayloadEntry) -> loghouse_store::Result<()> {
        Err(StoreError::Unavailable("down".into()))
    }
    async fn fetch(
        &self,
        _project_id: &str,
        _event_timestamp: i64,
        _record_id: Uuid,
    ) -> loghouse_store::Result<Option<Bytes>> {
        Err(StoreError::Unavailable("down".into()))
    }
    async fn fetch_by_record_id(
        &self,
        _record_id: Uuid,
    ) -> loghouse_store::Result<Option<PayloadEntry>> {
        Err(StoreError::Unavailable("down".into()))
    }
    async fn ping(&self) -> loghouse_store::Result<()> {
        Err(StoreError::Unavailable("down".into()))
    }
}

#[tokio::test]
async fn query_hydrates_full_payload() {
    let index = Arc::new(SqliteIndexStore::new_in_memory().await.unwrap());
    let payloads = Arc::new(SqlitePayloadStore::new_in_memory().await.unwrap());
    let id = seed_record(&index, &payloads, "acme", "click", 1000, r#"{"button":"buy"}"#).await;

    let federator = QueryFederator::new(index, payloads);
    let filter = LogFilter {
        event_name: Some("click".to_string()),
        search_keys: vec![("user".to_string(), "u1".to_string())],
        ..Default::default()
    };
    let records = federator
        .query_logs("acme", &filter, Page::default())
        .await
        .unwrap();

    assert_eq!(records.len(), 1);
    let record = &records[0];
    assert_eq!(record.id, id);
    assert_eq!(record.event_name, "click");
    assert_eq!(record.timestamp, 1000);
    assert_eq!(record.searchable_keys["user"], "u1");
    // The hydrated payload is the original full_payload, verbatim.
    assert_eq!(record.payload.as_ref().unwrap().get(), r#"{"button":"buy"}"#);
}

#[tokio::test]
async fn hydration_miss_degrades_to_absent_payload() {
    let index = Arc::new(SqliteIndexStore::new_in_memory().await.unwrap());
    let payloads = Arc::new(SqlitePayloadStore::new_in_memory().await.unwrap());

    // Index row with no payload row behind it.
    index
        .insert(&IndexEntry {
            project_id: "acme".to_string(),
            event_name: "click".to_string(),
            event_timestamp: 1000,
            record_id: Uuid::now_v7(),
            searchable_keys: Default::default(),
        })
        .await
        .unwrap();

    let federator = QueryFederator::new(index, payloads);
    let records = federator
        .query_logs("acme", &LogFilter::default(), Page::default())
        .await
        .unwrap();

    assert_eq!(records.len(), 1, "the row is returned, not dropped");
    assert!(records[0].payload.is_none());
}

#[tokio::test]
async fn payload_store_failure_yields_partial_results_not_error() {
    let index = Arc::new(SqliteIndexStore::new_in_memory().await.unwrap());
    index
        .insert(&IndexEntry {
            project_id: "acme".to_string(),
            event_name: "click".to_string(),
            event_timestamp: 1000,
            record_id: Uuid::now_v7(),
            searchable_keys: Default::default(),
        })
        .await
        .unwrap();

    let federator = QueryFederator::new(index, Arc::new(BrokenPayloadStore));
    let records = federator
        .query_logs("acme", &LogFilter::default(), Page::default())
        .await
        .unwrap();

    assert_eq!(records.len(), 1);
    assert!(records[0].payload.is_none());
}

#[tokio::test]
async fn repeated_queries_are_identical() {
    let index = Arc::new(SqliteIndexStore::new_in_memory().await.unwrap());
    let payloads = Arc::new(SqlitePayloadStore::new_in_memory().await.unwrap());
    for timestamp in [1000, 2000, 3000] {
        seed_record(&index, &payloads, "acme", "click", timestamp, "{}").await;
    }

    let federator = QueryFederator::new(index, payloads);
    let page = Page::new(2, 1);
    let first = federator
        .query_logs("acme", &LogFilter::default(), page)
        .await
        .unwrap();
    let second = federator
        .query_logs("acme", &LogFilter::default(), page)
        .await
        .unwrap();

    let ids = |records: &[loghouse_query::LogRecord]| {
        records.iter().map(|r| r.id).collect::<Vec<_>>()
    };
    assert_eq!(ids(&first), ids(&second));
    assert_eq!(first.len(), 2);
}

#[tokio::test]
async fn get_log_returns_full_record() {
    let index = Arc::new(SqliteIndexStore::new_in_memory().await.unwrap());
    let payloads = Arc::new(SqlitePayloadStore::new_in_memory().await.unwrap());
    let id = seed_record(&index, &payloads, "acme", "signup", 555, r#"{"plan":"pro"}"#).await;

    let federator = QueryFederator::new(index, payloads);
    let record = federator.get_log("acme", id).await.unwrap();

    assert_eq!(record.id, id);
    assert_eq!(record.event_name, "signup");
    assert_eq!(record.timestamp, 555);
    assert_eq!(record.payload.as_ref().unwrap().get(), r#"{"plan":"pro"}"#);
}

#[tokio::test]
async fn get_log_not_found() {
    let index = Arc::new(SqliteIndexStore::new_in_memory().await.unwrap());
    let payloads = Arc::new(SqlitePayloadStore::new_in_memory().await.unwrap());
    let federator = QueryFederator::new(index, payloads);

    let err = federator.get_log("acme", Uuid::now_v7()).await.unwrap_err();
    assert!(matches!(err, QueryError::NotFound));
}

#[tokio::test]
async fn get_log_does_not_leak_other_projects() {
    let index = Arc::new(SqliteIndexStore::new_in_memory().await.unwrap());
    let payloads = Arc::new(SqlitePayloadStore::new_in_memory().await.unwrap());
    let id = seed_record(&index, &payloads, "other", "click", 1, "{}").await;

    let federator = QueryFederator::new(index, payloads);
    let err = federator.get_log("acme", id).await.unwrap_err();
    assert!(matches!(err, QueryError::NotFound));
}

#[tokio::test]
async fn aggregator_groups_counts_and_last_seen() {
    let index = Arc::new(SqliteIndexStore::new_in_memory().await.unwrap());
    let payloads = Arc::new(SqlitePayloadStore::new_in_memory().await.unwrap());
    for timestamp in [100, 200, 300] {
        seed_record(&index, &payloads, "acme", "a", timestamp, "{}").await;
    }
    for timestamp in [150, 250] {
        seed_record(&index, &payloads, "acme", "b", timestamp, "{}").await;
    }

    let aggregator = Aggregator::new(index);
    let aggregates = aggregator
        .aggregate_logs("acme", &LogFilter::default())
        .await
        .unwrap();

    assert_eq!(aggregates.len(), 2);
    assert_eq!(aggregates[0].event_name, "a");
    assert_eq!(aggregates[0].total_count, 3);
    assert_eq!(aggregates[0].last_seen, 300);
    assert_eq!(aggregates[1].event_name, "b");
    assert_eq!(aggregates[1].total_count, 2);
    assert_eq!(aggregates[1].last_seen, 250);
}
