//! Publisher behavior: auth, validation, framing, channel selection, and
//! the single-attempt contract.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use loghouse_bus::{BusConsumer, BusError, BusProducer, InMemoryBus, PublishAck};
use loghouse_client::{PublishError, Publisher};
use loghouse_core::LogEnvelope;
use loghouse_store::{AccessControl, Project, SqliteAccessStore};

const VALID_BODY: &[u8] =
    br#"{"name":"click","timestamp":1700000000000,"searchable_keys":{"k":"v"},"full_payload":{"x":1}}"#;

async fn access_with_project() -> Arc<SqliteAccessStore> {
    let store = SqliteAccessStore::new_in_memory().await.unwrap();
    store
        .register_project(
            &Project {
                id: "acme".to_string(),
                name: "Acme".to_string(),
                log_ttl_seconds: 0,
            },
            "sk_live_acme",
        )
        .await
        .unwrap();
    Arc::new(store)
}

/// Producer stub that counts publish attempts.
struct CountingProducer {
    attempts: AtomicUsize,
    fail: bool,
}

impl CountingProducer {
    fn new(fail: bool) -> Arc<Self> {
        Arc::new(Self {
            attempts: AtomicUsize::new(0),
            fail,
        })
    }
}

#[async_trait]
impl BusProducer for CountingProducer {
    async fn publish(&self, _key: &[u8], _value: Bytes) -> loghouse_bus::Result<PublishAck> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            Err(BusError::Publish("broker unreachable".into()))
        } else {
            Ok(PublishAck {
                partition: 0,
                offset: 0,
            })
        }
    }
}

#[tokio::test]
async fn rejects_wrong_api_key() {
    let bus = InMemoryBus::new(2);
    let publisher = Publisher::builder()
        .access_store(access_with_project().await)
        .channel(Arc::new(bus.producer()))
        .build()
        .unwrap();

    let err = publisher
        .publish("acme", "wrong-key", VALID_BODY)
        .await
        .unwrap_err();
    assert!(matches!(err, PublishError::Unauthorized(_)));
    // Nothing must reach the bus.
    assert_eq!(bus.partition_len(0) + bus.partition_len(1), 0);
}

#[tokio::test]
async fn rejects_empty_body() {
    let bus = InMemoryBus::new(1);
    let publisher = Publisher::builder()
        .access_store(access_with_project().await)
        .channel(Arc::new(bus.producer()))
        .build()
        .unwrap();

    let err = publisher.publish("acme", "sk_live_acme", b"").await.unwrap_err();
    assert!(matches!(err, PublishError::BadRequest(_)));
}

#[tokio::test]
async fn rejects_unvalidated_payload() {
    let bus = InMemoryBus::new(1);
    let publisher = Publisher::builder()
        .access_store(access_with_project().await)
        .channel(Arc::new(bus.producer()))
        .build()
        .unwrap();

    // Missing name.
    let err = publisher
        .publish("acme", "sk_live_acme", br#"{"timestamp":1,"full_payload":{}}"#)
        .await
        .unwrap_err();
    assert!(matches!(err, PublishError::BadRequest(_)));

    // Zero timestamp.
    let err = publisher
        .publish(
            "acme",
            "sk_live_acme",
            br#"{"name":"click","timestamp":0,"full_payload":{}}"#,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, PublishError::BadRequest(_)));

    assert_eq!(bus.partition_len(0), 0);
}

#[tokio::test]
async fn publishes_envelope_keyed_by_project() {
    let bus = InMemoryBus::new(4);
    let publisher = Publisher::builder()
        .access_store(access_with_project().await)
        .channel(Arc::new(bus.producer()))
        .build()
        .unwrap();

    publisher.publish("acme", "sk_live_acme", VALID_BODY).await.unwrap();

    let mut consumer = bus.subscribe("check");
    let message = consumer
        .poll(Duration::from_millis(100))
        .await
        .unwrap()
        .expect("message on bus");
    assert_eq!(message.key.as_ref(), b"acme");

    let envelope = LogEnvelope::decode(&message.value).unwrap();
    assert_eq!(envelope.project_id, "acme");
    assert_eq!(envelope.payload_bytes(), VALID_BODY);
}

#[tokio::test]
async fn round_robin_spreads_channels_evenly() {
    let channels: Vec<Arc<CountingProducer>> =
        (0..3).map(|_| CountingProducer::new(false)).collect();

    let mut builder = Publisher::builder().access_store(access_with_project().await);
    for channel in &channels {
        builder = builder.channel(channel.clone() as Arc<dyn BusProducer>);
    }
    let publisher = builder.build().unwrap();

    for _ in 0..9 {
        publisher.publish("acme", "sk_live_acme", VALID_BODY).await.unwrap();
    }

    for channel in &channels {
        assert_eq!(channel.attempts.load(Ordering::SeqCst), 3);
    }
}

#[tokio::test]
async fn channel_selection_does_not_break_per_project_order() {
    // Two channels onto the same bus: ordering comes from the partition
    // key, not from which channel carried the publish.
    let bus = InMemoryBus::new(4);
    let publisher = Publisher::builder()
        .access_store(access_with_project().await)
        .channel(Arc::new(bus.producer()))
        .channel(Arc::new(bus.producer()))
        .build()
        .unwrap();

    for i in 0..6u32 {
        let body = format!(
            r#"{{"name":"click","timestamp":{},"full_payload":{{"i":{i}}}}}"#,
            1_700_000_000_000u64 + u64::from(i)
        );
        publisher
            .publish("acme", "sk_live_acme", body.as_bytes())
            .await
            .unwrap();
    }

    let mut consumer = bus.subscribe("check");
    let mut timestamps = Vec::new();
    for _ in 0..6 {
        let message = consumer
            .poll(Duration::from_millis(200))
            .await
            .unwrap()
            .unwrap();
        let envelope = LogEnvelope::decode(&message.value).unwrap();
        let value: serde_json::Value = serde_json::from_str(envelope.payload.get()).unwrap();
        timestamps.push(value["timestamp"].as_i64().unwrap());
    }
    let mut sorted = timestamps.clone();
    sorted.sort_unstable();
    assert_eq!(timestamps, sorted, "publish order must be preserved");
}

#[tokio::test]
async fn publish_failure_is_single_attempt() {
    let failing = CountingProducer::new(true);
    let publisher = Publisher::builder()
        .access_store(access_with_project().await)
        .channel(failing.clone() as Arc<dyn BusProducer>)
        .build()
        .unwrap();

    let err = publisher
        .publish("acme", "sk_live_acme", VALID_BODY)
        .await
        .unwrap_err();
    assert!(matches!(err, PublishError::Bus(_)));
    assert_eq!(
        failing.attempts.load(Ordering::SeqCst),
        1,
        "exactly one publish attempt, no internal retry"
    );
}

#[tokio::test]
async fn builder_requires_access_store_and_channel() {
    let err = Publisher::builder().build().unwrap_err();
    assert!(matches!(err, PublishError::Config(_)));

    let err = Publisher::builder()
        .access_store(access_with_project().await)
        .build()
        .unwrap_err();
    assert!(matches!(err, PublishError::Config(_)));
}
