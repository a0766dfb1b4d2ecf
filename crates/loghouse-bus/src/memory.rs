//! In-process bus implementation.
//!
//! A partitioned append-only log held in memory. Offsets are vector indexes,
//! consumer groups map to committed positions, and polling waits by
//! re-checking on a short interval. Used by the test suites and by
//! single-node deployments where an external broker is not worth running.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::{BusError, Result};
use crate::{partition_for_key, BusConsumer, BusMessage, BusProducer, PublishAck};

/// How often a blocked poll re-checks the log for new messages.
const POLL_INTERVAL: Duration = Duration::from_millis(10);

struct Shared {
    /// One append-only `(key, value)` log per partition; the offset of a
    /// message is its index.
    partitions: Vec<Mutex<Vec<(Bytes, Bytes)>>>,
    /// Committed next-offset per (group, partition).
    committed: Mutex<HashMap<(String, u32), u64>>,
}

/// A partitioned in-memory message bus.
#[derive(Clone)]
pub struct InMemoryBus {
    shared: Arc<Shared>,
}

impl InMemoryBus {
    /// Create a bus with `partition_count` partitions.
    ///
    /// # Panics
    ///
    /// Panics if `partition_count` is zero.
    pub fn new(partition_count: u32) -> Self {
        assert!(partition_count > 0, "bus needs at least one partition");
        Self {
            shared: Arc::new(Shared {
                partitions: (0..partition_count).map(|_| Mutex::new(Vec::new())).collect(),
                committed: Mutex::new(HashMap::new()),
            }),
        }
    }

    pub fn partition_count(&self) -> u32 {
        self.shared.partitions.len() as u32
    }

    /// A producer handle onto this bus. Cheap to clone; any number of
    /// producers may publish concurrently.
    pub fn producer(&self) -> InMemoryProducer {
        InMemoryProducer {
            shared: Arc::clone(&self.shared),
        }
    }

    /// A consumer for `group` assigned every partition.
    pub fn subscribe(&self, group: impl Into<String>) -> InMemoryConsumer {
        let all: Vec<u32> = (0..self.partition_count()).collect();
        self.subscribe_partitions(group, all)
            .expect("full assignment is always valid")
    }

    /// A consumer for `group` assigned the given partitions. The consumer
    /// resumes from the group's committed offsets.
    pub fn subscribe_partitions(
        &self,
        group: impl Into<String>,
        partitions: Vec<u32>,
    ) -> Result<InMemoryConsumer> {
        let group = group.into();
        let count = self.partition_count();
        for &p in &partitions {
            if p >= count {
                return Err(BusError::UnknownPartition {
                    partition: p,
                    partition_count: count,
                });
            }
        }

        let committed = self.shared.committed.lock().unwrap();
        let positions = partitions
            .iter()
            .map(|&p| {
                let start = committed.get(&(group.clone(), p)).copied().unwrap_or(0);
                (p, start)
            })
            .collect();
        drop(committed);

        Ok(InMemoryConsumer {
            shared: Arc::clone(&self.shared),
            group,
            assignment: partitions,
            positions,
            cursor: 0,
        })
    }

    /// Number of messages appended to `partition`. Test observability.
    pub fn partition_len(&self, partition: u32) -> u64 {
        self.shared.partitions[partition as usize].lock().unwrap().len() as u64
    }

    /// Committed next-offset for `(group, partition)`, if any.
    pub fn committed_offset(&self, group: &str, partition: u32) -> Option<u64> {
        self.shared
            .committed
            .lock()
            .unwrap()
            .get(&(group.to_string(), partition))
            .copied()
    }
}

/// Producer handle for [`InMemoryBus`].
#[derive(Clone)]
pub struct InMemoryProducer {
    shared: Arc<Shared>,
}

#[async_trait]
impl BusProducer for InMemoryProducer {
    async fn publish(&self, key: &[u8], value: Bytes) -> Result<PublishAck> {
        let partition = partition_for_key(key, self.shared.partitions.len() as u32);
        let mut log = self.shared.partitions[partition as usize].lock().unwrap();
        let offset = log.len() as u64;
        log.push((Bytes::copy_from_slice(key), value));
        Ok(PublishAck { partition, offset })
    }
}

/// Consumer handle for [`InMemoryBus`].
///
/// Holds its own read positions; only [`BusConsumer::commit`] writes back to
/// the shared group state. Partitions are drained fairly round-robin, but a
/// single partition's messages are always yielded in offset order.
pub struct InMemoryConsumer {
    shared: Arc<Shared>,
    group: String,
    assignment: Vec<u32>,
    positions: HashMap<u32, u64>,
    cursor: usize,
}

impl std::fmt::Debug for InMemoryConsumer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryConsumer")
            .field("group", &self.group)
            .field("assignment", &self.assignment)
            .field("positions", &self.positions)
            .field("cursor", &self.cursor)
            .finish_non_exhaustive()
    }
}

impl InMemoryConsumer {
    fn try_fetch(&mut self) -> Option<BusMessage> {
        let n = self.assignment.len();
        for step in 0..n {
            let partition = self.assignment[(self.cursor + step) % n];
            let position = self.positions[&partition];
            let log = self.shared.partitions[partition as usize].lock().unwrap();
            if let Some((key, value)) = log.get(position as usize) {
                let message = BusMessage {
                    partition,
                    offset: position,
                    key: key.clone(),
                    value: value.clone(),
                };
                drop(log);
                self.positions.insert(partition, position + 1);
                self.cursor = (self.cursor + step + 1) % n;
                return Some(message);
            }
        }
        None
    }
}

#[async_trait]
impl BusConsumer for InMemoryConsumer {
    async fn poll(&mut self, timeout: Duration) -> Result<Option<BusMessage>> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if let Some(message) = self.try_fetch() {
                return Ok(Some(message));
            }
            if tokio::time::Instant::now() >= deadline {
                return Ok(None);
            }
            tokio::time::sleep(POLL_INTERVAL.min(timeout)).await;
        }
    }

    async fn commit(&mut self, partition: u32, offset: u64) -> Result<()> {
        if !self.assignment.contains(&partition) {
            return Err(BusError::Commit(format!(
                "partition {partition} is not assigned to this consumer"
            )));
        }
        let mut committed = self.shared.committed.lock().unwrap();
        let entry = committed.entry((self.group.clone(), partition)).or_insert(0);
        // Offsets only move forward.
        *entry = (*entry).max(offset + 1);
        Ok(())
    }

    fn assignment(&self) -> &[u32] {
        &self.assignment
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_then_poll_round_trips() {
        let bus = InMemoryBus::new(4);
        let producer = bus.producer();
        let mut consumer = bus.subscribe("g");

        let ack = producer
            .publish(b"acme", Bytes::from_static(b"one"))
            .await
            .unwrap();
        assert_eq!(ack.offset, 0);

        let message = consumer
            .poll(Duration::from_millis(100))
            .await
            .unwrap()
            .expect("message available");
        assert_eq!(message.partition, ack.partition);
        assert_eq!(message.key.as_ref(), b"acme");
        assert_eq!(message.value.as_ref(), b"one");
    }

    #[tokio::test]
    async fn poll_times_out_on_empty_bus() {
        let bus = InMemoryBus::new(1);
        let mut consumer = bus.subscribe("g");
        let polled = consumer.poll(Duration::from_millis(20)).await.unwrap();
        assert!(polled.is_none());
    }

    #[tokio::test]
    async fn same_key_stays_on_one_partition_in_order() {
        let bus = InMemoryBus::new(8);
        let producer = bus.producer();
        for i in 0..10u32 {
            producer
                .publish(b"acme", Bytes::from(i.to_string()))
                .await
                .unwrap();
        }

        let mut consumer = bus.subscribe("g");
        let mut seen = Vec::new();
        let mut partitions = std::collections::HashSet::new();
        for _ in 0..10 {
            let message = consumer
                .poll(Duration::from_millis(100))
                .await
                .unwrap()
                .unwrap();
            partitions.insert(message.partition);
            seen.push(String::from_utf8(message.value.to_vec()).unwrap());
        }
        assert_eq!(partitions.len(), 1, "one key must map to one partition");
        let expected: Vec<String> = (0..10u32).map(|i| i.to_string()).collect();
        assert_eq!(seen, expected, "publish order must be preserved");
    }

    #[tokio::test]
    async fn new_consumer_resumes_from_committed_offset() {
        let bus = InMemoryBus::new(1);
        let producer = bus.producer();
        for value in ["a", "b", "c"] {
            producer
                .publish(b"k", Bytes::from(value))
                .await
                .unwrap();
        }

        let mut first = bus.subscribe("g");
        let message = first.poll(Duration::from_millis(100)).await.unwrap().unwrap();
        first.commit(message.partition, message.offset).await.unwrap();
        drop(first);

        // Same group: starts after the committed message.
        let mut second = bus.subscribe("g");
        let message = second.poll(Duration::from_millis(100)).await.unwrap().unwrap();
        assert_eq!(message.value.as_ref(), b"b");

        // Different group: starts from the beginning.
        let mut other = bus.subscribe("other");
        let message = other.poll(Duration::from_millis(100)).await.unwrap().unwrap();
        assert_eq!(message.value.as_ref(), b"a");
    }

    #[tokio::test]
    async fn commit_rejects_unassigned_partition() {
        let bus = InMemoryBus::new(2);
        let mut consumer = bus.subscribe_partitions("g", vec![0]).unwrap();
        let err = consumer.commit(1, 0).await.unwrap_err();
        assert!(matches!(err, BusError::Commit(_)));
    }

    #[tokio::test]
    async fn subscribe_rejects_unknown_partition() {
        let bus = InMemoryBus::new(2);
        let err = bus.subscribe_partitions("g", vec![5]).unwrap_err();
        assert!(matches!(err, BusError::UnknownPartition { .. }));
    }
}
