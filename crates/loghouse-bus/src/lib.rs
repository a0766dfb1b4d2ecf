//! Message bus boundary.
//!
//! The bus itself is an external collaborator: an ordered, partitioned,
//! at-least-once delivery log with consumer groups tracking offsets. This
//! crate defines the interface the rest of Loghouse programs against —
//! [`BusProducer`] and [`BusConsumer`] — and ships [`InMemoryBus`], a
//! partitioned in-process log implementing both sides. The in-memory bus
//! backs tests and single-node deployments; a broker-backed implementation
//! (e.g. over a Kafka client) plugs in behind the same two traits.
//!
//! ## Ordering contract
//!
//! A producer publishes `(key, value)` pairs. Messages sharing a key are
//! appended to the same partition and delivered to consumers in publish
//! order. No ordering exists across partitions.
//!
//! ## Delivery contract
//!
//! Delivery is at-least-once: a consumer's position advances as it polls,
//! but only [`BusConsumer::commit`] durably moves the group offset. A
//! consumer recreated for the same group resumes from the last committed
//! offset and may observe messages again.

pub mod error;
pub mod memory;

pub use error::{BusError, Result};
pub use memory::{InMemoryBus, InMemoryConsumer, InMemoryProducer};

use std::hash::{Hash, Hasher};

use async_trait::async_trait;
use bytes::Bytes;

/// A message delivered from the bus.
#[derive(Debug, Clone)]
pub struct BusMessage {
    /// Partition the message was read from.
    pub partition: u32,
    /// Offset within the partition.
    pub offset: u64,
    /// Partition key the message was published with.
    pub key: Bytes,
    /// Opaque message body.
    pub value: Bytes,
}

/// Acknowledgement returned by a successful publish.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublishAck {
    pub partition: u32,
    pub offset: u64,
}

/// Producer side of the bus.
#[async_trait]
pub trait BusProducer: Send + Sync {
    /// Publish `value` keyed by `key`.
    ///
    /// Messages with equal keys land on the same partition in publish order.
    /// One call is one publish attempt; retry policy belongs to the caller.
    async fn publish(&self, key: &[u8], value: Bytes) -> Result<PublishAck>;
}

/// Consumer side of the bus, bound to a consumer group and a partition
/// assignment.
#[async_trait]
pub trait BusConsumer: Send + Sync {
    /// Fetch the next message from the assignment, waiting up to `timeout`.
    ///
    /// Returns `Ok(None)` when no message arrived within the timeout.
    /// Within one partition, messages are yielded strictly in offset order.
    async fn poll(&mut self, timeout: std::time::Duration) -> Result<Option<BusMessage>>;

    /// Advance the group's committed offset for `partition` past `offset`.
    async fn commit(&mut self, partition: u32, offset: u64) -> Result<()>;

    /// Partitions this consumer is assigned.
    fn assignment(&self) -> &[u32];
}

/// Map a partition key to a partition index.
///
/// SipHash of the raw key bytes, modulo the partition count. Deterministic:
/// the same key always maps to the same partition, which is what carries the
/// per-project ordering guarantee end to end.
pub fn partition_for_key(key: &[u8], partition_count: u32) -> u32 {
    debug_assert!(partition_count > 0);
    let mut hasher = siphasher::sip::SipHasher::new();
    key.hash(&mut hasher);
    (hasher.finish() % partition_count as u64) as u32
}
