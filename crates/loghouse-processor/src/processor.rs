//! The consume-process loop.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use loghouse_bus::{BusConsumer, BusMessage};
use loghouse_core::{new_record_id, LogEnvelope, LogEventPayload};
use loghouse_store::{IndexEntry, IndexStore, PayloadEntry, PayloadStore};
use tokio::time::timeout;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::error::{ProcessError, Result};

/// Terminal state of one consumed message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// Both projections written; the record is queryable.
    Persisted { record_id: Uuid },
    /// The envelope or its inner payload did not decode; message dropped.
    DroppedDecode,
    /// The payload write failed or timed out; message dropped before the
    /// index write.
    DroppedPayloadWrite,
    /// The index write failed or timed out; the payload row written under
    /// `record_id` remains as an orphan invisible to index-driven reads.
    DroppedIndexWrite { record_id: Uuid },
}

/// One consume-process loop over a partition assignment.
///
/// Processing within the loop is strictly sequential; never share one
/// partition between two processors.
pub struct Processor {
    consumer: Box<dyn BusConsumer>,
    payload_store: Arc<dyn PayloadStore>,
    index_store: Arc<dyn IndexStore>,
    poll_timeout: Duration,
    write_timeout: Duration,
}

impl Processor {
    pub fn builder() -> ProcessorBuilder {
        ProcessorBuilder::new()
    }

    /// Poll once and, if a message arrived, process it and commit its
    /// offset. Returns the message's terminal state, or `None` when the
    /// poll timed out empty.
    ///
    /// The offset commit happens for every outcome, including drops.
    pub async fn process_next(&mut self) -> Result<Option<ProcessOutcome>> {
        let Some(message) = self.consumer.poll(self.poll_timeout).await? else {
            return Ok(None);
        };

        let outcome = self.process_message(&message).await;

        // Advance past the message no matter what happened to it; a failed
        // message is dropped, not redelivered.
        self.consumer.commit(message.partition, message.offset).await?;

        Ok(Some(outcome))
    }

    /// Run until `shutdown` resolves.
    pub async fn run(mut self, mut shutdown: tokio::sync::oneshot::Receiver<()>) {
        info!(assignment = ?self.consumer.assignment(), "Processor loop started");
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Processor loop stopping");
                    return;
                }
                next = self.process_next() => {
                    if let Err(e) = next {
                        // Bus trouble: log and keep polling; the bus owns
                        // reconnection.
                        error!(error = %e, "Bus error in processor loop");
                    }
                }
            }
        }
    }

    async fn process_message(&self, message: &BusMessage) -> ProcessOutcome {
        let envelope = match LogEnvelope::decode(&message.value) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!(
                    partition = message.partition,
                    offset = message.offset,
                    error = %e,
                    "Dropping message: undecodable envelope"
                );
                return ProcessOutcome::DroppedDecode;
            }
        };

        let event = match LogEventPayload::decode(envelope.payload_bytes()) {
            Ok(event) => event,
            Err(e) => {
                warn!(
                    project = %envelope.project_id,
                    partition = message.partition,
                    offset = message.offset,
                    error = %e,
                    "Dropping message: invalid event payload"
                );
                return ProcessOutcome::DroppedDecode;
            }
        };

        // Canonical record identity, minted here and nowhere else.
        let record_id = new_record_id();

        let payload_entry = PayloadEntry {
            project_id: envelope.project_id.clone(),
            event_timestamp: event.timestamp,
            record_id,
            raw_payload: Bytes::copy_from_slice(envelope.payload_bytes()),
        };

        match timeout(self.write_timeout, self.payload_store.insert(&payload_entry)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                error!(
                    project = %envelope.project_id,
                    record_id = %record_id,
                    error = %e,
                    "Dropping message: payload write failed"
                );
                return ProcessOutcome::DroppedPayloadWrite;
            }
            Err(_) => {
                error!(
                    project = %envelope.project_id,
                    record_id = %record_id,
                    timeout_ms = self.write_timeout.as_millis() as u64,
                    "Dropping message: payload write timed out"
                );
                return ProcessOutcome::DroppedPayloadWrite;
            }
        }

        let index_entry = IndexEntry {
            project_id: envelope.project_id.clone(),
            event_name: event.name.clone(),
            event_timestamp: event.timestamp,
            record_id,
            searchable_keys: event.searchable_keys.clone(),
        };

        match timeout(self.write_timeout, self.index_store.insert(&index_entry)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                error!(
                    project = %envelope.project_id,
                    record_id = %record_id,
                    error = %e,
                    "Dropping message: index write failed"
                );
                return ProcessOutcome::DroppedIndexWrite { record_id };
            }
            Err(_) => {
                error!(
                    project = %envelope.project_id,
                    record_id = %record_id,
                    timeout_ms = self.write_timeout.as_millis() as u64,
                    "Dropping message: index write timed out"
                );
                return ProcessOutcome::DroppedIndexWrite { record_id };
            }
        }

        debug!(
            project = %envelope.project_id,
            event = %event.name,
            record_id = %record_id,
            partition = message.partition,
            offset = message.offset,
            "Persisted log event"
        );
        ProcessOutcome::Persisted { record_id }
    }
}

/// Builder for [`Processor`].
pub struct ProcessorBuilder {
    consumer: Option<Box<dyn BusConsumer>>,
    payload_store: Option<Arc<dyn PayloadStore>>,
    index_store: Option<Arc<dyn IndexStore>>,
    poll_timeout: Duration,
    write_timeout: Duration,
}

impl ProcessorBuilder {
    pub fn new() -> Self {
        Self {
            consumer: None,
            payload_store: None,
            index_store: None,
            poll_timeout: Duration::from_secs(1),
            write_timeout: Duration::from_secs(5),
        }
    }

    /// Bus consumer to drain (required).
    pub fn consumer(mut self, consumer: Box<dyn BusConsumer>) -> Self {
        self.consumer = Some(consumer);
        self
    }

    /// Payload store handle (required).
    pub fn payload_store(mut self, store: Arc<dyn PayloadStore>) -> Self {
        self.payload_store = Some(store);
        self
    }

    /// Index store handle (required).
    pub fn index_store(mut self, store: Arc<dyn IndexStore>) -> Self {
        self.index_store = Some(store);
        self
    }

    /// How long one poll waits for a message (default 1 s).
    pub fn poll_timeout(mut self, timeout: Duration) -> Self {
        self.poll_timeout = timeout;
        self
    }

    /// Fixed per-write deadline; a timed-out write is treated as a failed
    /// write (default 5 s).
    pub fn write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    pub fn build(self) -> Result<Processor> {
        Ok(Processor {
            consumer: self
                .consumer
                .ok_or_else(|| ProcessError::Config("consumer is required".into()))?,
            payload_store: self
                .payload_store
                .ok_or_else(|| ProcessError::Config("payload_store is required".into()))?,
            index_store: self
                .index_store
                .ok_or_else(|| ProcessError::Config("index_store is required".into()))?,
            poll_timeout: self.poll_timeout,
            write_timeout: self.write_timeout,
        })
    }
}

impl Default for ProcessorBuilder {
    fn default() -> Self {
        Self::new()
    }
}
