//! The publisher itself.

use std::sync::Arc;

use loghouse_bus::{BusProducer, PublishAck};
use loghouse_core::{LogEnvelope, LogEventPayload};
use loghouse_store::AccessControl;
use tracing::debug;

use crate::error::{PublishError, Result};
use crate::selector::{ChannelSelector, RoundRobinSelector};

/// Validates, frames, and publishes log events keyed by project id.
///
/// Thread-safe; share via `Arc` across request handlers. All state is the
/// injected collaborators plus the channel-selection counter.
pub struct Publisher {
    access: Arc<dyn AccessControl>,
    channels: Vec<Arc<dyn BusProducer>>,
    selector: Box<dyn ChannelSelector>,
}

impl std::fmt::Debug for Publisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Publisher")
            .field("channels", &self.channels.len())
            .finish_non_exhaustive()
    }
}

impl Publisher {
    pub fn builder() -> PublisherBuilder {
        PublisherBuilder::new()
    }

    /// Publish one event for `project_id`.
    ///
    /// Order of checks:
    /// 1. credential — [`PublishError::Unauthorized`] on mismatch;
    /// 2. body shape — empty bodies and payloads failing the validated
    ///    contract (`name` non-empty, `timestamp` non-zero) are
    ///    [`PublishError::BadRequest`];
    /// 3. one publish attempt on one selected channel, keyed by the raw
    ///    bytes of `project_id`.
    pub async fn publish(
        &self,
        project_id: &str,
        api_key: &str,
        body: &[u8],
    ) -> Result<PublishAck> {
        if !self.access.validate_credential(project_id, api_key).await? {
            return Err(PublishError::Unauthorized(project_id.to_string()));
        }

        if body.is_empty() {
            return Err(PublishError::BadRequest("request body is empty".into()));
        }
        // Enforce the structured contract up front; an unvalidated body
        // would be unqueryable once it reaches the index store.
        LogEventPayload::decode(body)?;

        let envelope = LogEnvelope::new(project_id, body)?;
        let encoded = envelope.encode()?;

        let channel_index = self.selector.select(self.channels.len());
        let channel = &self.channels[channel_index];
        let ack = channel.publish(envelope.partition_key(), encoded).await?;

        debug!(
            project = project_id,
            channel = channel_index,
            partition = ack.partition,
            offset = ack.offset,
            "Published event"
        );
        Ok(ack)
    }
}

/// Builder for [`Publisher`].
///
/// `access_store` and at least one channel are required; the selector
/// defaults to round-robin.
pub struct PublisherBuilder {
    access: Option<Arc<dyn AccessControl>>,
    channels: Vec<Arc<dyn BusProducer>>,
    selector: Box<dyn ChannelSelector>,
}

impl PublisherBuilder {
    pub fn new() -> Self {
        Self {
            access: None,
            channels: Vec::new(),
            selector: Box::new(RoundRobinSelector::new()),
        }
    }

    /// Set the access-control collaborator (required).
    pub fn access_store(mut self, access: Arc<dyn AccessControl>) -> Self {
        self.access = Some(access);
        self
    }

    /// Add one outbound bus channel. At least one is required.
    pub fn channel(mut self, channel: Arc<dyn BusProducer>) -> Self {
        self.channels.push(channel);
        self
    }

    /// Replace the channel-selection strategy (default: round-robin).
    pub fn selector(mut self, selector: Box<dyn ChannelSelector>) -> Self {
        self.selector = selector;
        self
    }

    pub fn build(self) -> Result<Publisher> {
        let access = self
            .access
            .ok_or_else(|| PublishError::Config("access_store is required".into()))?;
        if self.channels.is_empty() {
            return Err(PublishError::Config(
                "at least one bus channel is required".into(),
            ));
        }
        Ok(Publisher {
            access,
            channels: self.channels,
            selector: self.selector,
        })
    }
}

impl Default for PublisherBuilder {
    fn default() -> Self {
        Self::new()
    }
}
