//! Partitioned publisher.
//!
//! The write-side client of the pipeline. [`Publisher::publish`] validates
//! the tenant credential, validates and frames the event body into a
//! [`loghouse_core::LogEnvelope`], and publishes it keyed by the project id
//! so the bus delivers one project's events in publish order.
//!
//! When several outbound bus channels are configured, each publish picks one
//! via an injected [`ChannelSelector`] (round-robin by default). Selection
//! spreads client-side connection load only — the partition key, and with it
//! the ordering guarantee, is independent of the channel used.
//!
//! One call is one publish attempt. Failures surface to the caller; the
//! edge must not retry automatically, since the bus producer may already
//! provide at-least-once semantics and a blind retry would duplicate.

pub mod error;
pub mod publisher;
pub mod selector;

pub use error::{PublishError, Result};
pub use publisher::{Publisher, PublisherBuilder};
pub use selector::{ChannelSelector, RoundRobinSelector};
