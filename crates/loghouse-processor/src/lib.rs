//! Stream processor.
//!
//! Consumes framed envelopes from the bus one message at a time per
//! partition assignment, decodes them, mints the record identity, and
//! performs the dual write into the payload and index stores.
//!
//! ## Per-message state machine
//!
//! Received → Decoded → PersistedPayload → PersistedMetadata → Acknowledged.
//! A decode failure, a payload-write failure, or an index-write failure each
//! drop the message after logging — the failure classes are logged
//! independently and none of them blocks the partition. The offset is
//! committed after processing **regardless of outcome**, so persistence is
//! at-most-once effective even though bus delivery is at-least-once: a
//! failed write drops the event rather than retrying it. There is no
//! dead-letter path; that is deliberate, documented behavior.
//!
//! The dual write is not transactional. Payload is written first; if it
//! fails the message is dropped before the index write, and if the index
//! write fails the already-written payload row stays behind as an orphan a
//! reader will never see through the index. Readers must tolerate either
//! projection being absent.
//!
//! Within one partition, processing is strictly sequential — that is what
//! carries the per-project ordering guarantee from the publisher through to
//! storage. Run several [`Processor`]s over disjoint partition assignments
//! to scale out.

pub mod error;
pub mod processor;

pub use error::{ProcessError, Result};
pub use processor::{ProcessOutcome, Processor, ProcessorBuilder};
