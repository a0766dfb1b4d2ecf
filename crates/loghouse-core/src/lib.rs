//! Core types shared by every Loghouse component.
//!
//! This crate defines the two wire shapes that travel through the pipeline
//! and the record identity that joins the two storage projections:
//!
//! - [`LogEnvelope`]: the outer wrapper placed on the message bus, carrying
//!   the tenant identity and an opaque JSON payload. The tenant identity is
//!   also the bus partition key, so all events of one project are delivered
//!   in publish order.
//! - [`LogEventPayload`]: the validated event carried inside the envelope
//!   (`name`, `timestamp`, `searchable_keys`, `full_payload`). Envelopes
//!   whose inner payload fails validation are rejected at ingestion, never
//!   silently coerced.
//! - [`new_record_id`]: mints the time-ordered record identifier assigned by
//!   the stream processor. Clients never supply record ids.
//!
//! Everything here is plain data plus JSON codecs; no I/O.

pub mod envelope;
pub mod error;
pub mod event;

pub use envelope::LogEnvelope;
pub use error::{CoreError, Result};
pub use event::LogEventPayload;

use uuid::Uuid;

/// Mint a new record identifier.
///
/// Record ids are UUIDv7: time-ordered by creation instant and unique with
/// overwhelming probability across processors. They are generated at
/// processing time, not publish time, and are the canonical identity of a
/// record in both storage projections.
pub fn new_record_id() -> Uuid {
    Uuid::now_v7()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_ids_are_time_sortable() {
        let a = new_record_id();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let b = new_record_id();
        assert!(a < b, "v7 ids must sort by creation time");
        assert_ne!(a, b);
    }
}
