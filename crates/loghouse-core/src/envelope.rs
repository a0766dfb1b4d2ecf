//! Bus envelope codec.
//!
//! The envelope is the unit placed on the message bus:
//!
//! ```json
//! { "project_id": "acme", "payload": { ... } }
//! ```
//!
//! `payload` is carried as raw JSON and re-emitted verbatim — the envelope
//! codec never reorders keys or re-serializes the inner document. The
//! partition key is the raw bytes of `project_id`; publishing with that key
//! is what guarantees per-project ordering through the bus.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;

use crate::error::{CoreError, Result};

/// The outer wrapper placed on the message bus.
///
/// An envelope is created once by the publisher and is immutable; it is
/// never updated or deleted downstream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEnvelope {
    /// Tenant identity. Doubles as the bus partition key.
    pub project_id: String,

    /// Opaque JSON payload, carried verbatim.
    pub payload: Box<RawValue>,
}

impl LogEnvelope {
    /// Wrap a raw JSON body for the given project.
    ///
    /// Fails if `project_id` is empty, the body is empty, or the body is not
    /// well-formed JSON.
    pub fn new(project_id: impl Into<String>, body: &[u8]) -> Result<Self> {
        let project_id = project_id.into();
        if project_id.is_empty() {
            return Err(CoreError::InvalidEnvelope("project_id is empty".into()));
        }
        if body.is_empty() {
            return Err(CoreError::InvalidEnvelope("payload is empty".into()));
        }
        let payload: Box<RawValue> = serde_json::from_slice(body)?;
        Ok(Self {
            project_id,
            payload,
        })
    }

    /// Serialize for the bus.
    pub fn encode(&self) -> Result<Bytes> {
        Ok(Bytes::from(serde_json::to_vec(self)?))
    }

    /// Deserialize from the bus and check structural invariants.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let envelope: LogEnvelope = serde_json::from_slice(bytes)?;
        if envelope.project_id.is_empty() {
            return Err(CoreError::InvalidEnvelope("project_id is empty".into()));
        }
        Ok(envelope)
    }

    /// The bus partition key: raw bytes of the project id.
    pub fn partition_key(&self) -> &[u8] {
        self.project_id.as_bytes()
    }

    /// The inner payload bytes, verbatim as received.
    pub fn payload_bytes(&self) -> &[u8] {
        self.payload.get().as_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_preserves_payload_verbatim() {
        let body = br#"{"name":"click","timestamp":1700000000000,"full_payload":{"b":1,"a":2}}"#;
        let envelope = LogEnvelope::new("acme", body).unwrap();
        let encoded = envelope.encode().unwrap();
        let decoded = LogEnvelope::decode(&encoded).unwrap();

        assert_eq!(decoded.project_id, "acme");
        // Key order of the inner document must survive untouched.
        assert_eq!(decoded.payload.get(), std::str::from_utf8(body).unwrap());
        assert_eq!(decoded.partition_key(), b"acme");
    }

    #[test]
    fn rejects_empty_project_id() {
        let err = LogEnvelope::new("", br#"{"x":1}"#).unwrap_err();
        assert!(matches!(err, CoreError::InvalidEnvelope(_)));
    }

    #[test]
    fn rejects_empty_body() {
        let err = LogEnvelope::new("acme", b"").unwrap_err();
        assert!(matches!(err, CoreError::InvalidEnvelope(_)));
    }

    #[test]
    fn rejects_non_json_body() {
        let err = LogEnvelope::new("acme", b"not json").unwrap_err();
        assert!(matches!(err, CoreError::Json(_)));
    }

    #[test]
    fn decode_rejects_missing_project_id() {
        let err = LogEnvelope::decode(br#"{"project_id":"","payload":{}}"#).unwrap_err();
        assert!(matches!(err, CoreError::InvalidEnvelope(_)));
    }
}
