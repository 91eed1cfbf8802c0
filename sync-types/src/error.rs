//! Error types for the mirror-sync data model.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors converting between typed payloads and record fields.
#[derive(Debug, Error)]
pub enum PayloadError {
    /// Payload could not be serialized.
    #[error("payload encoding failed: {0}")]
    Encode(#[source] serde_json::Error),

    /// Record fields do not match the requested payload type.
    #[error("payload decoding failed: {0}")]
    Decode(#[source] serde_json::Error),

    /// Payload did not serialize to a field map.
    #[error("payload must serialize to an object")]
    NotAnObject,
}

/// Classification of a failure, carried inside failure notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Operation attempted with no bound subject.
    NoSubject,
    /// The remote reported that the record does not exist.
    NotFound,
    /// A remote call failed (network, permission, quota).
    Transport,
    /// A batch commit did not complete atomically.
    PartialBatchFailure,
    /// The session has been disposed.
    SessionClosed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        assert_eq!(
            PayloadError::NotAnObject.to_string(),
            "payload must serialize to an object"
        );
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<PayloadError>();
    }

    #[test]
    fn error_kind_serializes_snake_case() {
        let json = serde_json::to_string(&ErrorKind::PartialBatchFailure).unwrap();
        assert_eq!(json, "\"partial_batch_failure\"");
    }
}
