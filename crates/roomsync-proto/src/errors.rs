//! Error types for decoding feed events, entities and snapshots.

use thiserror::Error;

/// Result alias for protocol operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Errors produced while decoding or validating protocol data.
///
/// None of these are fatal to a subscription or a collection: each one fails
/// only the event, page entry or snapshot that produced it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Entity failed structural validation.
    #[error("malformed {kind} entity: {reason}")]
    MalformedEntity {
        /// Entity kind (`room`, `message`)
        kind: &'static str,
        /// What was wrong
        reason: String,
    },

    /// Feed event kind is not one of `create|update|remove|patch`.
    #[error("unknown event kind: {0:?}")]
    UnknownEventKind(String),

    /// Payload exceeds [`crate::MAX_EVENT_PAYLOAD_SIZE`].
    #[error("payload too large: {size} bytes (max {max})")]
    PayloadTooLarge {
        /// Actual size
        size: usize,
        /// Allowed size
        max: usize,
    },

    /// Snapshot was written with an unknown format revision.
    #[error("unsupported snapshot format: {0}")]
    UnsupportedFormat(u8),

    /// CBOR serialization failed.
    #[error("CBOR encode error: {0}")]
    CborEncode(String),

    /// CBOR deserialization failed.
    #[error("CBOR decode error: {0}")]
    CborDecode(String),
}

impl ProtocolError {
    /// Shorthand for [`ProtocolError::MalformedEntity`].
    pub fn malformed(kind: &'static str, reason: impl Into<String>) -> Self {
        Self::MalformedEntity { kind, reason: reason.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn protocol_error_display() {
        let err = ProtocolError::malformed("room", "empty id");
        assert_eq!(err.to_string(), "malformed room entity: empty id");

        let err = ProtocolError::UnknownEventKind("poke".into());
        assert_eq!(err.to_string(), "unknown event kind: \"poke\"");

        let err = ProtocolError::PayloadTooLarge { size: 10, max: 5 };
        assert_eq!(err.to_string(), "payload too large: 10 bytes (max 5)");
    }
}
