//! Error types for synchronization.
//!
//! Every variant is recoverable. The engine never tears down its owning scope
//! on a data error: network and cache failures fall back to the last-known-good
//! state, stale and malformed events are dropped one at a time.

use roomsync_proto::{CollectionKey, EntityId, ProtocolError};
use thiserror::Error;

/// Failure reported by a transport.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NetworkError {
    /// Request did not complete in time.
    #[error("request timed out")]
    Timeout,

    /// Server or network unreachable.
    #[error("unavailable: {0}")]
    Unavailable(String),

    /// Server answered with an error status.
    #[error("server returned status {status}")]
    Status {
        /// HTTP-like status code
        status: u16,
    },

    /// Response body could not be interpreted.
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl NetworkError {
    /// Returns true if retrying the same request may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Timeout | Self::Unavailable(_) => true,
            Self::Status { status } => *status >= 500 || *status == 429,
            Self::InvalidResponse(_) => false,
        }
    }
}

/// Errors surfaced by the synchronization stack.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    /// No usable cached snapshot. Falls through to the network.
    #[error("cache miss for {0}")]
    CacheMiss(CollectionKey),

    /// Network fetch failed. In-memory and cached state are untouched.
    #[error("network failure: {0}")]
    Network(#[from] NetworkError),

    /// Event targeted an id that is not in the collection.
    ///
    /// Typically a late event racing a deletion. Logged, never surfaced to
    /// observers.
    #[error("stale event dropped: {id} not in {key}")]
    StaleEventDropped {
        /// Collection the event was applied to
        key: CollectionKey,
        /// Missing entity id
        id: EntityId,
    },

    /// Event carried a revision that is not newer than the applied one.
    #[error("stale revision dropped for {id}: incoming {incoming}, current {current}")]
    StaleVersion {
        /// Target entity
        id: EntityId,
        /// Revision carried by the event
        incoming: u64,
        /// Revision already applied
        current: u64,
    },

    /// Entity or event failed validation.
    #[error("malformed entity: {0}")]
    MalformedEntity(#[from] ProtocolError),

    /// Cache backend failed on an explicit store operation.
    #[error("storage failure: {0}")]
    Storage(String),

    /// The collection actor has shut down.
    #[error("collection closed")]
    Closed,

    /// Configuration rejected by [`crate::SyncConfig::validate`].
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl SyncError {
    /// Errors that only warrant a log line and never reach observers.
    pub fn is_drop(&self) -> bool {
        matches!(
            self,
            Self::StaleEventDropped { .. } | Self::StaleVersion { .. } | Self::MalformedEntity(_)
        )
    }
}
