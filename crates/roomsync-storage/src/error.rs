use roomsync_core::SyncError;
use roomsync_proto::ProtocolError;
use thiserror::Error;

/// Errors from cache backends.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// Backend I/O or transaction failure
    #[error("storage I/O error: {0}")]
    Io(String),

    /// Snapshot could not be encoded or decoded
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<ProtocolError> for StorageError {
    fn from(err: ProtocolError) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<StorageError> for SyncError {
    fn from(err: StorageError) -> Self {
        Self::Storage(err.to_string())
    }
}
