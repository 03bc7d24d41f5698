//! Collection cache for roomsync
//!
//! Two layers. [`CacheBackend`] is a synchronous blob store keyed by
//! [`CollectionKey`]; [`EntityCache`] stores typed
//! [`CollectionSnapshot`](roomsync_proto::CollectionSnapshot)s on top of it
//! and turns every read failure into a logged miss.
//!
//! Backends:
//! - [`MemoryBackend`]: tests and simulation
//! - [`RedbBackend`]: durable, survives restarts
//! - [`ChaoticBackend`]: wraps another backend and injects failures

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod cache;
mod chaotic;
mod error;
mod memory;
mod redb;

pub use cache::EntityCache;
pub use chaotic::ChaoticBackend;
pub use error::StorageError;
pub use memory::MemoryBackend;
use roomsync_proto::CollectionKey;

pub use self::redb::RedbBackend;

/// Byte-level store for collection snapshots.
///
/// Must be Clone (shared by the loaders of several collections), Send + Sync
/// and synchronous. Implementations share state through `Arc`, so clones see
/// the same records.
///
/// # Invariants
///
/// - `store` replaces the record for a key atomically. A concurrent `load`
///   observes either the old or the new bytes, never a mix.
pub trait CacheBackend: Clone + Send + Sync + 'static {
    /// Bytes stored under `key`, `None` if absent.
    fn load(&self, key: &CollectionKey) -> Result<Option<Vec<u8>>, StorageError>;

    /// Replace the bytes stored under `key`.
    fn store(&self, key: &CollectionKey, bytes: &[u8]) -> Result<(), StorageError>;

    /// Delete the record for `key`. Removing an absent key succeeds.
    fn remove(&self, key: &CollectionKey) -> Result<(), StorageError>;

    /// Every key with a stored record.
    fn keys(&self) -> Result<Vec<CollectionKey>, StorageError>;
}
