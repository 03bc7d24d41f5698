//! Typed snapshot cache with soft-failure reads.

use roomsync_proto::{CollectionKey, CollectionSnapshot, Entity};
use tracing::{debug, warn};

use super::{CacheBackend, StorageError};

/// Typed cache of collection snapshots.
///
/// Reads never fail: a missing, unreadable or corrupt record is a miss and the
/// cause is logged. Writes and invalidations report backend errors so callers
/// can decide whether they matter.
#[derive(Clone)]
pub struct EntityCache<B> {
    backend: B,
}

impl<B: CacheBackend> EntityCache<B> {
    /// Cache over `backend`.
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    /// The underlying backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Last stored snapshot for `key`.
    ///
    /// Corrupt records (undecodable, unknown format, or stored under another
    /// key) are removed on a best-effort basis so the next read is a clean
    /// miss.
    pub fn get<E: Entity>(&self, key: &CollectionKey) -> Option<CollectionSnapshot<E>> {
        let bytes = match self.backend.load(key) {
            Ok(Some(bytes)) => bytes,
            Ok(None) => {
                debug!(%key, "cache miss");
                return None;
            },
            Err(err) => {
                warn!(%key, error = %err, "cache read failed");
                return None;
            },
        };

        let snapshot = match CollectionSnapshot::<E>::decode(&bytes) {
            Ok(snapshot) => snapshot,
            Err(err) => {
                warn!(%key, kind = E::KIND, error = %err, "corrupt cache record discarded");
                self.discard(key);
                return None;
            },
        };

        if snapshot.key != *key {
            warn!(%key, stored = %snapshot.key, "cache record stored under wrong key discarded");
            self.discard(key);
            return None;
        }

        debug!(%key, len = snapshot.len(), "cache hit");
        Some(snapshot)
    }

    /// Atomically replace the snapshot stored under `snapshot.key`.
    ///
    /// # Errors
    ///
    /// - `StorageError::Serialization` if the snapshot cannot be encoded
    /// - `StorageError::Io` if the backend write fails
    pub fn put<E: Entity>(&self, snapshot: &CollectionSnapshot<E>) -> Result<(), StorageError> {
        let bytes = snapshot.encode()?;
        self.backend.store(&snapshot.key, &bytes)?;
        debug!(key = %snapshot.key, len = snapshot.len(), bytes = bytes.len(), "cache stored");
        Ok(())
    }

    /// Drop the snapshot for `key`.
    ///
    /// # Errors
    ///
    /// `StorageError::Io` if the backend delete fails.
    pub fn invalidate(&self, key: &CollectionKey) -> Result<(), StorageError> {
        self.backend.remove(key)
    }

    /// Drop every snapshot (sign-out). Returns the number of keys removed.
    ///
    /// # Errors
    ///
    /// The first backend error; keys already removed stay removed.
    pub fn clear(&self) -> Result<usize, StorageError> {
        let keys = self.backend.keys()?;
        for key in &keys {
            self.backend.remove(key)?;
        }
        Ok(keys.len())
    }

    fn discard(&self, key: &CollectionKey) {
        if let Err(err) = self.backend.remove(key) {
            debug!(%key, error = %err, "failed to discard corrupt cache record");
        }
    }
}

#[cfg(test)]
mod tests {
    use roomsync_proto::Room;

    use super::*;
    use crate::MemoryBackend;

    fn snapshot(key: CollectionKey) -> CollectionSnapshot<Room> {
        CollectionSnapshot::new(key, vec![Room::new("r1", 10), Room::new("r2", 5)], 1_000)
    }

    #[test]
    fn put_then_get() {
        let cache = EntityCache::new(MemoryBackend::new());
        cache.put(&snapshot(CollectionKey::rooms())).unwrap();

        let loaded = cache.get::<Room>(&CollectionKey::rooms()).unwrap();
        assert_eq!(loaded, snapshot(CollectionKey::rooms()));
    }

    #[test]
    fn miss_is_none() {
        let cache = EntityCache::new(MemoryBackend::new());
        assert!(cache.get::<Room>(&CollectionKey::rooms()).is_none());
    }

    #[test]
    fn corrupt_record_is_a_miss_and_removed() {
        let backend = MemoryBackend::new();
        backend.store(&CollectionKey::rooms(), b"\xff\x00garbage").unwrap();

        let cache = EntityCache::new(backend.clone());
        assert!(cache.get::<Room>(&CollectionKey::rooms()).is_none());
        assert!(backend.is_empty());
    }

    #[test]
    fn record_under_wrong_key_is_a_miss() {
        let backend = MemoryBackend::new();
        let bytes = snapshot(CollectionKey::people()).encode().unwrap();
        backend.store(&CollectionKey::rooms(), &bytes).unwrap();

        let cache = EntityCache::new(backend);
        assert!(cache.get::<Room>(&CollectionKey::rooms()).is_none());
    }

    #[test]
    fn invalidate_and_clear() {
        let cache = EntityCache::new(MemoryBackend::new());
        cache.put(&snapshot(CollectionKey::rooms())).unwrap();
        cache.put(&snapshot(CollectionKey::people())).unwrap();

        cache.invalidate(&CollectionKey::rooms()).unwrap();
        assert!(cache.get::<Room>(&CollectionKey::rooms()).is_none());

        assert_eq!(cache.clear().unwrap(), 1);
        assert!(cache.backend().is_empty());
    }
}
