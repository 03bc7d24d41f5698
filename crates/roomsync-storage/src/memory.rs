#![allow(clippy::disallowed_types, reason = "Synchronous in-memory operations only")]

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard},
};

use roomsync_proto::CollectionKey;

use super::{CacheBackend, StorageError};

/// In-memory backend for tests and simulation.
///
/// Records live in a `HashMap` behind `Arc<Mutex<>>`, so clones share them.
/// A poisoned lock is reported as `StorageError::Io`.
#[derive(Clone, Default)]
pub struct MemoryBackend {
    records: Arc<Mutex<HashMap<CollectionKey, Vec<u8>>>>,
}

impl MemoryBackend {
    /// Empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.records.lock().map_or(0, |records| records.len())
    }

    /// True if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<CollectionKey, Vec<u8>>>, StorageError> {
        self.records.lock().map_err(|_| StorageError::Io("memory backend lock poisoned".into()))
    }
}

impl CacheBackend for MemoryBackend {
    fn load(&self, key: &CollectionKey) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn store(&self, key: &CollectionKey, bytes: &[u8]) -> Result<(), StorageError> {
        self.lock()?.insert(key.clone(), bytes.to_vec());
        Ok(())
    }

    fn remove(&self, key: &CollectionKey) -> Result<(), StorageError> {
        self.lock()?.remove(key);
        Ok(())
    }

    fn keys(&self) -> Result<Vec<CollectionKey>, StorageError> {
        let mut keys: Vec<CollectionKey> = self.lock()?.keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_records() {
        let backend = MemoryBackend::new();
        let clone = backend.clone();

        backend.store(&CollectionKey::rooms(), b"abc").unwrap();
        assert_eq!(clone.load(&CollectionKey::rooms()).unwrap(), Some(b"abc".to_vec()));
        assert_eq!(clone.len(), 1);
    }

    #[test]
    fn remove_absent_key_succeeds() {
        let backend = MemoryBackend::new();
        assert!(backend.remove(&CollectionKey::people()).is_ok());
        assert!(backend.is_empty());
    }
}
