//! Redb-backed durable cache.
//!
//! Uses Redb's ACID transactions with Copy-on-Write for crash safety. One
//! write transaction per `store`, so a snapshot is replaced atomically.

use std::{fmt::Display, path::Path, sync::Arc};

use redb::{Database, ReadableTable, TableDefinition};
use roomsync_proto::CollectionKey;

use super::{CacheBackend, StorageError};

/// Table: cache
/// Key: collection key string
/// Value: CBOR-encoded collection snapshot
const CACHE: TableDefinition<&str, &[u8]> = TableDefinition::new("cache");

fn io(err: impl Display) -> StorageError {
    StorageError::Io(err.to_string())
}

/// Durable cache backed by Redb.
///
/// Thread-safe through Redb's internal locking. Clone is cheap (Arc).
#[derive(Clone)]
pub struct RedbBackend {
    db: Arc<Database>,
}

impl RedbBackend {
    /// Open or create a Redb database at the given path.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Io` if the database cannot be opened or created.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let db = Database::create(path.as_ref()).map_err(io)?;

        let txn = db.begin_write().map_err(io)?;
        {
            let _ = txn.open_table(CACHE).map_err(io)?;
        }
        txn.commit().map_err(io)?;

        Ok(Self { db: Arc::new(db) })
    }
}

impl CacheBackend for RedbBackend {
    fn load(&self, key: &CollectionKey) -> Result<Option<Vec<u8>>, StorageError> {
        let txn = self.db.begin_read().map_err(io)?;
        let table = txn.open_table(CACHE).map_err(io)?;

        let value = table.get(key.as_str()).map_err(io)?;
        Ok(value.map(|guard| guard.value().to_vec()))
    }

    fn store(&self, key: &CollectionKey, bytes: &[u8]) -> Result<(), StorageError> {
        let txn = self.db.begin_write().map_err(io)?;
        {
            let mut table = txn.open_table(CACHE).map_err(io)?;
            table.insert(key.as_str(), bytes).map_err(io)?;
        }
        txn.commit().map_err(io)
    }

    fn remove(&self, key: &CollectionKey) -> Result<(), StorageError> {
        let txn = self.db.begin_write().map_err(io)?;
        {
            let mut table = txn.open_table(CACHE).map_err(io)?;
            table.remove(key.as_str()).map_err(io)?;
        }
        txn.commit().map_err(io)
    }

    fn keys(&self) -> Result<Vec<CollectionKey>, StorageError> {
        let txn = self.db.begin_read().map_err(io)?;
        let table = txn.open_table(CACHE).map_err(io)?;

        let mut keys = Vec::new();
        for entry in table.iter().map_err(io)? {
            let (key, _) = entry.map_err(io)?;
            keys.push(CollectionKey::new(key.value()));
        }
        Ok(keys)
    }
}
