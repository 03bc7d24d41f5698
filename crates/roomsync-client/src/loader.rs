//! Cache-then-network collection loading.

use std::{marker::PhantomData, sync::Arc};

use roomsync_core::SyncError;
use roomsync_proto::{CollectionKey, CollectionSnapshot, Entity, EntityId};
use roomsync_storage::{CacheBackend, EntityCache};
use tracing::{debug, warn};

use crate::transport::Transport;

/// Loads one kind of collection from the cache and the network.
///
/// Clones share the transport and cache, so fetches can run on spawned tasks.
pub struct CollectionLoader<E, T, B> {
    inner: Arc<LoaderInner<T, B>>,
    _entity: PhantomData<fn() -> E>,
}

struct LoaderInner<T, B> {
    transport: T,
    cache: EntityCache<B>,
}

impl<E, T, B> Clone for CollectionLoader<E, T, B> {
    fn clone(&self) -> Self {
        Self { inner: Arc::clone(&self.inner), _entity: PhantomData }
    }
}

impl<E, T, B> CollectionLoader<E, T, B>
where
    E: Entity,
    T: Transport<E>,
    B: CacheBackend,
{
    /// Loader over `transport` and `cache`.
    pub fn new(transport: T, cache: EntityCache<B>) -> Self {
        Self { inner: Arc::new(LoaderInner { transport, cache }), _entity: PhantomData }
    }

    /// The cache this loader writes to.
    pub fn cache(&self) -> &EntityCache<B> {
        &self.inner.cache
    }

    /// Last stored snapshot for `key`, without touching the network.
    ///
    /// # Errors
    ///
    /// `SyncError::CacheMiss` if nothing usable is stored. Corruption and
    /// backend failures are logged by the cache and also read as a miss.
    pub fn fetch_cached(&self, key: &CollectionKey) -> Result<CollectionSnapshot<E>, SyncError> {
        let mut snapshot =
            self.inner.cache.get::<E>(key).ok_or_else(|| SyncError::CacheMiss(key.clone()))?;
        snapshot.entities = validated(key, snapshot.entities);
        Ok(snapshot)
    }

    /// Fetch `key` from the network without touching the cache.
    ///
    /// # Errors
    ///
    /// `SyncError::Network` if the fetch fails.
    pub async fn fetch_latest(&self, key: &CollectionKey) -> Result<Vec<E>, SyncError> {
        let entities = self.inner.transport.fetch(key).await.map_err(|err| {
            warn!(%key, error = %err, "fresh fetch failed");
            SyncError::Network(err)
        })?;

        debug!(%key, len = entities.len(), "fresh fetch complete");
        Ok(validated(key, entities))
    }

    /// Fetch `key` from the network and replace the cached snapshot.
    ///
    /// A failed cache write is logged and does not fail the fetch.
    ///
    /// # Errors
    ///
    /// `SyncError::Network` if the fetch fails. The cache is left untouched.
    pub async fn fetch_fresh(
        &self,
        key: &CollectionKey,
        fetched_at_ms: u64,
    ) -> Result<Vec<E>, SyncError> {
        let entities = self.fetch_latest(key).await?;
        if let Err(err) = self.store_snapshot(key, entities.clone(), fetched_at_ms) {
            warn!(%key, error = %err, "failed to cache fresh fetch");
        }
        Ok(entities)
    }

    /// Fetch up to `limit` entities older than `before`. Never touches the
    /// cache.
    ///
    /// # Errors
    ///
    /// `SyncError::Network` if the fetch fails.
    pub async fn fetch_older_page(
        &self,
        key: &CollectionKey,
        before: &EntityId,
        limit: usize,
    ) -> Result<Vec<E>, SyncError> {
        let entities = self.inner.transport.fetch_before(key, before, limit).await.map_err(|err| {
            warn!(%key, %before, error = %err, "older page fetch failed");
            SyncError::Network(err)
        })?;

        debug!(%key, %before, len = entities.len(), "older page fetched");
        Ok(validated(key, entities))
    }

    /// Atomically replace the cached snapshot for `key`.
    ///
    /// # Errors
    ///
    /// `SyncError::Storage` if the snapshot cannot be encoded or written.
    pub fn store_snapshot(
        &self,
        key: &CollectionKey,
        entities: Vec<E>,
        fetched_at_ms: u64,
    ) -> Result<(), SyncError> {
        let snapshot = CollectionSnapshot::new(key.clone(), entities, fetched_at_ms);
        self.inner.cache.put(&snapshot)?;
        Ok(())
    }
}

/// Drop entities that fail validation, logging each.
fn validated<E: Entity>(key: &CollectionKey, entities: Vec<E>) -> Vec<E> {
    let total = entities.len();
    let valid: Vec<E> = entities
        .into_iter()
        .filter(|entity| match entity.validate() {
            Ok(()) => true,
            Err(err) => {
                warn!(%key, error = %err, "malformed entity dropped from fetch");
                false
            },
        })
        .collect();

    if valid.len() < total {
        debug!(%key, dropped = total - valid.len(), "fetch contained malformed entities");
    }
    valid
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use roomsync_core::NetworkError;
    use roomsync_proto::{Message, Room};
    use roomsync_storage::MemoryBackend;

    use super::*;

    #[derive(Default)]
    struct FixedTransport {
        rooms: Mutex<Option<Result<Vec<Room>, NetworkError>>>,
    }

    impl FixedTransport {
        fn returning(result: Result<Vec<Room>, NetworkError>) -> Self {
            Self { rooms: Mutex::new(Some(result)) }
        }
    }

    impl Transport<Room> for FixedTransport {
        async fn fetch(&self, _key: &CollectionKey) -> Result<Vec<Room>, NetworkError> {
            self.rooms.lock().unwrap().take().unwrap_or(Ok(Vec::new()))
        }

        async fn fetch_before(
            &self,
            _key: &CollectionKey,
            _before: &EntityId,
            _limit: usize,
        ) -> Result<Vec<Room>, NetworkError> {
            Ok(vec![Room::new("old", 1), Room::new("", 0)])
        }
    }

    fn loader(transport: FixedTransport) -> CollectionLoader<Room, FixedTransport, MemoryBackend> {
        CollectionLoader::new(transport, EntityCache::new(MemoryBackend::new()))
    }

    #[tokio::test]
    async fn fresh_fetch_is_cached() {
        let loader = loader(FixedTransport::returning(Ok(vec![Room::new("r1", 1)])));
        let key = CollectionKey::rooms();

        assert!(matches!(loader.fetch_cached(&key), Err(SyncError::CacheMiss(_))));
        let fetched = loader.fetch_fresh(&key, 42).await.unwrap();

        let cached = loader.fetch_cached(&key).unwrap();
        assert_eq!(cached.entities, fetched);
        assert_eq!(cached.fetched_at_ms, 42);
    }

    #[tokio::test]
    async fn failed_fetch_leaves_cache_untouched() {
        let key = CollectionKey::rooms();
        let loader = loader(FixedTransport::returning(Err(NetworkError::Timeout)));
        loader.store_snapshot(&key, vec![Room::new("cached", 1)], 1).unwrap();

        let result = loader.fetch_fresh(&key, 2).await;
        assert_eq!(result, Err(SyncError::Network(NetworkError::Timeout)));
        assert_eq!(loader.fetch_cached(&key).unwrap().entities, vec![Room::new("cached", 1)]);
    }

    #[tokio::test]
    async fn malformed_entities_are_dropped_individually() {
        let loader = loader(FixedTransport::returning(Ok(vec![
            Room::new("good", 2),
            Room::new("", 1),
        ])));

        let fetched = loader.fetch_fresh(&CollectionKey::rooms(), 0).await.unwrap();
        assert_eq!(fetched, vec![Room::new("good", 2)]);

        let page =
            loader.fetch_older_page(&CollectionKey::rooms(), &"good".into(), 50).await.unwrap();
        assert_eq!(page, vec![Room::new("old", 1)]);
    }

    #[test]
    fn validated_keeps_valid_messages() {
        let messages = vec![Message::new("m1", "u", 1), Message::new("m2", "", 2)];
        let kept = validated(&CollectionKey::messages("r"), messages);
        assert_eq!(kept.len(), 1);
    }
}
