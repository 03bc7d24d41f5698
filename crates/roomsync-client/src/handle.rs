//! Public handle to a running collection.

use roomsync_core::{
    CollectionFilter, EngineStats, Environment, LoadState, PaginationState, ScrollAnchor,
    SyncConfig, SyncEngine, SyncError,
};
use roomsync_proto::{CollectionKey, Entity, EntityId, Message, Room, channel};
use roomsync_storage::CacheBackend;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::info;

use crate::{
    actor::{CollectionActor, Command},
    error::PageError,
    feed::{EventFeed, EventSource},
    loader::CollectionLoader,
    observer::Observer,
    transport::Transport,
};

/// Handle commands are tiny; a short queue is plenty.
const COMMAND_CAPACITY: usize = 64;

/// Cloneable handle to one collection actor.
///
/// The actor stops when [`CollectionHandle::close`] is called or the last
/// handle is dropped. Either way its feed subscription is cancelled. Calls on
/// a stopped collection fail with [`SyncError::Closed`].
pub struct CollectionHandle<E: Entity> {
    key: CollectionKey,
    commands: mpsc::Sender<Command<E>>,
}

impl<E: Entity> Clone for CollectionHandle<E> {
    fn clone(&self) -> Self {
        Self { key: self.key.clone(), commands: self.commands.clone() }
    }
}

impl<E: Entity> std::fmt::Debug for CollectionHandle<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollectionHandle")
            .field("key", &self.key)
            .field("closed", &self.commands.is_closed())
            .finish()
    }
}

impl<E: Entity> CollectionHandle<E> {
    /// Key of the collection.
    pub fn key(&self) -> &CollectionKey {
        &self.key
    }

    /// True once the actor has stopped.
    pub fn is_closed(&self) -> bool {
        self.commands.is_closed()
    }

    /// Show cached contents, then replace them with a fresh fetch.
    ///
    /// Observers see a `Reset` for the cached snapshot (if any) followed by a
    /// `Reset` for the fresh contents. Resolves once the fresh fetch is
    /// applied. A later load supersedes this one; its waiters then resolve
    /// with the later load's outcome.
    ///
    /// # Errors
    ///
    /// `SyncError::Network` if the fetch fails. The cached contents, if any,
    /// stay visible and are marked stale.
    pub async fn load_initial(&self) -> Result<(), SyncError> {
        self.call(Command::LoadInitial).await?
    }

    /// Re-fetch and apply only the differences.
    ///
    /// # Errors
    ///
    /// `SyncError::Network` if the fetch fails. Contents are unchanged.
    pub async fn refresh(&self) -> Result<(), SyncError> {
        self.call(Command::Refresh).await?
    }

    /// Fetch one page older than the oldest loaded entity. Returns the
    /// number of entities inserted.
    ///
    /// # Errors
    ///
    /// - `PageError::NotEligible` if a page is in flight, the cooldown has not
    ///   elapsed, history is exhausted or nothing is loaded yet
    /// - `PageError::Sync` if the fetch fails. The cursor re-arms immediately.
    pub async fn request_older_page(&self) -> Result<usize, PageError> {
        self.call(Command::RequestOlderPage).await?
    }

    /// Zero the unread counts of `ids`. Returns the number of changes.
    ///
    /// # Errors
    ///
    /// `SyncError::Closed` if the collection has stopped.
    pub async fn mark_read(&self, ids: Vec<EntityId>) -> Result<usize, SyncError> {
        self.call(|reply| Command::MarkRead { ids, reply }).await
    }

    /// Zero every unread count. Returns the number of changes.
    ///
    /// # Errors
    ///
    /// `SyncError::Closed` if the collection has stopped.
    pub async fn mark_all_read(&self) -> Result<usize, SyncError> {
        self.call(Command::MarkAllRead).await
    }

    /// Remove `id` locally (leaving a room, deleting a draft). Returns
    /// whether it was present.
    ///
    /// # Errors
    ///
    /// `SyncError::Closed` if the collection has stopped.
    pub async fn remove_local(&self, id: EntityId) -> Result<bool, SyncError> {
        self.call(|reply| Command::RemoveLocal { id, reply }).await
    }

    /// Current contents in display order.
    ///
    /// # Errors
    ///
    /// `SyncError::Closed` if the collection has stopped.
    pub async fn snapshot(&self) -> Result<Vec<E>, SyncError> {
        self.call(Command::Snapshot).await
    }

    /// Index of the first entity with unread items.
    ///
    /// # Errors
    ///
    /// `SyncError::Closed` if the collection has stopped.
    pub async fn first_unread_position(&self) -> Result<Option<usize>, SyncError> {
        self.call(Command::FirstUnread).await
    }

    /// Where a freshly opened view should scroll to.
    ///
    /// # Errors
    ///
    /// `SyncError::Closed` if the collection has stopped.
    pub async fn initial_anchor(&self) -> Result<ScrollAnchor, SyncError> {
        self.call(Command::Anchor).await
    }

    /// Sum of unread counts over the contents.
    ///
    /// # Errors
    ///
    /// `SyncError::Closed` if the collection has stopped.
    pub async fn unread_total(&self) -> Result<u64, SyncError> {
        self.call(Command::UnreadTotal).await
    }

    /// Current pagination state.
    ///
    /// # Errors
    ///
    /// `SyncError::Closed` if the collection has stopped.
    pub async fn pagination(&self) -> Result<PaginationState, SyncError> {
        self.call(Command::Pagination).await
    }

    /// Pagination state as a watch channel. Updates when a page starts or
    /// completes, on reloads, and when the cooldown elapses.
    ///
    /// # Errors
    ///
    /// `SyncError::Closed` if the collection has stopped.
    pub async fn watch_pagination(&self) -> Result<watch::Receiver<PaginationState>, SyncError> {
        self.call(Command::WatchPagination).await
    }

    /// Load state of the collection.
    ///
    /// # Errors
    ///
    /// `SyncError::Closed` if the collection has stopped.
    pub async fn load_state(&self) -> Result<LoadState, SyncError> {
        self.call(Command::State).await
    }

    /// Counters of dropped and resolved inputs.
    ///
    /// # Errors
    ///
    /// `SyncError::Closed` if the collection has stopped.
    pub async fn stats(&self) -> Result<EngineStats, SyncError> {
        self.call(Command::Stats).await
    }

    /// Observe changes. The first change is a `Reset` with the current
    /// contents.
    ///
    /// # Errors
    ///
    /// `SyncError::Closed` if the collection has stopped.
    pub async fn observe(&self) -> Result<Observer<E>, SyncError> {
        let (snapshot, changes) = self.call(Command::Observe).await?;
        Ok(Observer::new(self.key.clone(), snapshot, changes, self.commands.downgrade()))
    }

    /// Stop the actor and cancel its feed. Idempotent.
    pub async fn close(&self) {
        // Already stopped is fine.
        let _ = self.commands.send(Command::Close).await;
    }

    async fn call<R>(
        &self,
        command: impl FnOnce(oneshot::Sender<R>) -> Command<E>,
    ) -> Result<R, SyncError> {
        let (reply, response) = oneshot::channel();
        self.commands.send(command(reply)).await.map_err(|_| SyncError::Closed)?;
        response.await.map_err(|_| SyncError::Closed)
    }
}

/// Configures and spawns a collection actor.
pub struct CollectionBuilder<E: Entity> {
    key: CollectionKey,
    channel: Option<String>,
    config: SyncConfig,
    filter: CollectionFilter<E>,
}

impl<E: Entity> CollectionBuilder<E> {
    /// Builder for `key` with default config, no filter and no feed.
    pub fn new(key: CollectionKey) -> Self {
        Self { key, channel: None, config: SyncConfig::default(), filter: CollectionFilter::all() }
    }

    /// Subscribe to `channel` for real-time events.
    #[must_use]
    pub fn with_channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = Some(channel.into());
        self
    }

    /// Use `config`.
    #[must_use]
    pub fn with_config(mut self, config: SyncConfig) -> Self {
        self.config = config;
        self
    }

    /// Admit only entities matching `filter`.
    #[must_use]
    pub fn with_filter(mut self, filter: CollectionFilter<E>) -> Self {
        self.filter = filter;
        self
    }

    /// Spawn the actor on the current tokio runtime.
    ///
    /// The actor is idle until [`CollectionHandle::load_initial`]; feed events
    /// that arrive earlier are applied to the empty collection.
    ///
    /// # Errors
    ///
    /// `SyncError::InvalidConfig` if the config is invalid or there is no
    /// current tokio runtime.
    pub fn spawn<T, B, S, V>(
        self,
        loader: CollectionLoader<E, T, B>,
        source: &S,
        env: V,
    ) -> Result<CollectionHandle<E>, SyncError>
    where
        T: Transport<E>,
        B: CacheBackend,
        S: EventSource,
        V: Environment,
    {
        self.config.validate()?;
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|err| SyncError::InvalidConfig(err.to_string()))?;

        let engine = SyncEngine::new(self.key.clone(), &self.config).with_filter(self.filter);
        let feed = self.channel.map(|channel| EventFeed::subscribe(source, channel));
        let (commands, inbox) = mpsc::channel(COMMAND_CAPACITY);

        info!(
            key = %self.key,
            channel = feed.as_ref().map(EventFeed::channel),
            page_size = self.config.page_size,
            "spawning collection"
        );
        let actor = CollectionActor::new(engine, loader, feed, env, self.config, inbox);
        runtime.spawn(actor.run());

        Ok(CollectionHandle { key: self.key, commands })
    }
}

impl CollectionBuilder<Room> {
    /// Group rooms of `user_id`, live-updated from their room channel.
    pub fn rooms(user_id: &str) -> Self {
        Self::new(CollectionKey::rooms())
            .with_channel(channel::user_rooms(user_id))
            .with_filter(CollectionFilter::group_rooms())
    }

    /// One-to-one conversations of `user_id`. Shares the room channel.
    pub fn people(user_id: &str) -> Self {
        Self::new(CollectionKey::people())
            .with_channel(channel::user_rooms(user_id))
            .with_filter(CollectionFilter::one_to_one())
    }
}

impl CollectionBuilder<Message> {
    /// Message history of `room_id`.
    pub fn messages(room_id: &str) -> Self {
        Self::new(CollectionKey::messages(room_id)).with_channel(channel::room_messages(room_id))
    }
}
