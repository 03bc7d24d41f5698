//! Per-collection actor.
//!
//! One task owns the engine, cursor, loader and feed of a collection and
//! serializes everything that touches them: handle commands, feed events and
//! the results of fetches. Fetches run on their own tasks and post a
//! [`Completion`] back; if the actor is gone by then the send fails and the
//! result is dropped.
//!
//! Loads are numbered. A completion carrying an older generation than the
//! latest load is discarded, so a slow superseded fetch cannot overwrite a
//! newer one.

use roomsync_core::{
    CollectionChange, EngineStats, Environment, LoadState, PageRequest, PaginationCursor,
    PaginationState, ScrollAnchor, SyncConfig, SyncEngine, SyncError,
};
use roomsync_proto::{Entity, EntityId, FeedEvent};
use roomsync_storage::CacheBackend;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tracing::{debug, info, trace, warn};

use crate::{error::PageError, feed::EventFeed, loader::CollectionLoader, transport::Transport};

type Reply<R> = oneshot::Sender<R>;

/// Contents plus a change receiver, taken atomically.
pub(crate) type Subscribed<E> = (Vec<E>, broadcast::Receiver<CollectionChange<E>>);

/// Requests from handles and observers.
pub(crate) enum Command<E: Entity> {
    LoadInitial(Reply<Result<(), SyncError>>),
    Refresh(Reply<Result<(), SyncError>>),
    RequestOlderPage(Reply<Result<usize, PageError>>),
    MarkRead { ids: Vec<EntityId>, reply: Reply<usize> },
    MarkAllRead(Reply<usize>),
    RemoveLocal { id: EntityId, reply: Reply<bool> },
    Snapshot(Reply<Vec<E>>),
    FirstUnread(Reply<Option<usize>>),
    Anchor(Reply<ScrollAnchor>),
    UnreadTotal(Reply<u64>),
    Pagination(Reply<PaginationState>),
    State(Reply<LoadState>),
    Stats(Reply<EngineStats>),
    Observe(Reply<Subscribed<E>>),
    WatchPagination(Reply<watch::Receiver<PaginationState>>),
    Close,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoadMode {
    /// Cache first, then replace wholesale.
    Replace,
    /// Network only, minimal diff against the current contents.
    Reconcile,
}

/// Results posted back by spawned tasks.
enum Completion<E: Entity> {
    Cached { generation: u64, entities: Option<Vec<E>> },
    Fresh { generation: u64, mode: LoadMode, result: Result<Vec<E>, SyncError> },
    Page { request: PageRequest, result: Result<Vec<E>, SyncError> },
    CooldownElapsed,
}

pub(crate) struct CollectionActor<E, T, B, V>
where
    E: Entity,
    V: Environment,
{
    engine: SyncEngine<E>,
    cursor: PaginationCursor<V::Instant>,
    loader: CollectionLoader<E, T, B>,
    feed: Option<EventFeed<E>>,
    env: V,
    config: SyncConfig,
    commands: mpsc::Receiver<Command<E>>,
    completions: mpsc::UnboundedReceiver<Completion<E>>,
    completions_tx: mpsc::UnboundedSender<Completion<E>>,
    changes: broadcast::Sender<CollectionChange<E>>,
    pagination: watch::Sender<PaginationState>,
    generation: u64,
    pending_loads: Vec<Reply<Result<(), SyncError>>>,
    /// Waiter for the in-flight page, tagged with its cursor generation.
    pending_page: Option<(u64, Reply<Result<usize, PageError>>)>,
}

impl<E, T, B, V> CollectionActor<E, T, B, V>
where
    E: Entity,
    T: Transport<E>,
    B: CacheBackend,
    V: Environment,
{
    pub(crate) fn new(
        engine: SyncEngine<E>,
        loader: CollectionLoader<E, T, B>,
        feed: Option<EventFeed<E>>,
        env: V,
        config: SyncConfig,
        commands: mpsc::Receiver<Command<E>>,
    ) -> Self {
        let (completions_tx, completions) = mpsc::unbounded_channel();
        let (changes, _) = broadcast::channel(config.observer_capacity);
        let cursor = PaginationCursor::new(config.page_size, config.pagination_cooldown);
        let (pagination, _) = watch::channel(cursor.state(env.now()));

        Self {
            engine,
            cursor,
            loader,
            feed,
            env,
            config,
            commands,
            completions,
            completions_tx,
            changes,
            pagination,
            generation: 0,
            pending_loads: Vec::new(),
            pending_page: None,
        }
    }

    /// Serve until closed or every handle is dropped.
    pub(crate) async fn run(mut self) {
        debug!(key = %self.engine.key(), "collection actor started");

        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(Command::Close) | None => break,
                    Some(command) => self.on_command(command),
                },
                Some(completion) = self.completions.recv() => self.on_completion(completion),
                event = next_event(&mut self.feed) => match event {
                    Some(event) => self.on_event(event),
                    None => {
                        debug!(key = %self.engine.key(), "feed ended");
                        self.feed = None;
                    },
                },
            }
        }

        if let Some(feed) = self.feed.as_mut() {
            feed.cancel();
        }
        debug!(key = %self.engine.key(), stats = ?self.engine.stats(), "collection actor stopped");
    }

    fn on_command(&mut self, command: Command<E>) {
        match command {
            Command::LoadInitial(reply) => self.start_load(LoadMode::Replace, reply),
            Command::Refresh(reply) => self.start_load(LoadMode::Reconcile, reply),
            Command::RequestOlderPage(reply) => self.request_older_page(reply),
            Command::MarkRead { ids, reply } => {
                let changes = self.engine.mark_read(&ids);
                let _ = reply.send(self.commit(changes));
            },
            Command::MarkAllRead(reply) => {
                let changes = self.engine.mark_all_read();
                let _ = reply.send(self.commit(changes));
            },
            Command::RemoveLocal { id, reply } => {
                let changes = self.engine.remove_local(&id);
                let _ = reply.send(self.commit(changes) > 0);
            },
            Command::Snapshot(reply) => {
                let _ = reply.send(self.engine.snapshot());
            },
            Command::FirstUnread(reply) => {
                let _ = reply.send(self.engine.find_first_unread_position());
            },
            Command::Anchor(reply) => {
                let _ = reply.send(self.engine.initial_anchor());
            },
            Command::UnreadTotal(reply) => {
                let _ = reply.send(self.engine.unread_total());
            },
            Command::Pagination(reply) => {
                let _ = reply.send(self.cursor.state(self.env.now()));
            },
            Command::State(reply) => {
                let _ = reply.send(self.engine.state());
            },
            Command::Stats(reply) => {
                let _ = reply.send(self.engine.stats());
            },
            Command::Observe(reply) => {
                let _ = reply.send((self.engine.snapshot(), self.changes.subscribe()));
            },
            Command::WatchPagination(reply) => {
                let _ = reply.send(self.pagination.subscribe());
            },
            Command::Close => {},
        }
    }

    fn start_load(&mut self, mode: LoadMode, reply: Reply<Result<(), SyncError>>) {
        self.generation += 1;
        self.pending_loads.push(reply);
        if mode == LoadMode::Replace {
            self.engine.begin_load();
        }

        let generation = self.generation;
        let loader = self.loader.clone();
        let key = self.engine.key().clone();
        let completions = self.completions_tx.clone();
        debug!(%key, generation, ?mode, "load started");

        tokio::spawn(async move {
            if mode == LoadMode::Replace {
                let entities = match loader.fetch_cached(&key) {
                    Ok(snapshot) => Some(snapshot.entities),
                    Err(err) => {
                        debug!(%key, error = %err, "no cached snapshot");
                        None
                    },
                };
                if completions.send(Completion::Cached { generation, entities }).is_err() {
                    return;
                }
            }

            let result = loader.fetch_latest(&key).await;
            let _ = completions.send(Completion::Fresh { generation, mode, result });
        });
    }

    fn request_older_page(&mut self, reply: Reply<Result<usize, PageError>>) {
        let request = match self.cursor.request(self.env.now()) {
            Ok(request) => request,
            Err(rejection) => {
                debug!(key = %self.engine.key(), ?rejection, "older page not eligible");
                let _ = reply.send(Err(PageError::NotEligible(rejection)));
                return;
            },
        };

        self.pending_page = Some((request.generation, reply));
        self.publish_pagination();

        let loader = self.loader.clone();
        let key = self.engine.key().clone();
        let completions = self.completions_tx.clone();
        debug!(%key, before = %request.before_id, limit = request.page_size, "older page requested");

        tokio::spawn(async move {
            let result =
                loader.fetch_older_page(&key, &request.before_id, request.page_size).await;
            let _ = completions.send(Completion::Page { request, result });
        });
    }

    fn on_completion(&mut self, completion: Completion<E>) {
        match completion {
            Completion::Cached { generation, entities } => {
                if generation != self.generation {
                    debug!(key = %self.engine.key(), generation, "superseded cache read discarded");
                    return;
                }
                if let Some(entities) = entities {
                    let changes = self.engine.apply_cached(entities);
                    if !changes.is_empty() {
                        self.reset_cursor();
                        self.publish(changes);
                        self.publish_pagination();
                    }
                }
            },
            Completion::Fresh { generation, mode, result } => {
                if generation != self.generation {
                    debug!(key = %self.engine.key(), generation, "superseded fetch discarded");
                    return;
                }
                self.finish_load(mode, result);
            },
            Completion::Page { request, result } => self.finish_page(&request, result),
            Completion::CooldownElapsed => self.publish_pagination(),
        }
    }

    fn finish_load(&mut self, mode: LoadMode, result: Result<Vec<E>, SyncError>) {
        let outcome = match result {
            Ok(entities) => {
                let changes = match mode {
                    LoadMode::Replace => self.engine.apply_fresh(entities),
                    LoadMode::Reconcile => self.engine.reconcile(entities),
                };
                self.reset_cursor();
                info!(
                    key = %self.engine.key(),
                    ?mode,
                    count = self.engine.len(),
                    changes = changes.len(),
                    "collection loaded"
                );
                self.publish(changes);
                self.persist();
                Ok(())
            },
            Err(err) => {
                self.engine.fresh_failed();
                warn!(key = %self.engine.key(), error = %err, state = ?self.engine.state(), "load failed, keeping current contents");
                Err(err)
            },
        };

        self.publish_pagination();
        for reply in self.pending_loads.drain(..) {
            let _ = reply.send(outcome.clone());
        }
    }

    fn finish_page(&mut self, request: &PageRequest, result: Result<Vec<E>, SyncError>) {
        // A reload orphaned this request and already answered its waiter.
        if request.generation != self.cursor.generation() {
            debug!(key = %self.engine.key(), generation = request.generation, "page from before a reload discarded");
            return;
        }

        let outcome = match result {
            Ok(entities) => {
                self.cursor.complete(request, &entities, self.env.now());
                let changes = self.engine.insert_older_page(entities);
                let inserted = changes
                    .iter()
                    .filter(|change| matches!(change, CollectionChange::Inserted { .. }))
                    .count();
                self.publish(changes);
                self.schedule_rearm();
                Ok(inserted)
            },
            Err(err) => {
                self.cursor.fail(request);
                Err(PageError::Sync(err))
            },
        };

        self.publish_pagination();
        match self.pending_page.take() {
            Some((generation, reply)) if generation == request.generation => {
                let _ = reply.send(outcome);
            },
            other => self.pending_page = other,
        }
    }

    fn on_event(&mut self, event: Result<FeedEvent<E>, SyncError>) {
        let event = match event {
            Ok(event) => event,
            Err(err) => {
                warn!(key = %self.engine.key(), error = %err, "undecodable feed event dropped");
                return;
            },
        };

        match self.engine.apply(event) {
            Ok(changes) => {
                if self.cursor.oldest_loaded_id().is_none() {
                    self.cursor.observe(self.engine.entities());
                }
                self.commit(changes);
            },
            Err(err) if err.is_drop() => {
                debug!(key = %self.engine.key(), error = %err, "feed event not applied");
            },
            Err(err) => warn!(key = %self.engine.key(), error = %err, "feed event failed"),
        }
    }

    /// Publish `changes` and persist them when write-through is on. Returns
    /// the number of changes.
    fn commit(&mut self, changes: Vec<CollectionChange<E>>) -> usize {
        let count = changes.len();
        if count == 0 {
            return 0;
        }

        if self.moves_anchor(&changes) {
            self.cursor.retarget(self.engine.entities());
            debug!(
                key = %self.engine.key(),
                anchor = ?self.cursor.oldest_loaded_id(),
                "pagination anchor moved"
            );
            self.publish_pagination();
        }
        self.publish(changes);
        if self.config.write_through_events {
            self.persist();
        }
        count
    }

    /// True if `changes` removed or repositioned the pagination anchor.
    fn moves_anchor(&self, changes: &[CollectionChange<E>]) -> bool {
        let Some(anchor) = self.cursor.oldest_loaded_id() else { return false };
        changes.iter().any(|change| match change {
            CollectionChange::Removed { id, .. } => id == anchor,
            CollectionChange::Moved { entity, .. } => entity.id() == anchor,
            _ => false,
        })
    }

    /// Start pagination over from the current contents. A page still in
    /// flight belongs to the old contents; its waiter is answered now with
    /// nothing inserted.
    fn reset_cursor(&mut self) {
        self.cursor.reset(self.engine.entities());
        if let Some((generation, reply)) = self.pending_page.take() {
            debug!(key = %self.engine.key(), generation, "in-flight page orphaned by reload");
            let _ = reply.send(Ok(0));
        }
    }

    /// Replace the cached snapshot with the current contents. Failures are
    /// logged; the cache is an optimization.
    fn persist(&self) {
        let snapshot = self.engine.snapshot();
        let fetched_at_ms = self.env.wall_clock_millis();
        if let Err(err) = self.loader.store_snapshot(self.engine.key(), snapshot, fetched_at_ms) {
            warn!(key = %self.engine.key(), error = %err, "failed to cache collection");
        }
    }

    fn publish(&self, changes: Vec<CollectionChange<E>>) {
        for change in changes {
            trace!(key = %self.engine.key(), kind = change.kind(), "change");
            // No observers is fine.
            let _ = self.changes.send(change);
        }
    }

    fn publish_pagination(&self) {
        self.pagination.send_replace(self.cursor.state(self.env.now()));
    }

    /// Wake the actor when the pagination cooldown ends so watchers see the
    /// cursor re-arm.
    fn schedule_rearm(&self) {
        if self.config.pagination_cooldown.is_zero() {
            return;
        }

        let env = self.env.clone();
        let cooldown = self.config.pagination_cooldown;
        let completions = self.completions_tx.clone();
        tokio::spawn(async move {
            env.sleep(cooldown).await;
            let _ = completions.send(Completion::CooldownElapsed);
        });
    }
}

async fn next_event<E: Entity>(
    feed: &mut Option<EventFeed<E>>,
) -> Option<Result<FeedEvent<E>, SyncError>> {
    match feed {
        Some(feed) => feed.next().await,
        None => std::future::pending().await,
    }
}
