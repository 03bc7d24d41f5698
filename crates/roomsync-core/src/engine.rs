//! Collection synchronization engine.
//!
//! Reconciles bulk loads, real-time feed events and older pages into one
//! [`OrderedCollection`]. Every operation returns the [`CollectionChange`]s it
//! produced; the caller publishes them.
//!
//! Flow: `begin_load` -> `apply_cached` (optional) -> `apply_fresh` or
//! `fresh_failed`. Feed events and older pages may interleave with any of
//! these; a later bulk replacement supersedes them.
//!
//! Events that cannot apply (unknown id, older revision, invalid entity) are
//! returned as `Err` and leave the collection untouched. They are never fatal.

use std::collections::HashSet;

use roomsync_proto::{CollectionKey, Entity, EntityId, EntityPatch, FeedEvent, ProtocolError};
use tracing::{debug, trace, warn};

use crate::{
    anchor::ScrollAnchor,
    change::CollectionChange,
    collection::{OrderedCollection, supersedes},
    config::SyncConfig,
    error::SyncError,
    filter::CollectionFilter,
};

type Changes<E> = Vec<CollectionChange<E>>;

/// How current the loaded contents are.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    /// Served from the cache; a network fetch has not succeeded yet.
    Stale,
    /// Replaced by a successful network fetch.
    Fresh,
}

/// Load lifecycle of a collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    /// Nothing loaded and no load in progress.
    Empty,
    /// First load in progress, nothing to show yet.
    Loading,
    /// Contents available.
    Loaded(Freshness),
}

impl LoadState {
    /// True once any contents (cached or fresh) have been applied.
    pub fn is_loaded(&self) -> bool {
        matches!(self, Self::Loaded(_))
    }
}

/// Counters for inputs the engine discarded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineStats {
    /// Events targeting an id that is not present.
    pub stale_dropped: u64,
    /// Events carrying a revision not newer than the applied one.
    pub stale_versions: u64,
    /// Entities rejected by validation.
    pub malformed: u64,
    /// Duplicate ids resolved during bulk or page inserts.
    pub duplicates_resolved: u64,
    /// Entities rejected by the collection filter.
    pub filtered: u64,
}

/// Synchronization engine for one collection.
///
/// # Invariants
///
/// - The collection never holds two entities with the same id.
/// - The collection is always in display order.
/// - Every returned change sequence, replayed on the previous contents,
///   reproduces the current contents.
#[derive(Debug)]
pub struct SyncEngine<E: Entity> {
    key: CollectionKey,
    collection: OrderedCollection<E>,
    state: LoadState,
    filter: CollectionFilter<E>,
    unread_scan_limit: usize,
    lookback_sections: usize,
    stats: EngineStats,
}

impl<E: Entity> SyncEngine<E> {
    /// Empty engine for `key`.
    pub fn new(key: CollectionKey, config: &SyncConfig) -> Self {
        Self {
            key,
            collection: OrderedCollection::new(),
            state: LoadState::Empty,
            filter: CollectionFilter::all(),
            unread_scan_limit: config.unread_scan_limit,
            lookback_sections: config.lookback_sections,
            stats: EngineStats::default(),
        }
    }

    /// Restrict admission to entities matching `filter`.
    #[must_use]
    pub fn with_filter(mut self, filter: CollectionFilter<E>) -> Self {
        self.filter = filter;
        self
    }

    /// Collection key.
    pub fn key(&self) -> &CollectionKey {
        &self.key
    }

    /// Current load state.
    pub fn state(&self) -> LoadState {
        self.state
    }

    /// Discard counters.
    pub fn stats(&self) -> EngineStats {
        self.stats
    }

    /// Number of entities.
    pub fn len(&self) -> usize {
        self.collection.len()
    }

    /// True if the collection is empty.
    pub fn is_empty(&self) -> bool {
        self.collection.is_empty()
    }

    /// Entities in display order.
    pub fn entities(&self) -> &[E] {
        self.collection.as_slice()
    }

    /// The underlying collection.
    pub fn collection(&self) -> &OrderedCollection<E> {
        &self.collection
    }

    /// Owned copy of the contents in display order.
    pub fn snapshot(&self) -> Vec<E> {
        self.collection.to_vec()
    }

    /// Entity with `id`.
    pub fn get(&self, id: &EntityId) -> Option<&E> {
        self.collection.get(id)
    }

    /// Sum of unread counts, recomputed from the contents.
    pub fn unread_total(&self) -> u64 {
        self.collection.unread_total()
    }

    /// Number of entities with at least one unread item.
    pub fn unread_entity_count(&self) -> usize {
        self.collection.iter().filter(|entity| entity.unread_count() > 0).count()
    }

    /// Position of the first entity with unread items.
    pub fn find_first_unread_position(&self) -> Option<usize> {
        self.collection.first_unread_position()
    }

    /// Where a freshly opened view should scroll to.
    pub fn initial_anchor(&self) -> ScrollAnchor {
        ScrollAnchor::at(
            self.find_first_unread_position(),
            self.unread_scan_limit,
            self.lookback_sections,
        )
    }

    /// A load is starting. Moves `Empty` to `Loading`; loaded contents stay
    /// visible during a reload.
    pub fn begin_load(&mut self) {
        if self.state == LoadState::Empty {
            self.state = LoadState::Loading;
        }
    }

    /// Apply a cached snapshot.
    ///
    /// Ignored once fresh data has been applied, so a slow cache read cannot
    /// overwrite newer network contents.
    pub fn apply_cached(&mut self, entities: Vec<E>) -> Changes<E> {
        if self.state == LoadState::Loaded(Freshness::Fresh) {
            debug!(key = %self.key, "cached snapshot ignored, fresh contents already applied");
            return Vec::new();
        }

        let changes = self.replace_all(entities);
        self.state = LoadState::Loaded(Freshness::Stale);
        debug!(key = %self.key, len = self.collection.len(), "cached snapshot applied");
        changes
    }

    /// Replace the contents with a successful network fetch.
    pub fn apply_fresh(&mut self, entities: Vec<E>) -> Changes<E> {
        let changes = self.replace_all(entities);
        self.state = LoadState::Loaded(Freshness::Fresh);
        debug!(key = %self.key, len = self.collection.len(), "fresh contents applied");
        changes
    }

    /// The network fetch failed. Cached contents, if any, stay authoritative.
    pub fn fresh_failed(&mut self) {
        if self.state == LoadState::Loading {
            self.state = LoadState::Empty;
        }
    }

    /// Bring the contents in line with a refreshed fetch using minimal changes.
    ///
    /// Entities missing from `entities` are removed (descending index order),
    /// then every fetched entity is upserted in display order. Entities the
    /// feed has already advanced to a newer revision keep that revision.
    /// Before the first load this is a plain [`Self::apply_fresh`].
    pub fn reconcile(&mut self, entities: Vec<E>) -> Changes<E> {
        if !self.state.is_loaded() {
            return self.apply_fresh(entities);
        }

        let (target, duplicates) = OrderedCollection::from_entities(self.admit_batch(entities));
        self.stats.duplicates_resolved += duplicates as u64;

        let keep: HashSet<&EntityId> = target.iter().map(Entity::id).collect();
        let gone: Vec<EntityId> = self
            .collection
            .iter()
            .filter(|entity| !keep.contains(entity.id()))
            .map(|entity| entity.id().clone())
            .collect();

        let mut changes = Vec::new();
        for id in gone.into_iter().rev() {
            changes.extend(self.evict(&id));
        }

        for entity in target.iter() {
            match self.collection.position(entity.id()) {
                None => changes.push(self.insert(entity.clone())),
                Some(from) => {
                    let existing = &self.collection.as_slice()[from];
                    if existing != entity && supersedes(entity, existing) {
                        changes.push(self.replace(from, entity.clone()));
                    }
                },
            }
        }

        self.state = LoadState::Loaded(Freshness::Fresh);
        debug!(key = %self.key, changes = changes.len(), "refresh reconciled");
        changes
    }

    /// Apply one decoded feed event.
    ///
    /// # Errors
    ///
    /// See the per-kind methods. Every error leaves the collection unchanged.
    pub fn apply(&mut self, event: FeedEvent<E>) -> Result<Changes<E>, SyncError> {
        match event {
            FeedEvent::Created(entity) => self.apply_created(entity),
            FeedEvent::Updated(entity) => self.apply_updated(entity),
            FeedEvent::Patched { id, patch } => self.apply_patched(id, &patch),
            FeedEvent::Deleted(id) => self.apply_deleted(&id),
        }
    }

    /// A new entity was created.
    ///
    /// A create for an id already present is a duplicate delivery and is
    /// handled as an update.
    ///
    /// # Errors
    ///
    /// - `SyncError::MalformedEntity` if the entity fails validation
    /// - `SyncError::StaleVersion` if it duplicates a newer revision
    pub fn apply_created(&mut self, entity: E) -> Result<Changes<E>, SyncError> {
        if self.collection.contains(entity.id()) {
            trace!(key = %self.key, id = %entity.id(), "duplicate create handled as update");
        }
        self.upsert(entity)
    }

    /// An entity was replaced with a full new copy.
    ///
    /// Unknown ids are inserted.
    ///
    /// # Errors
    ///
    /// - `SyncError::MalformedEntity` if the entity fails validation
    /// - `SyncError::StaleVersion` if the present revision is not older
    pub fn apply_updated(&mut self, entity: E) -> Result<Changes<E>, SyncError> {
        self.upsert(entity)
    }

    /// Merge a partial update onto an existing entity.
    ///
    /// # Errors
    ///
    /// - `SyncError::StaleEventDropped` if `id` is not present
    /// - `SyncError::StaleVersion` if the patch revision is not newer
    pub fn apply_patched(&mut self, id: EntityId, patch: &E::Patch) -> Result<Changes<E>, SyncError> {
        let Some(from) = self.collection.position(&id) else {
            return Err(self.stale(id));
        };

        let existing = &self.collection.as_slice()[from];
        if let Some(err) = stale_version(existing, patch.version()) {
            return Err(self.stale_version_dropped(err));
        }

        let mut next = existing.clone();
        next.apply_patch(patch);
        if next == *existing {
            return Ok(Vec::new());
        }

        if !self.filter.admits(&next) {
            self.stats.filtered += 1;
            return Ok(self.evict(&id));
        }

        Ok(vec![self.replace(from, next)])
    }

    /// Remove an entity.
    ///
    /// # Errors
    ///
    /// - `SyncError::StaleEventDropped` if `id` is not present
    pub fn apply_deleted(&mut self, id: &EntityId) -> Result<Changes<E>, SyncError> {
        if !self.collection.contains(id) {
            return Err(self.stale(id.clone()));
        }
        Ok(self.evict(id))
    }

    /// Merge a page of older entities fetched by backward pagination.
    ///
    /// Each entity lands at its display position. When an id is already
    /// present the resident copy wins unless the page copy carries a strictly
    /// newer revision; repeats inside the page keep the first occurrence.
    /// Invalid entities are skipped individually.
    pub fn insert_older_page(&mut self, entities: Vec<E>) -> Changes<E> {
        let mut seen = HashSet::with_capacity(entities.len());
        let mut changes = Vec::new();

        for entity in entities {
            if !seen.insert(entity.id().clone()) {
                self.stats.duplicates_resolved += 1;
                continue;
            }
            if let Err(err) = entity.validate() {
                self.malformed(&err);
                continue;
            }
            if !self.filter.admits(&entity) {
                self.stats.filtered += 1;
                continue;
            }

            match self.collection.position(entity.id()) {
                None => changes.push(self.insert(entity)),
                Some(from) => {
                    self.stats.duplicates_resolved += 1;
                    let existing = &self.collection.as_slice()[from];
                    let newer = matches!(
                        (entity.version(), existing.version()),
                        (Some(incoming), Some(current)) if incoming > current
                    );
                    if newer {
                        changes.push(self.replace(from, entity));
                    } else {
                        trace!(key = %self.key, id = %entity.id(), "page duplicate discarded");
                    }
                },
            }
        }

        debug!(key = %self.key, inserted = changes.len(), len = self.collection.len(), "older page merged");
        changes
    }

    /// Clear the unread count of each present id. Absent ids are skipped.
    pub fn mark_read(&mut self, ids: &[EntityId]) -> Changes<E> {
        let mut changes = Vec::new();
        for id in ids {
            let Some(from) = self.collection.position(id) else {
                trace!(key = %self.key, %id, "mark_read skipped absent id");
                continue;
            };

            let existing = &self.collection.as_slice()[from];
            if existing.unread_count() == 0 {
                continue;
            }

            let mut next = existing.clone();
            next.mark_read();
            debug_assert_eq!(next.unread_count(), 0);
            changes.push(self.replace(from, next));
        }
        changes
    }

    /// Clear every unread count.
    pub fn mark_all_read(&mut self) -> Changes<E> {
        let ids: Vec<EntityId> = self
            .collection
            .iter()
            .filter(|entity| entity.unread_count() > 0)
            .map(|entity| entity.id().clone())
            .collect();
        self.mark_read(&ids)
    }

    /// Remove an entity on local initiative (hide or leave a room) without
    /// waiting for the server's delete event. The later event is then stale.
    pub fn remove_local(&mut self, id: &EntityId) -> Changes<E> {
        self.evict(id)
    }

    fn upsert(&mut self, entity: E) -> Result<Changes<E>, SyncError> {
        if let Err(err) = entity.validate() {
            self.malformed(&err);
            return Err(err.into());
        }

        if !self.filter.admits(&entity) {
            self.stats.filtered += 1;
            trace!(key = %self.key, id = %entity.id(), filter = self.filter.name(), "entity not admitted");
            return Ok(self.evict(entity.id()));
        }

        let Some(from) = self.collection.position(entity.id()) else {
            return Ok(vec![self.insert(entity)]);
        };

        let existing = &self.collection.as_slice()[from];
        if *existing == entity {
            return Ok(Vec::new());
        }
        if let Some(err) = stale_version(existing, entity.version()) {
            return Err(self.stale_version_dropped(err));
        }

        Ok(vec![self.replace(from, entity)])
    }

    fn insert(&mut self, entity: E) -> CollectionChange<E> {
        let index = self.collection.insert(entity.clone());
        self.debug_check();
        CollectionChange::Inserted { index, entity }
    }

    fn replace(&mut self, from: usize, entity: E) -> CollectionChange<E> {
        let existing = &self.collection.as_slice()[from];
        let sort_relevant = existing.ordering_key() != entity.ordering_key()
            || existing.unread_count() != entity.unread_count()
            || existing.is_pinned() != entity.is_pinned();

        let to = self.collection.replace_at(from, entity.clone());
        self.debug_check();

        if sort_relevant || from != to {
            CollectionChange::Moved { from, to, entity }
        } else {
            CollectionChange::Updated { index: to, entity }
        }
    }

    fn evict(&mut self, id: &EntityId) -> Changes<E> {
        match self.collection.remove(id) {
            Some((index, _)) => vec![CollectionChange::Removed { index, id: id.clone() }],
            None => Vec::new(),
        }
    }

    fn replace_all(&mut self, entities: Vec<E>) -> Changes<E> {
        let (collection, duplicates) = OrderedCollection::from_entities(self.admit_batch(entities));
        if duplicates > 0 {
            warn!(key = %self.key, duplicates, "bulk load contained duplicate ids");
            self.stats.duplicates_resolved += duplicates as u64;
        }
        self.collection = collection;
        vec![CollectionChange::Reset { entities: self.collection.to_vec() }]
    }

    fn admit_batch(&mut self, entities: Vec<E>) -> Vec<E> {
        let mut admitted = Vec::with_capacity(entities.len());
        for entity in entities {
            if let Err(err) = entity.validate() {
                self.malformed(&err);
            } else if self.filter.admits(&entity) {
                admitted.push(entity);
            } else {
                self.stats.filtered += 1;
            }
        }
        admitted
    }

    fn stale(&mut self, id: EntityId) -> SyncError {
        self.stats.stale_dropped += 1;
        debug!(key = %self.key, %id, "stale event dropped");
        SyncError::StaleEventDropped { key: self.key.clone(), id }
    }

    fn stale_version_dropped(&mut self, err: SyncError) -> SyncError {
        self.stats.stale_versions += 1;
        debug!(key = %self.key, error = %err, "stale revision dropped");
        err
    }

    fn malformed(&mut self, err: &ProtocolError) {
        self.stats.malformed += 1;
        warn!(key = %self.key, error = %err, "malformed entity dropped");
    }

    fn debug_check(&self) {
        debug_assert!(
            self.collection.check_invariants().is_ok(),
            "collection invariant broken: {:?}",
            self.collection.check_invariants()
        );
    }
}

fn stale_version<E: Entity>(existing: &E, incoming: Option<u64>) -> Option<SyncError> {
    match (incoming, existing.version()) {
        (Some(incoming), Some(current)) if incoming <= current => {
            Some(SyncError::StaleVersion { id: existing.id().clone(), incoming, current })
        },
        _ => None,
    }
}
