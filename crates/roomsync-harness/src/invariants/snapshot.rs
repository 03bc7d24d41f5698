//! Captured collection state.
//!
//! Checks never look at a live engine or handle. The state is copied out
//! first, either straight from a [`SyncEngine`] or from what a handle
//! reported, so a check compares values that were read together.

use roomsync_core::SyncEngine;
use roomsync_proto::Entity;
use serde::Serialize;

/// Snapshot of every collection under test.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SystemSnapshot {
    /// Per-collection state.
    pub collections: Vec<CollectionState>,
}

impl SystemSnapshot {
    /// Create an empty snapshot (no collections).
    pub fn empty() -> Self {
        Self::default()
    }

    /// Create a snapshot with a single collection.
    pub fn single(collection: CollectionState) -> Self {
        Self { collections: vec![collection] }
    }

    /// Add a collection snapshot.
    pub fn add_collection(&mut self, collection: CollectionState) {
        self.collections.push(collection);
    }
}

/// Observable state of one collection.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CollectionState {
    /// Collection key.
    pub key: String,
    /// Contents in the order the collection reports them.
    pub entities: Vec<EntitySnapshot>,
    /// Unread total as reported by the collection.
    pub unread_total: u64,
    /// First unread index as reported by the collection.
    pub first_unread: Option<usize>,
    /// Ids of an observer's mirror, built by replaying its changes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mirror: Option<Vec<String>>,
}

impl CollectionState {
    /// State with no entities.
    pub fn empty(key: impl Into<String>) -> Self {
        Self { key: key.into(), ..Self::default() }
    }

    /// State from already captured parts.
    pub fn from_parts(
        key: impl Into<String>,
        entities: Vec<EntitySnapshot>,
        unread_total: u64,
        first_unread: Option<usize>,
    ) -> Self {
        Self { key: key.into(), entities, unread_total, first_unread, mirror: None }
    }

    /// Capture an engine.
    pub fn from_engine<E: Entity>(engine: &SyncEngine<E>) -> Self {
        Self {
            key: engine.key().to_string(),
            entities: engine.entities().iter().map(EntitySnapshot::of).collect(),
            unread_total: engine.unread_total(),
            first_unread: engine.find_first_unread_position(),
            mirror: None,
        }
    }

    /// Capture contents reported through a handle.
    pub fn from_entities<E: Entity>(
        key: impl Into<String>,
        entities: &[E],
        unread_total: u64,
        first_unread: Option<usize>,
    ) -> Self {
        Self::from_parts(
            key,
            entities.iter().map(EntitySnapshot::of).collect(),
            unread_total,
            first_unread,
        )
    }

    /// Attach an observer's mirror.
    #[must_use]
    pub fn with_mirror<E: Entity>(mut self, mirror: &[E]) -> Self {
        self.mirror = Some(mirror.iter().map(|entity| entity.id().to_string()).collect());
        self
    }

    /// Ids in reported order.
    pub fn ids(&self) -> Vec<&str> {
        self.entities.iter().map(|entity| entity.id.as_str()).collect()
    }
}

/// The sort-relevant view of one entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntitySnapshot {
    /// Entity id.
    pub id: String,
    /// Ordering key (activity or send time).
    pub ordering_key: u64,
    /// Unread count.
    pub unread: u32,
    /// Member of the leading partition.
    pub prioritized: bool,
}

impl EntitySnapshot {
    /// Build from parts.
    pub fn new(id: impl Into<String>, ordering_key: u64, unread: u32, prioritized: bool) -> Self {
        Self { id: id.into(), ordering_key, unread, prioritized }
    }

    /// Capture an entity.
    pub fn of<E: Entity>(entity: &E) -> Self {
        Self::new(
            entity.id().to_string(),
            entity.ordering_key(),
            entity.unread_count(),
            entity.is_prioritized(),
        )
    }
}
