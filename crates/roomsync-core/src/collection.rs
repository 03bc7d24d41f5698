//! Ordered, duplicate-free entity storage.
//!
//! [`OrderedCollection`] owns the display order. It knows nothing about
//! events, versions or loading; the engine decides *whether* to mutate and
//! the collection decides *where* things land.

use std::{
    cmp::Ordering,
    collections::{HashMap, HashSet, hash_map},
};

use roomsync_proto::{Entity, EntityId};
use thiserror::Error;

/// Display order of two entities.
///
/// Prioritized entities (unread or pinned) first, then ordering key
/// descending, then id ascending so the order is total.
pub fn display_order<E: Entity>(a: &E, b: &E) -> Ordering {
    b.is_prioritized()
        .cmp(&a.is_prioritized())
        .then_with(|| b.ordering_key().cmp(&a.ordering_key()))
        .then_with(|| a.id().cmp(b.id()))
}

/// A broken collection invariant.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InvariantViolation {
    /// Two entities share an id.
    #[error("duplicate id {id} at index {index}")]
    DuplicateId {
        /// Repeated id
        id: EntityId,
        /// Index of the second occurrence
        index: usize,
    },

    /// Two neighbours are not in display order.
    #[error("entities at {index} and {} out of display order", index + 1)]
    OutOfOrder {
        /// Index of the first of the two neighbours
        index: usize,
    },
}

/// Entities kept in display order with unique ids.
///
/// # Invariants
///
/// - No two entities share an id.
/// - Adjacent entities satisfy [`display_order`] `!= Greater`.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderedCollection<E> {
    items: Vec<E>,
}

impl<E: Entity> Default for OrderedCollection<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Entity> OrderedCollection<E> {
    /// Empty collection.
    pub fn new() -> Self {
        Self { items: Vec::new() }
    }

    /// Build from an unordered batch.
    ///
    /// When the batch repeats an id, the later occurrence wins unless it
    /// carries an older revision. Returns the collection and the number of
    /// duplicates discarded.
    pub fn from_entities(entities: impl IntoIterator<Item = E>) -> (Self, usize) {
        let entities = entities.into_iter();
        let mut items: Vec<E> = Vec::with_capacity(entities.size_hint().0);
        let mut index_of: HashMap<EntityId, usize> = HashMap::with_capacity(items.capacity());
        let mut duplicates = 0;

        for entity in entities {
            match index_of.entry(entity.id().clone()) {
                hash_map::Entry::Occupied(slot) => {
                    duplicates += 1;
                    let index = *slot.get();
                    if supersedes(&entity, &items[index]) {
                        items[index] = entity;
                    }
                },
                hash_map::Entry::Vacant(slot) => {
                    slot.insert(items.len());
                    items.push(entity);
                },
            }
        }

        items.sort_by(display_order);
        let collection = Self { items };
        debug_assert!(collection.check_invariants().is_ok());
        (collection, duplicates)
    }

    /// Number of entities.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// True if empty.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Entities in display order.
    pub fn as_slice(&self) -> &[E] {
        &self.items
    }

    /// Iterate in display order.
    pub fn iter(&self) -> std::slice::Iter<'_, E> {
        self.items.iter()
    }

    /// Entity at `index`.
    pub fn at(&self, index: usize) -> Option<&E> {
        self.items.get(index)
    }

    /// Position of `id`.
    pub fn position(&self, id: &EntityId) -> Option<usize> {
        self.items.iter().position(|entity| entity.id() == id)
    }

    /// Entity with `id`.
    pub fn get(&self, id: &EntityId) -> Option<&E> {
        self.items.iter().find(|entity| entity.id() == id)
    }

    /// True if an entity with `id` is present.
    pub fn contains(&self, id: &EntityId) -> bool {
        self.position(id).is_some()
    }

    /// Insert a new entity at its display position and return that position.
    ///
    /// # Panics
    ///
    /// Debug builds panic if an entity with the same id is already present.
    pub fn insert(&mut self, entity: E) -> usize {
        debug_assert!(!self.contains(entity.id()), "duplicate insert of {}", entity.id());

        let index = self.insertion_point(&entity);
        self.items.insert(index, entity);
        index
    }

    /// Replace the entity at `from` and re-sort it. Returns the new position.
    ///
    /// # Panics
    ///
    /// Panics if `from` is out of bounds.
    pub fn replace_at(&mut self, from: usize, entity: E) -> usize {
        debug_assert_eq!(self.items[from].id(), entity.id());

        self.items.remove(from);
        let to = self.insertion_point(&entity);
        self.items.insert(to, entity);
        to
    }

    /// Remove the entity with `id`, returning its former position.
    pub fn remove(&mut self, id: &EntityId) -> Option<(usize, E)> {
        let index = self.position(id)?;
        Some((index, self.items.remove(index)))
    }

    /// Position of the first entity with unread items.
    pub fn first_unread_position(&self) -> Option<usize> {
        self.items.iter().position(|entity| entity.unread_count() > 0)
    }

    /// Sum of unread counts.
    pub fn unread_total(&self) -> u64 {
        self.items.iter().map(|entity| u64::from(entity.unread_count())).sum()
    }

    /// Entity with the smallest ordering key.
    pub fn oldest(&self) -> Option<&E> {
        self.items.iter().min_by_key(|entity| entity.ordering_key())
    }

    /// Clone of the contents.
    pub fn to_vec(&self) -> Vec<E> {
        self.items.clone()
    }

    /// Verify uniqueness and order.
    ///
    /// # Errors
    ///
    /// The first violation found, scanning from the top.
    pub fn check_invariants(&self) -> Result<(), InvariantViolation> {
        let mut seen = HashSet::with_capacity(self.items.len());
        for (index, entity) in self.items.iter().enumerate() {
            if !seen.insert(entity.id()) {
                return Err(InvariantViolation::DuplicateId { id: entity.id().clone(), index });
            }
        }

        for (index, pair) in self.items.windows(2).enumerate() {
            if display_order(&pair[0], &pair[1]) == Ordering::Greater {
                return Err(InvariantViolation::OutOfOrder { index });
            }
        }

        Ok(())
    }

    fn insertion_point(&self, entity: &E) -> usize {
        self.items.partition_point(|existing| display_order(existing, entity) == Ordering::Less)
    }
}

impl<'a, E> IntoIterator for &'a OrderedCollection<E> {
    type Item = &'a E;
    type IntoIter = std::slice::Iter<'a, E>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

/// True if `incoming` should replace `existing` when both claim the same id.
///
/// Arrival order wins unless both carry revisions and the incoming one is
/// older.
pub(crate) fn supersedes<E: Entity>(incoming: &E, existing: &E) -> bool {
    match (incoming.version(), existing.version()) {
        (Some(incoming), Some(existing)) => incoming >= existing,
        _ => true,
    }
}
