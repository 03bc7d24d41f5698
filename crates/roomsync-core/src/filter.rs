//! Admission predicates for collections built from a shared feed.

use std::{fmt, sync::Arc};

use roomsync_proto::{Entity, Room};

type Predicate<E> = Arc<dyn Fn(&E) -> bool + Send + Sync>;

/// Decides which entities a collection admits.
///
/// Rooms and people are both fed from the user's rooms channel; the filter
/// keeps group rooms and one-to-one conversations apart. An entity that stops
/// matching (after an update) leaves the collection.
pub struct CollectionFilter<E> {
    name: &'static str,
    predicate: Option<Predicate<E>>,
}

impl<E: Entity> CollectionFilter<E> {
    /// Admit every entity.
    pub fn all() -> Self {
        Self { name: "all", predicate: None }
    }

    /// Admit entities matching `predicate`.
    pub fn new(name: &'static str, predicate: impl Fn(&E) -> bool + Send + Sync + 'static) -> Self {
        Self { name, predicate: Some(Arc::new(predicate)) }
    }

    /// True if `entity` belongs in the collection.
    pub fn admits(&self, entity: &E) -> bool {
        self.predicate.as_ref().is_none_or(|predicate| predicate(entity))
    }

    /// Label used in logs.
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl CollectionFilter<Room> {
    /// Group rooms only (the rooms list).
    pub fn group_rooms() -> Self {
        Self::new("group-rooms", |room: &Room| !room.one_to_one)
    }

    /// One-to-one conversations only (the people list).
    pub fn one_to_one() -> Self {
        Self::new("one-to-one", |room: &Room| room.one_to_one)
    }
}

impl<E> Clone for CollectionFilter<E> {
    fn clone(&self) -> Self {
        Self { name: self.name, predicate: self.predicate.clone() }
    }
}

impl<E> fmt::Debug for CollectionFilter<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CollectionFilter").field("name", &self.name).finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rooms_and_people_partition_the_feed() {
        let group = Room::new("g", 1);
        let direct = Room::new("d", 1).with_one_to_one(true);

        assert!(CollectionFilter::group_rooms().admits(&group));
        assert!(!CollectionFilter::group_rooms().admits(&direct));
        assert!(CollectionFilter::one_to_one().admits(&direct));
        assert!(!CollectionFilter::one_to_one().admits(&group));
        assert!(CollectionFilter::all().admits(&direct));
    }
}
