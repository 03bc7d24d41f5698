//! The standard collection checks.

use std::collections::HashSet;

use super::{CollectionState, Invariant, InvariantResult};

/// No id appears twice.
pub struct UniqueIds;

impl Invariant for UniqueIds {
    fn name(&self) -> &'static str {
        "unique_ids"
    }

    fn check(&self, collection: &CollectionState) -> InvariantResult {
        let mut seen = HashSet::with_capacity(collection.entities.len());
        match collection.entities.iter().position(|entity| !seen.insert(entity.id.as_str())) {
            Some(index) => {
                Err(format!("id {} repeated at index {index}", collection.entities[index].id))
            },
            None => Ok(()),
        }
    }
}

/// Contents are in display order.
///
/// Prioritized entities come first. Within each partition the ordering key
/// descends, and ties are broken by ascending id.
pub struct DisplayOrder;

impl Invariant for DisplayOrder {
    fn name(&self) -> &'static str {
        "display_order"
    }

    fn check(&self, collection: &CollectionState) -> InvariantResult {
        let misplaced = collection.entities.windows(2).position(|pair| {
            let (a, b) = (&pair[0], &pair[1]);
            match (a.prioritized, b.prioritized) {
                (false, true) => true,
                (true, false) => false,
                _ => (b.ordering_key, &a.id) >= (a.ordering_key, &b.id),
            }
        });

        match misplaced {
            Some(index) => Err(format!(
                "{:?} before {:?} at index {index}",
                collection.entities[index],
                collection.entities[index + 1]
            )),
            None => Ok(()),
        }
    }
}

/// The reported unread total is the sum over the contents.
pub struct UnreadTotalConsistent;

impl Invariant for UnreadTotalConsistent {
    fn name(&self) -> &'static str {
        "unread_total_consistent"
    }

    fn check(&self, collection: &CollectionState) -> InvariantResult {
        let sum: u64 = collection.entities.iter().map(|entity| u64::from(entity.unread)).sum();
        if sum == collection.unread_total {
            Ok(())
        } else {
            Err(format!("reported {} unread, contents sum to {sum}", collection.unread_total))
        }
    }
}

/// The reported first unread index is the first entity with unread items.
pub struct FirstUnreadConsistent;

impl Invariant for FirstUnreadConsistent {
    fn name(&self) -> &'static str {
        "first_unread_consistent"
    }

    fn check(&self, collection: &CollectionState) -> InvariantResult {
        let expected = collection.entities.iter().position(|entity| entity.unread > 0);
        if expected == collection.first_unread {
            Ok(())
        } else {
            Err(format!("reported {:?}, expected {expected:?}", collection.first_unread))
        }
    }
}

/// An observer that replayed every change holds the same ids in the same
/// order. Collections captured without a mirror pass.
pub struct MirrorConsistent;

impl Invariant for MirrorConsistent {
    fn name(&self) -> &'static str {
        "mirror_consistent"
    }

    fn check(&self, collection: &CollectionState) -> InvariantResult {
        let Some(mirror) = &collection.mirror else { return Ok(()) };
        let ids = collection.ids();
        if mirror.iter().map(String::as_str).eq(ids.iter().copied()) {
            Ok(())
        } else {
            Err(format!("mirror {mirror:?} diverged from {ids:?}"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::invariants::EntitySnapshot;

    fn rooms(entities: Vec<EntitySnapshot>) -> CollectionState {
        let unread_total = entities.iter().map(|e| u64::from(e.unread)).sum();
        let first_unread = entities.iter().position(|e| e.unread > 0);
        CollectionState::from_parts("rooms", entities, unread_total, first_unread)
    }

    #[test]
    fn prioritized_block_is_sorted_by_key() {
        let unsorted = rooms(vec![
            EntitySnapshot::new("fav", 1, 0, true),
            EntitySnapshot::new("busy", 9, 3, true),
            EntitySnapshot::new("a", 5, 0, false),
        ]);
        assert!(DisplayOrder.check(&unsorted).is_err());

        let sorted = rooms(vec![
            EntitySnapshot::new("busy", 9, 3, true),
            EntitySnapshot::new("fav", 1, 0, true),
            EntitySnapshot::new("a", 5, 0, false),
            EntitySnapshot::new("b", 5, 0, false),
        ]);
        assert_eq!(DisplayOrder.check(&sorted), Ok(()));
        assert_eq!(FirstUnreadConsistent.check(&sorted), Ok(()));
    }

    #[test]
    fn ties_break_by_ascending_id() {
        let reversed = rooms(vec![
            EntitySnapshot::new("b", 5, 0, false),
            EntitySnapshot::new("a", 5, 0, false),
        ]);
        assert!(DisplayOrder.check(&reversed).is_err());
    }

    #[test]
    fn quiet_room_above_unread_room_is_rejected() {
        let state = rooms(vec![
            EntitySnapshot::new("a", 100, 0, false),
            EntitySnapshot::new("b", 1, 1, true),
        ]);
        let message = DisplayOrder.check(&state).unwrap_err();
        assert!(message.ends_with("at index 0"), "{message}");
    }

    #[test]
    fn mirror_divergence_is_reported() {
        let state = rooms(vec![EntitySnapshot::new("a", 1, 0, false)]);
        assert_eq!(MirrorConsistent.check(&state), Ok(()));

        let mut diverged = state.clone();
        diverged.mirror = Some(vec!["b".into()]);
        assert!(MirrorConsistent.check(&diverged).is_err());

        let mut matching = state;
        matching.mirror = Some(vec!["a".into()]);
        assert_eq!(MirrorConsistent.check(&matching), Ok(()));
    }
}
