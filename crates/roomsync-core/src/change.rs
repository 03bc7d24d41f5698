//! Change notifications emitted by the engine.

use roomsync_proto::{Entity, EntityId};

/// One mutation of an ordered collection.
///
/// Indices refer to the collection state immediately before the change (for
/// `from` and `Removed`) or immediately after it (for `to`, `Inserted` and
/// `Updated`). Replaying a change sequence with [`CollectionChange::apply_to`]
/// on a copy of the previous contents reproduces the engine's collection
/// exactly.
#[derive(Debug, Clone, PartialEq)]
pub enum CollectionChange<E: Entity> {
    /// Contents replaced wholesale (load, reload, resubscribe).
    Reset {
        /// Full contents in display order.
        entities: Vec<E>,
    },

    /// New entity at `index`.
    Inserted {
        /// Position after insertion.
        index: usize,
        /// The inserted entity.
        entity: E,
    },

    /// Content changed without affecting sort position.
    Updated {
        /// Position of the entity.
        index: usize,
        /// The new content.
        entity: E,
    },

    /// A sort-relevant field changed. `from` may equal `to`.
    Moved {
        /// Position before the change.
        from: usize,
        /// Position after the change.
        to: usize,
        /// The new content.
        entity: E,
    },

    /// Entity removed from `index`.
    Removed {
        /// Position before removal.
        index: usize,
        /// The removed entity's id.
        id: EntityId,
    },
}

impl<E: Entity> CollectionChange<E> {
    /// Replay this change on a mirror of the collection.
    ///
    /// Out-of-range indices are ignored; a mirror that was kept in sync never
    /// produces them.
    pub fn apply_to(&self, view: &mut Vec<E>) {
        match self {
            Self::Reset { entities } => view.clone_from(entities),
            Self::Inserted { index, entity } => {
                if *index <= view.len() {
                    view.insert(*index, entity.clone());
                }
            },
            Self::Updated { index, entity } => {
                if let Some(slot) = view.get_mut(*index) {
                    *slot = entity.clone();
                }
            },
            Self::Moved { from, to, entity } => {
                if *from < view.len() {
                    view.remove(*from);
                    if *to <= view.len() {
                        view.insert(*to, entity.clone());
                    }
                }
            },
            Self::Removed { index, .. } => {
                if *index < view.len() {
                    view.remove(*index);
                }
            },
        }
    }

    /// Short label for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Reset { .. } => "reset",
            Self::Inserted { .. } => "inserted",
            Self::Updated { .. } => "updated",
            Self::Moved { .. } => "moved",
            Self::Removed { .. } => "removed",
        }
    }
}
