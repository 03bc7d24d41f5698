//! Reference room list.
//!
//! Keeps rooms in a map and sorts from scratch on every read. Slow and
//! obviously correct; the oracle the incremental engine is compared with.
//! Rooms carry no revisions, so every full copy wins except in older pages,
//! where the resident copy is kept.

use std::collections::{BTreeMap, HashSet};

use roomsync_proto::EntityId;

use super::operation::{ModelRoomId, Operation, RoomSpec, room_id};
use crate::invariants::EntitySnapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ModelRoom {
    activity: u64,
    unread: u32,
    favourite: bool,
}

impl From<RoomSpec> for ModelRoom {
    fn from(spec: RoomSpec) -> Self {
        Self { activity: spec.activity_ms(), unread: spec.unread_items(), favourite: spec.favourite }
    }
}

/// The reference implementation of a room list.
#[derive(Debug, Clone, Default)]
pub struct ModelCollection {
    rooms: BTreeMap<EntityId, ModelRoom>,
}

impl ModelCollection {
    /// Empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// List holding `rooms`; later repeats replace earlier ones.
    pub fn with_rooms(rooms: &[(ModelRoomId, RoomSpec)]) -> Self {
        let mut model = Self::new();
        model.replace_all(rooms);
        model
    }

    /// Apply one operation.
    pub fn apply(&mut self, op: &Operation) {
        match op {
            Operation::Create { room, spec } | Operation::Update { room, spec } => {
                self.rooms.insert(room_id(*room), ModelRoom::from(*spec));
            },
            Operation::Patch { room, unread, favourite, activity } => {
                if let Some(existing) = self.rooms.get_mut(&room_id(*room)) {
                    if let Some(unread) = unread {
                        existing.unread = u32::from(unread % 4);
                    }
                    if let Some(favourite) = favourite {
                        existing.favourite = *favourite;
                    }
                    if let Some(activity) = activity {
                        existing.activity = u64::from(activity % 32);
                    }
                }
            },
            Operation::Delete { room } | Operation::RemoveLocal { room } => {
                self.rooms.remove(&room_id(*room));
            },
            Operation::OlderPage { rooms } => {
                let mut seen = HashSet::new();
                for (room, spec) in rooms {
                    let id = room_id(*room);
                    if seen.insert(id.clone()) {
                        self.rooms.entry(id).or_insert_with(|| ModelRoom::from(*spec));
                    }
                }
            },
            Operation::Reconcile { rooms } => self.replace_all(rooms),
            Operation::MarkRead { room } => {
                if let Some(existing) = self.rooms.get_mut(&room_id(*room)) {
                    existing.unread = 0;
                }
            },
            Operation::MarkAllRead => {
                for existing in self.rooms.values_mut() {
                    existing.unread = 0;
                }
            },
        }
    }

    /// Contents in display order.
    pub fn ordered(&self) -> Vec<EntitySnapshot> {
        let mut rooms: Vec<EntitySnapshot> = self
            .rooms
            .iter()
            .map(|(id, room)| {
                EntitySnapshot::new(
                    id.as_str(),
                    room.activity,
                    room.unread,
                    room.unread > 0 || room.favourite,
                )
            })
            .collect();

        rooms.sort_by(|a, b| {
            b.prioritized
                .cmp(&a.prioritized)
                .then_with(|| b.ordering_key.cmp(&a.ordering_key))
                .then_with(|| a.id.cmp(&b.id))
        });
        rooms
    }

    /// Sum of unread counts.
    pub fn unread_total(&self) -> u64 {
        self.rooms.values().map(|room| u64::from(room.unread)).sum()
    }

    /// Number of rooms.
    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    /// True if there are no rooms.
    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }

    fn replace_all(&mut self, rooms: &[(ModelRoomId, RoomSpec)]) {
        self.rooms = rooms.iter().map(|(room, spec)| (room_id(*room), ModelRoom::from(*spec))).collect();
    }
}
