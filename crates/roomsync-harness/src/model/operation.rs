//! Operations for model-based testing.
//!
//! Operations represent everything that can happen to a room list: feed
//! events, backward pages, refreshes and local actions. They are generated
//! randomly (by proptest strategies or `arbitrary` in fuzzing) and applied to
//! both the model and the real engine.

use arbitrary::Arbitrary;
use roomsync_proto::{EntityId, FeedEvent, Room, RoomPatch};

/// Room identifier (reduced modulo [`ROOM_POOL`]).
pub type ModelRoomId = u8;

/// Number of distinct rooms operations can touch. Small so that operations
/// collide on the same rooms often.
pub const ROOM_POOL: u8 = 8;

/// Operations that can be applied to a room list.
#[derive(Debug, Clone, Arbitrary)]
pub enum Operation {
    /// Feed: a room was created.
    Create {
        /// Target room.
        room: ModelRoomId,
        /// Room contents.
        spec: RoomSpec,
    },

    /// Feed: a room was replaced with a full copy.
    Update {
        /// Target room.
        room: ModelRoomId,
        /// Room contents.
        spec: RoomSpec,
    },

    /// Feed: some fields of a room changed.
    Patch {
        /// Target room.
        room: ModelRoomId,
        /// New unread count.
        unread: Option<u8>,
        /// New favourite flag.
        favourite: Option<bool>,
        /// New activity.
        activity: Option<u8>,
    },

    /// Feed: a room was deleted.
    Delete {
        /// Target room.
        room: ModelRoomId,
    },

    /// A page of older rooms arrived.
    OlderPage {
        /// Page contents, possibly repeating rooms.
        rooms: Vec<(ModelRoomId, RoomSpec)>,
    },

    /// A refresh fetched this list.
    Reconcile {
        /// Fetched contents, possibly repeating rooms.
        rooms: Vec<(ModelRoomId, RoomSpec)>,
    },

    /// The user read a room.
    MarkRead {
        /// Target room.
        room: ModelRoomId,
    },

    /// The user read everything.
    MarkAllRead,

    /// The user left a room.
    RemoveLocal {
        /// Target room.
        room: ModelRoomId,
    },
}

/// Compact room contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Arbitrary)]
pub struct RoomSpec {
    /// Activity seed (reduced so ties happen).
    pub activity: u8,
    /// Unread seed (reduced so most rooms are read).
    pub unread: u8,
    /// Favourite flag.
    pub favourite: bool,
}

impl RoomSpec {
    /// Last activity this spec expands to.
    pub fn activity_ms(self) -> u64 {
        u64::from(self.activity % 32)
    }

    /// Unread count this spec expands to. Zero three times out of four.
    pub fn unread_items(self) -> u32 {
        u32::from(self.unread % 16).saturating_sub(11)
    }

    /// Expand to a real room.
    pub fn to_room(self, room: ModelRoomId) -> Room {
        Room::new(room_id(room), self.activity_ms())
            .with_unread(self.unread_items())
            .with_favourite(self.favourite)
    }
}

/// Entity id of a model room.
pub fn room_id(room: ModelRoomId) -> EntityId {
    EntityId::new(format!("r{}", room % ROOM_POOL))
}

impl Operation {
    /// The feed event this operation represents, if it is one.
    pub fn to_feed_event(&self) -> Option<FeedEvent<Room>> {
        match *self {
            Self::Create { room, spec } => Some(FeedEvent::Created(spec.to_room(room))),
            Self::Update { room, spec } => Some(FeedEvent::Updated(spec.to_room(room))),
            Self::Patch { room, unread, favourite, activity } => Some(FeedEvent::Patched {
                id: room_id(room),
                patch: RoomPatch {
                    unread_items: unread.map(|n| u32::from(n % 4)),
                    favourite,
                    last_activity_ms: activity.map(|a| u64::from(a % 32)),
                    ..RoomPatch::default()
                },
            }),
            Self::Delete { room } => Some(FeedEvent::Deleted(room_id(room))),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_wrap_into_the_pool() {
        assert_eq!(room_id(3), room_id(3 + ROOM_POOL));
        assert_eq!(room_id(0).as_str(), "r0");
    }

    #[test]
    fn unread_is_mostly_zero() {
        let unread: Vec<u32> = (0..16)
            .map(|seed| RoomSpec { activity: 0, unread: seed, favourite: false }.unread_items())
            .collect();
        assert_eq!(unread.iter().filter(|&&n| n == 0).count(), 12);
        assert_eq!(unread.iter().max(), Some(&4));
    }
}
