//! Collection keys and feed channel names.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Name of a cached collection (cache key and log label).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CollectionKey(String);

impl CollectionKey {
    /// Arbitrary key.
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// The user's joined rooms.
    pub fn rooms() -> Self {
        Self::new("rooms")
    }

    /// The user's one-to-one conversations.
    pub fn people() -> Self {
        Self::new("people")
    }

    /// Rooms suggested to the user.
    pub fn suggested_rooms() -> Self {
        Self::new("suggested-rooms")
    }

    /// Messages of one room.
    pub fn messages(room_id: &str) -> Self {
        Self(format!("messages:{room_id}"))
    }

    /// Key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CollectionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Feed channel names.
pub mod channel {
    /// Channel carrying room list changes for a user.
    pub fn user_rooms(user_id: &str) -> String {
        format!("/api/v1/user/{user_id}/rooms")
    }

    /// Channel carrying message changes for a room.
    pub fn room_messages(room_id: &str) -> String {
        format!("/api/v1/rooms/{room_id}/chatMessages")
    }
}
