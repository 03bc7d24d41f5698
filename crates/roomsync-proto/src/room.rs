//! Room entity and its patch.

use serde::{Deserialize, Serialize};

use crate::entity::{Entity, EntityId, EntityPatch};

/// A chat room as listed in the rooms (or people) collection.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Room {
    /// Room identifier.
    pub id: EntityId,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Room topic.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    /// Avatar URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    /// Unread message count.
    #[serde(default)]
    pub unread_items: u32,
    /// Unread mentions of the current user.
    #[serde(default)]
    pub mentions: u32,
    /// Favourited by the user (sorts with unread rooms).
    #[serde(default)]
    pub favourite: bool,
    /// Direct conversation with a single user.
    #[serde(default)]
    pub one_to_one: bool,
    /// Last activity, Unix milliseconds.
    #[serde(default)]
    pub last_activity_ms: u64,
    /// Server revision.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<u64>,
}

impl Room {
    /// Room with the given id and last activity; every other field default.
    pub fn new(id: impl Into<EntityId>, last_activity_ms: u64) -> Self {
        Self { id: id.into(), last_activity_ms, ..Self::default() }
    }

    /// Set the unread count.
    #[must_use]
    pub fn with_unread(mut self, unread_items: u32) -> Self {
        self.unread_items = unread_items;
        self
    }

    /// Mark as favourite.
    #[must_use]
    pub fn with_favourite(mut self, favourite: bool) -> Self {
        self.favourite = favourite;
        self
    }

    /// Set the display name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the server revision.
    #[must_use]
    pub fn with_version(mut self, version: u64) -> Self {
        self.version = Some(version);
        self
    }

    /// Mark as a one-to-one conversation.
    #[must_use]
    pub fn with_one_to_one(mut self, one_to_one: bool) -> Self {
        self.one_to_one = one_to_one;
        self
    }
}

impl Entity for Room {
    type Patch = RoomPatch;

    const KIND: &'static str = "room";

    fn id(&self) -> &EntityId {
        &self.id
    }

    fn ordering_key(&self) -> u64 {
        self.last_activity_ms
    }

    fn unread_count(&self) -> u32 {
        self.unread_items
    }

    fn is_pinned(&self) -> bool {
        self.favourite
    }

    fn version(&self) -> Option<u64> {
        self.version
    }

    fn mark_read(&mut self) {
        self.unread_items = 0;
        self.mentions = 0;
    }

    fn apply_patch(&mut self, patch: &RoomPatch) {
        if let Some(name) = &patch.name {
            self.name.clone_from(name);
        }
        if let Some(topic) = &patch.topic {
            self.topic = Some(topic.clone());
        }
        if let Some(unread_items) = patch.unread_items {
            self.unread_items = unread_items;
        }
        if let Some(mentions) = patch.mentions {
            self.mentions = mentions;
        }
        if let Some(favourite) = patch.favourite {
            self.favourite = favourite;
        }
        if let Some(last_activity_ms) = patch.last_activity_ms {
            self.last_activity_ms = last_activity_ms;
        }
        if patch.version.is_some() {
            self.version = patch.version;
        }
    }
}

/// Partial room update, as pushed on the user's rooms channel.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RoomPatch {
    /// New display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// New topic.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    /// New unread count.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unread_items: Option<u32>,
    /// New mention count.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mentions: Option<u32>,
    /// New favourite flag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub favourite: Option<bool>,
    /// New last activity, Unix milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_activity_ms: Option<u64>,
    /// Revision after this patch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<u64>,
}

impl RoomPatch {
    /// Patch setting only the unread count.
    pub fn unread(unread_items: u32) -> Self {
        Self { unread_items: Some(unread_items), ..Self::default() }
    }

    /// Patch setting only the topic.
    pub fn topic(topic: impl Into<String>) -> Self {
        Self { topic: Some(topic.into()), ..Self::default() }
    }
}

impl EntityPatch for RoomPatch {
    fn version(&self) -> Option<u64> {
        self.version
    }

    fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ProtocolError;

    #[test]
    fn patch_only_touches_present_fields() {
        let mut room = Room::new("r1", 10).with_name("rust").with_unread(2);
        room.topic = Some("old".into());

        room.apply_patch(&RoomPatch::unread(7));

        assert_eq!(room.unread_items, 7);
        assert_eq!(room.name, "rust");
        assert_eq!(room.topic.as_deref(), Some("old"));
        assert_eq!(room.last_activity_ms, 10);
    }

    #[test]
    fn mark_read_clears_mentions() {
        let mut room = Room::new("r1", 10).with_unread(4);
        room.mentions = 2;
        room.mark_read();
        assert_eq!(room.unread_count(), 0);
        assert_eq!(room.mentions, 0);
    }

    #[test]
    fn favourite_is_pinned_and_prioritized() {
        let room = Room::new("r1", 10).with_favourite(true);
        assert!(room.is_pinned());
        assert!(room.is_prioritized());
        assert!(!Room::new("r2", 10).is_prioritized());
    }

    #[test]
    fn validate_rejects_empty_id() {
        let room = Room::new("", 1);
        assert!(matches!(room.validate(), Err(ProtocolError::MalformedEntity { .. })));
    }

    #[test]
    fn empty_patch() {
        assert!(RoomPatch::default().is_empty());
        assert!(!RoomPatch::topic("x").is_empty());
    }
}
