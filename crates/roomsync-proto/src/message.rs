//! Chat message entity and its patch.

use serde::{Deserialize, Serialize};

use crate::{
    entity::{Entity, EntityId, EntityPatch},
    errors::{ProtocolError, Result},
};

/// Author of a message.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Sender {
    /// User identifier.
    pub id: String,
    /// Login name.
    #[serde(default)]
    pub username: String,
    /// Display name.
    #[serde(default)]
    pub display_name: String,
    /// Avatar URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

/// A message in a room's timeline.
///
/// Messages are never pinned; an unread message counts as one unread item.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Message {
    /// Message identifier.
    pub id: EntityId,
    /// Author.
    pub sender: Sender,
    /// Raw markdown text.
    #[serde(default)]
    pub text: String,
    /// Server-rendered HTML.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub html: Option<String>,
    /// Sent time, Unix milliseconds.
    pub sent_at_ms: u64,
    /// Unread by the current user.
    #[serde(default)]
    pub unread: bool,
    /// Number of users who read the message.
    #[serde(default)]
    pub read_by: u32,
    /// Thread parent, for replies.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<EntityId>,
    /// Number of replies in this message's thread.
    #[serde(default)]
    pub thread_message_count: u32,
    /// Server revision (`v`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<u64>,
}

impl Message {
    /// Message with the given id, sender and sent time.
    pub fn new(id: impl Into<EntityId>, sender_id: impl Into<String>, sent_at_ms: u64) -> Self {
        Self {
            id: id.into(),
            sender: Sender { id: sender_id.into(), ..Sender::default() },
            sent_at_ms,
            ..Self::default()
        }
    }

    /// Set the text.
    #[must_use]
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    /// Set the unread flag.
    #[must_use]
    pub fn with_unread(mut self, unread: bool) -> Self {
        self.unread = unread;
        self
    }

    /// Set the server revision.
    #[must_use]
    pub fn with_version(mut self, version: u64) -> Self {
        self.version = Some(version);
        self
    }

    /// True if this message is a reply inside a thread.
    pub fn is_reply(&self) -> bool {
        self.parent_id.is_some()
    }
}

impl Entity for Message {
    type Patch = MessagePatch;

    const KIND: &'static str = "message";

    fn id(&self) -> &EntityId {
        &self.id
    }

    fn ordering_key(&self) -> u64 {
        self.sent_at_ms
    }

    fn unread_count(&self) -> u32 {
        u32::from(self.unread)
    }

    fn is_pinned(&self) -> bool {
        false
    }

    fn version(&self) -> Option<u64> {
        self.version
    }

    fn mark_read(&mut self) {
        self.unread = false;
    }

    /// History stays chronological; unread messages are located with a scan
    /// instead of being hoisted.
    fn is_prioritized(&self) -> bool {
        false
    }

    fn apply_patch(&mut self, patch: &MessagePatch) {
        if let Some(text) = &patch.text {
            self.text.clone_from(text);
        }
        if let Some(html) = &patch.html {
            self.html = Some(html.clone());
        }
        if let Some(unread) = patch.unread {
            self.unread = unread;
        }
        if let Some(read_by) = patch.read_by {
            self.read_by = read_by;
        }
        if let Some(count) = patch.thread_message_count {
            self.thread_message_count = count;
        }
        if patch.version.is_some() {
            self.version = patch.version;
        }
    }

    fn validate(&self) -> Result<()> {
        if self.id.is_empty() {
            return Err(ProtocolError::malformed(Self::KIND, "empty id"));
        }
        if self.sender.id.is_empty() {
            return Err(ProtocolError::malformed(
                Self::KIND,
                format!("message {} has no sender", self.id),
            ));
        }
        if self.parent_id.as_ref() == Some(&self.id) {
            return Err(ProtocolError::malformed(
                Self::KIND,
                format!("message {} is its own thread parent", self.id),
            ));
        }
        Ok(())
    }
}

/// Partial message update (edits, read receipts, thread counters).
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MessagePatch {
    /// Edited text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Edited HTML.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub html: Option<String>,
    /// New unread flag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unread: Option<bool>,
    /// New read-by count.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_by: Option<u32>,
    /// New thread reply count.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_message_count: Option<u32>,
    /// Revision after this patch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<u64>,
}

impl EntityPatch for MessagePatch {
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

    #[test]
    fn unread_flag_maps_to_count() {
        let msg = Message::new("m1", "u1", 5).with_unread(true);
        assert_eq!(msg.unread_count(), 1);
        assert!(!msg.is_prioritized());
        assert!(!msg.is_pinned());
    }

    #[test]
    fn edit_patch_keeps_unread_flag() {
        let mut msg = Message::new("m1", "u1", 5).with_text("helo").with_unread(true);
        msg.apply_patch(&MessagePatch { text: Some("hello".into()), ..MessagePatch::default() });
        assert_eq!(msg.text, "hello");
        assert!(msg.unread);
    }

    #[test]
    fn validate_requires_sender() {
        let msg = Message::new("m1", "", 5);
        assert!(msg.validate().is_err());
        assert!(Message::new("m1", "u1", 5).validate().is_ok());
    }

    #[test]
    fn validate_rejects_self_parent() {
        let mut msg = Message::new("m1", "u1", 5);
        msg.parent_id = Some(EntityId::from("m1"));
        assert!(msg.validate().is_err());
        msg.parent_id = Some(EntityId::from("m0"));
        assert!(msg.validate().is_ok());
        assert!(msg.is_reply());
    }
}
