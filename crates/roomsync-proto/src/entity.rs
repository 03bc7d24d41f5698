//! The generic entity shape shared by rooms and messages.

use std::{borrow::Borrow, fmt};

use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::errors::{ProtocolError, Result};

/// Stable entity identifier, unique within a collection.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    /// Wrap a raw identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True for the empty identifier (never valid on an entity).
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntityId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

impl From<String> for EntityId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl Borrow<str> for EntityId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Partial-field update merged onto an existing entity.
///
/// Every field of an implementing type is optional; absent fields leave the
/// target untouched.
pub trait EntityPatch:
    Clone + fmt::Debug + PartialEq + Send + Sync + Serialize + DeserializeOwned + 'static
{
    /// Server revision carried by the patch, if any.
    fn version(&self) -> Option<u64>;

    /// True if the patch sets no field at all.
    fn is_empty(&self) -> bool;
}

/// An element of an ordered collection.
///
/// The synchronization engine only sees entities through this trait. Ordering
/// is derived from [`Entity::ordering_key`], [`Entity::unread_count`] and
/// [`Entity::is_pinned`]; identity from [`Entity::id`].
///
/// # Invariants
///
/// - `id()` is stable for the lifetime of the entity. Patches never change it.
/// - `mark_read()` leaves `unread_count() == 0`.
pub trait Entity:
    Clone + fmt::Debug + PartialEq + Send + Sync + Serialize + DeserializeOwned + 'static
{
    /// Partial update type for this entity.
    type Patch: EntityPatch;

    /// Short kind name used in logs and errors.
    const KIND: &'static str;

    /// Primary key.
    fn id(&self) -> &EntityId;

    /// Sort key, larger sorts first (most recent activity).
    fn ordering_key(&self) -> u64;

    /// Number of unread items attached to this entity.
    fn unread_count(&self) -> u32;

    /// Favourite / pinned flag.
    fn is_pinned(&self) -> bool;

    /// Server revision, if the server assigns one.
    fn version(&self) -> Option<u64>;

    /// Reset the unread count to zero.
    fn mark_read(&mut self);

    /// Merge the present fields of `patch` onto this entity.
    fn apply_patch(&mut self, patch: &Self::Patch);

    /// Structural validation applied to every entity entering a collection.
    ///
    /// The default rejects an empty id.
    fn validate(&self) -> Result<()> {
        if self.id().is_empty() {
            return Err(ProtocolError::malformed(Self::KIND, "empty id"));
        }
        Ok(())
    }

    /// Entities with unread items or a pin sort ahead of everything else.
    fn is_prioritized(&self) -> bool {
        self.unread_count() > 0 || self.is_pinned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_id_borrows_as_str() {
        let mut ids = std::collections::HashSet::new();
        ids.insert(EntityId::from("r1"));
        assert!(ids.contains("r1"));
        assert!(!ids.contains("r2"));
    }

    #[test]
    fn entity_id_display_is_raw() {
        assert_eq!(EntityId::new("abc").to_string(), "abc");
        assert!(EntityId::default().is_empty());
    }
}
