//! Push feed events.
//!
//! Upstream delivers [`RawEvent`]s: a channel name, a loosely-typed kind string
//! and a CBOR payload. [`FeedEvent::decode`] turns one into the closed,
//! strongly-typed variant the engine consumes.
//!
//! # Invariants
//!
//! Decoding is per-event: a malformed event fails alone and never poisons the
//! events after it.

use serde::{Deserialize, Serialize};

use crate::{
    codec::{from_cbor, to_cbor},
    entity::{Entity, EntityId},
    errors::{ProtocolError, Result},
};

/// Largest payload accepted from the feed (1 MiB).
pub const MAX_EVENT_PAYLOAD_SIZE: usize = 1024 * 1024;

/// Event as delivered by the push transport, before decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEvent {
    /// Channel the event was published on.
    pub channel: String,
    /// Operation kind (`create`, `update`, `remove`, `patch`).
    pub kind: String,
    /// CBOR payload.
    pub payload: Vec<u8>,
}

/// Operation kind of a feed event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// New entity.
    Create,
    /// Full replace of an entity.
    Update,
    /// Entity removed.
    Remove,
    /// Partial update of an entity.
    Patch,
}

impl EventKind {
    /// Wire name of the kind.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Remove => "remove",
            Self::Patch => "patch",
        }
    }

    /// Parse a wire name. `None` for unknown kinds.
    pub fn parse(kind: &str) -> Option<Self> {
        match kind {
            "create" => Some(Self::Create),
            "update" => Some(Self::Update),
            "remove" => Some(Self::Remove),
            "patch" => Some(Self::Patch),
            _ => None,
        }
    }
}

/// Typed feed event scoped to one collection.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedEvent<E: Entity> {
    /// A new entity appeared.
    Created(E),
    /// An entity was replaced wholesale.
    Updated(E),
    /// An entity was removed.
    Deleted(EntityId),
    /// Some fields of an entity changed.
    Patched {
        /// Target entity.
        id: EntityId,
        /// Fields to merge.
        patch: E::Patch,
    },
}

#[derive(Serialize, Deserialize)]
struct RemovePayload {
    id: EntityId,
}

#[derive(Serialize, Deserialize)]
struct PatchPayload<P> {
    id: EntityId,
    fields: P,
}

impl<E: Entity> FeedEvent<E> {
    /// Id of the entity this event targets.
    pub fn id(&self) -> &EntityId {
        match self {
            Self::Created(entity) | Self::Updated(entity) => entity.id(),
            Self::Deleted(id) | Self::Patched { id, .. } => id,
        }
    }

    /// Kind of this event.
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Created(_) => EventKind::Create,
            Self::Updated(_) => EventKind::Update,
            Self::Deleted(_) => EventKind::Remove,
            Self::Patched { .. } => EventKind::Patch,
        }
    }

    /// Decode a raw feed event.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::PayloadTooLarge` if the payload exceeds
    ///   [`MAX_EVENT_PAYLOAD_SIZE`]
    /// - `ProtocolError::UnknownEventKind` for an unrecognized kind
    /// - `ProtocolError::CborDecode` if the payload does not decode
    /// - `ProtocolError::MalformedEntity` if the decoded entity or id is
    ///   structurally invalid
    pub fn decode(raw: &RawEvent) -> Result<Self> {
        if raw.payload.len() > MAX_EVENT_PAYLOAD_SIZE {
            return Err(ProtocolError::PayloadTooLarge {
                size: raw.payload.len(),
                max: MAX_EVENT_PAYLOAD_SIZE,
            });
        }

        let kind = EventKind::parse(&raw.kind)
            .ok_or_else(|| ProtocolError::UnknownEventKind(raw.kind.clone()))?;

        let event = match kind {
            EventKind::Create => Self::Created(decode_entity(&raw.payload)?),
            EventKind::Update => Self::Updated(decode_entity(&raw.payload)?),
            EventKind::Remove => {
                let RemovePayload { id } = from_cbor(&raw.payload)?;
                if id.is_empty() {
                    return Err(ProtocolError::malformed(E::KIND, "remove event with empty id"));
                }
                Self::Deleted(id)
            },
            EventKind::Patch => {
                let PatchPayload { id, fields } = from_cbor::<PatchPayload<E::Patch>>(&raw.payload)?;
                if id.is_empty() {
                    return Err(ProtocolError::malformed(E::KIND, "patch event with empty id"));
                }
                Self::Patched { id, patch: fields }
            },
        };

        Ok(event)
    }

    /// Encode into a raw event on `channel`.
    ///
    /// Used by simulated transports and tests; production clients only decode.
    pub fn encode(&self, channel: impl Into<String>) -> Result<RawEvent> {
        let payload = match self {
            Self::Created(entity) | Self::Updated(entity) => to_cbor(entity)?,
            Self::Deleted(id) => to_cbor(&RemovePayload { id: id.clone() })?,
            Self::Patched { id, patch } => {
                to_cbor(&PatchPayload { id: id.clone(), fields: patch.clone() })?
            },
        };

        Ok(RawEvent { channel: channel.into(), kind: self.kind().as_str().to_owned(), payload })
    }
}

fn decode_entity<E: Entity>(payload: &[u8]) -> Result<E> {
    let entity: E = from_cbor(payload)?;
    entity.validate()?;
    Ok(entity)
}
