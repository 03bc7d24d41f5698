//! Roomsync entity model
//!
//! Data types shared by every layer of the synchronization stack: the generic
//! [`Entity`] shape and its two instantiations ([`Room`], [`Message`]), the
//! closed [`FeedEvent`] variant decoded from push payloads, and the
//! [`CollectionSnapshot`] blob persisted by the cache.
//!
//! # Wire format
//!
//! Feed payloads and cache snapshots are CBOR. CBOR is self-describing, so
//! optional fields added by newer servers decode cleanly on older clients.
//! Nothing in this crate performs I/O.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod codec;
mod entity;
mod errors;
mod event;
mod key;
mod message;
mod room;
mod snapshot;

pub use entity::{Entity, EntityId, EntityPatch};
pub use errors::{ProtocolError, Result};
pub use event::{EventKind, FeedEvent, MAX_EVENT_PAYLOAD_SIZE, RawEvent};
pub use key::{CollectionKey, channel};
pub use message::{Message, MessagePatch, Sender};
pub use room::{Room, RoomPatch};
pub use snapshot::{CollectionSnapshot, SNAPSHOT_FORMAT};
