//! Deterministic simulation harness for roomsync testing.
//!
//! Scripted implementations of the client's seams ([`SimEnv`],
//! [`ScriptedTransport`], [`ScriptedEventSource`]) so collection actors can be
//! driven end to end on a paused tokio clock, reproducibly.
//!
//! # Model-Based Testing
//!
//! The `model` module provides a reference implementation of the room list.
//! Operations are applied to both the model and the real engine, and their
//! observable states are compared.
//!
//! # Invariant Testing
//!
//! The `invariants` module checks behavioral properties against snapshots of
//! engine state. Use [`InvariantRegistry::standard()`] for the ordering and
//! derived-state invariants every collection must satisfy.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod invariants;
pub mod model;
pub mod sim_env;
pub mod sim_feed;
pub mod sim_transport;

pub use invariants::{
    CollectionState, DisplayOrder, EntitySnapshot, FirstUnreadConsistent, Invariant,
    InvariantRegistry, InvariantResult, MirrorConsistent, SystemSnapshot, UniqueIds,
    UnreadTotalConsistent, Violation,
};
pub use model::{ModelCollection, ModelRoomId, Operation, ROOM_POOL, RoomSpec};
pub use sim_env::SimEnv;
pub use sim_feed::ScriptedEventSource;
pub use sim_transport::ScriptedTransport;
