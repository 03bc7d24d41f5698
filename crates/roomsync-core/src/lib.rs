//! Roomsync core
//!
//! Sans-IO synchronization engine for ordered collections of rooms and
//! messages. Reconciles three independent producers (bulk fetch, push events,
//! backward pagination) into one ordered, duplicate-free collection.
//!
//! # Architecture
//!
//! Nothing in this crate performs I/O or spawns tasks. [`SyncEngine`] receives
//! loader results and feed events, mutates its [`OrderedCollection`] and
//! returns the [`CollectionChange`]s it produced for the caller to publish.
//! [`PaginationCursor`] is a separate state machine deciding when an older
//! page may be requested. The async runtime that drives both lives in
//! `roomsync-client`.
//!
//! # Invariants
//!
//! - Uniqueness: no two entities in a collection share an id.
//! - Display order: entities with unread items or a pin precede the rest;
//!   each partition is sorted by ordering key descending (ties by id
//!   ascending).
//!
//! Both are checked with `debug_assert!` after every mutation.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod anchor;
mod change;
pub mod collection;
mod config;
mod engine;
pub mod env;
mod error;
mod filter;
pub mod pagination;

pub use anchor::ScrollAnchor;
pub use change::CollectionChange;
pub use collection::{InvariantViolation, OrderedCollection, display_order};
pub use config::SyncConfig;
pub use engine::{EngineStats, Freshness, LoadState, SyncEngine};
pub use env::Environment;
pub use error::{NetworkError, SyncError};
pub use filter::CollectionFilter;
pub use pagination::{PageRejection, PageRequest, PaginationCursor, PaginationState};
