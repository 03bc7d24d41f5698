//! Roomsync client runtime
//!
//! Drives [`roomsync_core::SyncEngine`] on tokio. Each synchronized collection
//! gets one actor task that owns its engine, pagination cursor, loader and
//! event feed, and serializes every mutation. Applications talk to it through
//! a cloneable [`CollectionHandle`] and watch it through [`Observer`]s.
//!
//! # Components
//!
//! - [`Transport`]: network fetches (bulk and backward pages)
//! - [`EventSource`] / [`EventFeed`]: real-time feed subscription and decoding
//! - [`CollectionLoader`]: cache-then-network loading with write-back
//! - [`CollectionBuilder`]: configures and spawns a collection actor
//! - [`SystemEnv`]: production time source

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod actor;
mod error;
mod feed;
mod handle;
mod loader;
mod observer;
mod system_env;
mod transport;

pub use error::PageError;
pub use feed::{EventFeed, EventSource, Subscription};
pub use handle::{CollectionBuilder, CollectionHandle};
pub use loader::CollectionLoader;
pub use observer::Observer;
pub use system_env::SystemEnv;
pub use transport::Transport;
