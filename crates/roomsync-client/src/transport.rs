//! Network side of a collection.

use std::future::Future;

use roomsync_core::NetworkError;
use roomsync_proto::{CollectionKey, Entity, EntityId};

/// Fetches collections from the server.
///
/// Implementations are shared between the actor and its spawned fetch tasks,
/// so they must be cheap to share (`Send + Sync`, typically an HTTP client
/// handle).
pub trait Transport<E: Entity>: Send + Sync + 'static {
    /// Fetch the current contents of `key`.
    fn fetch(&self, key: &CollectionKey)
    -> impl Future<Output = Result<Vec<E>, NetworkError>> + Send;

    /// Fetch at most `limit` entities older than `before`.
    ///
    /// An empty result means there is no older history.
    fn fetch_before(
        &self,
        key: &CollectionKey,
        before: &EntityId,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<E>, NetworkError>> + Send;
}
