//! Change observation.
//!
//! Observers receive the actor's [`CollectionChange`] broadcast. Every
//! observer starts with a `Reset` carrying the contents at subscription time,
//! taken inside the actor so no change can fall between the two. An observer
//! that falls behind the broadcast buffer is resynchronized with a fresh
//! `Reset` instead of replaying what it missed.

use futures::Stream;
use roomsync_core::CollectionChange;
use roomsync_proto::{CollectionKey, Entity};
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, warn};

use crate::actor::Command;

/// Lazy, restartable sequence of changes to one collection.
///
/// Holds only a weak reference to the actor: observing a collection does not
/// keep it alive.
pub struct Observer<E: Entity> {
    key: CollectionKey,
    pending_reset: Option<Vec<E>>,
    changes: broadcast::Receiver<CollectionChange<E>>,
    commands: mpsc::WeakSender<Command<E>>,
}

impl<E: Entity> Observer<E> {
    pub(crate) fn new(
        key: CollectionKey,
        snapshot: Vec<E>,
        changes: broadcast::Receiver<CollectionChange<E>>,
        commands: mpsc::WeakSender<Command<E>>,
    ) -> Self {
        Self { key, pending_reset: Some(snapshot), changes, commands }
    }

    /// Key of the observed collection.
    pub fn key(&self) -> &CollectionKey {
        &self.key
    }

    /// Next change. `None` once the collection has closed.
    pub async fn next(&mut self) -> Option<CollectionChange<E>> {
        if let Some(entities) = self.pending_reset.take() {
            return Some(CollectionChange::Reset { entities });
        }

        match self.changes.recv().await {
            Ok(change) => Some(change),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(key = %self.key, skipped, "observer lagged, resynchronizing");
                self.resubscribe().await
            },
            Err(broadcast::error::RecvError::Closed) => {
                debug!(key = %self.key, "observed collection closed");
                None
            },
        }
    }

    /// Changes as a `futures::Stream`.
    pub fn into_stream(self) -> impl Stream<Item = CollectionChange<E>> + Send {
        futures::stream::unfold(self, |mut observer| async move {
            let change = observer.next().await?;
            Some((change, observer))
        })
    }

    async fn resubscribe(&mut self) -> Option<CollectionChange<E>> {
        let commands = self.commands.upgrade()?;
        let (reply, snapshot) = oneshot::channel();
        commands.send(Command::Observe(reply)).await.ok()?;
        let (entities, changes) = snapshot.await.ok()?;

        self.changes = changes;
        Some(CollectionChange::Reset { entities })
    }
}
