//! Real-time event feed adapter.
//!
//! An [`EventSource`] hands out raw subscriptions; [`EventFeed`] decodes them
//! into typed [`FeedEvent`]s for one channel. Events are passed through in
//! upstream order with no buffering beyond the subscription channel.

use std::marker::PhantomData;

use roomsync_core::SyncError;
use roomsync_proto::{Entity, FeedEvent, RawEvent};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, trace};

/// Raw subscription to one channel.
///
/// Dropping it, or calling [`Subscription::cancel`], tells the source to stop
/// delivering.
#[derive(Debug)]
pub struct Subscription {
    events: mpsc::Receiver<RawEvent>,
    cancel: Option<oneshot::Sender<()>>,
}

impl Subscription {
    /// Subscription reading `events`; `cancel` fires when the subscriber
    /// goes away.
    pub fn new(events: mpsc::Receiver<RawEvent>, cancel: oneshot::Sender<()>) -> Self {
        Self { events, cancel: Some(cancel) }
    }

    /// Next raw event, `None` once the source closed or the subscription was
    /// cancelled.
    pub async fn recv(&mut self) -> Option<RawEvent> {
        self.events.recv().await
    }

    /// Stop delivery. Idempotent.
    pub fn cancel(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            // The source may already be gone; nothing left to tell it.
            let _ = cancel.send(());
            self.events.close();
        }
    }

    /// True once cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_none()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Upstream of real-time events (a Bayeux/Faye client in production).
pub trait EventSource: Send + Sync + 'static {
    /// Subscribe to `channel`.
    fn subscribe(&self, channel: &str) -> Subscription;
}

/// Typed event stream for one channel.
#[derive(Debug)]
pub struct EventFeed<E> {
    channel: String,
    subscription: Subscription,
    _entity: PhantomData<fn() -> E>,
}

impl<E: Entity> EventFeed<E> {
    /// Subscribe to `channel` on `source`.
    pub fn subscribe(source: &impl EventSource, channel: impl Into<String>) -> Self {
        let channel = channel.into();
        let subscription = source.subscribe(&channel);
        debug!(%channel, kind = E::KIND, "feed subscribed");
        Self { channel, subscription, _entity: PhantomData }
    }

    /// Channel this feed listens on.
    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Next decoded event.
    ///
    /// Returns `None` when the feed has ended. Events addressed to another
    /// channel are skipped.
    ///
    /// # Errors
    ///
    /// `Some(Err(SyncError::MalformedEntity))` for an event that cannot be
    /// decoded. The feed stays usable.
    pub async fn next(&mut self) -> Option<Result<FeedEvent<E>, SyncError>> {
        loop {
            let raw = self.subscription.recv().await?;
            if raw.channel != self.channel {
                debug!(expected = %self.channel, got = %raw.channel, "event for foreign channel dropped");
                continue;
            }

            trace!(channel = %self.channel, kind = %raw.kind, bytes = raw.payload.len(), "feed event");
            return Some(FeedEvent::decode(&raw).map_err(SyncError::from));
        }
    }

    /// Cancel the subscription. Idempotent; dropping the feed also cancels.
    pub fn cancel(&mut self) {
        if !self.subscription.is_cancelled() {
            debug!(channel = %self.channel, "feed cancelled");
        }
        self.subscription.cancel();
    }

    /// True once cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.subscription.is_cancelled()
    }
}
