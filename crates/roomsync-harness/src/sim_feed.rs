//! Scripted real-time event source.
//!
//! Tests push raw or typed events onto a channel; every live subscription to
//! that channel receives them in push order.

#![allow(clippy::disallowed_types, reason = "subscriber list is never locked across await")]

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use roomsync_client::{EventSource, Subscription};
use roomsync_proto::{Entity, FeedEvent, ProtocolError, RawEvent};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, trace};

/// Buffered events per subscription before `push` waits.
const SUBSCRIPTION_CAPACITY: usize = 256;

struct Subscriber {
    channel: String,
    events: mpsc::Sender<RawEvent>,
    cancel_signal: oneshot::Receiver<()>,
    cancelled: bool,
}

/// Event source driven by the test.
#[derive(Clone, Default)]
pub struct ScriptedEventSource {
    subscribers: Arc<Mutex<Vec<Subscriber>>>,
}

impl ScriptedEventSource {
    /// Source with no subscriptions.
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver `event` to every live subscription of its channel. Returns the
    /// number of subscriptions that received it.
    pub async fn push(&self, event: RawEvent) -> usize {
        let targets: Vec<mpsc::Sender<RawEvent>> = self
            .lock()
            .iter()
            .filter(|subscriber| subscriber.channel == event.channel)
            .map(|subscriber| subscriber.events.clone())
            .collect();

        let mut delivered = 0;
        for target in targets {
            if target.send(event.clone()).await.is_ok() {
                delivered += 1;
            }
        }
        trace!(channel = %event.channel, kind = %event.kind, delivered, "scripted event pushed");
        delivered
    }

    /// Encode `event` for `channel` and push it.
    ///
    /// # Errors
    ///
    /// `ProtocolError` if the event cannot be encoded.
    pub async fn publish<E: Entity>(
        &self,
        channel: &str,
        event: &FeedEvent<E>,
    ) -> Result<usize, ProtocolError> {
        let raw = event.encode(channel)?;
        Ok(self.push(raw).await)
    }

    /// Live subscriptions to `channel`.
    pub fn active_subscriptions(&self, channel: &str) -> usize {
        self.lock()
            .iter()
            .filter(|subscriber| subscriber.channel == channel && !subscriber.events.is_closed())
            .count()
    }

    /// Subscriptions to `channel` that were explicitly cancelled.
    pub fn cancellations(&self, channel: &str) -> usize {
        let mut subscribers = self.lock();
        for subscriber in subscribers.iter_mut().filter(|subscriber| !subscriber.cancelled) {
            subscriber.cancelled = subscriber.cancel_signal.try_recv().is_ok();
        }
        subscribers
            .iter()
            .filter(|subscriber| subscriber.channel == channel && subscriber.cancelled)
            .count()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Subscriber>> {
        self.subscribers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl EventSource for ScriptedEventSource {
    fn subscribe(&self, channel: &str) -> Subscription {
        let (events, receiver) = mpsc::channel(SUBSCRIPTION_CAPACITY);
        let (cancel, cancel_signal) = oneshot::channel();
        self.lock().push(Subscriber {
            channel: channel.to_owned(),
            events,
            cancel_signal,
            cancelled: false,
        });
        debug!(%channel, "scripted subscription opened");
        Subscription::new(receiver, cancel)
    }
}

#[cfg(test)]
mod tests {
    use roomsync_proto::Room;

    use super::*;

    #[tokio::test]
    async fn events_reach_only_their_channel() {
        let source = ScriptedEventSource::new();
        let mut rooms = source.subscribe("/rooms");
        let _other = source.subscribe("/other");

        let delivered = source.publish("/rooms", &FeedEvent::Created(Room::new("r1", 1))).await;

        assert_eq!(delivered, Ok(1));
        assert_eq!(rooms.recv().await.map(|raw| raw.channel), Some("/rooms".to_owned()));
    }

    #[tokio::test]
    async fn cancelled_subscriptions_stop_receiving() {
        let source = ScriptedEventSource::new();
        let mut subscription = source.subscribe("/rooms");
        assert_eq!(source.active_subscriptions("/rooms"), 1);

        subscription.cancel();

        assert_eq!(source.active_subscriptions("/rooms"), 0);
        assert_eq!(source.cancellations("/rooms"), 1);
        let delivered = source.publish("/rooms", &FeedEvent::<Room>::Deleted("r1".into())).await;
        assert_eq!(delivered, Ok(0));
    }
}
