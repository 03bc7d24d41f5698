//! Scripted network transport.
//!
//! Serves fetches from an in-memory "server" collection kept in display
//! order. Individual responses can be scripted (delayed, replaced, failed)
//! and every fetch can be held at a gate until the test releases it.

#![allow(clippy::disallowed_types, reason = "guards are dropped before every await")]

use std::{
    collections::VecDeque,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use roomsync_client::Transport;
use roomsync_core::{NetworkError, display_order};
use roomsync_proto::{CollectionKey, Entity, EntityId};
use tokio::sync::watch;
use tracing::trace;

type Scripted<E> = (Duration, Result<Vec<E>, NetworkError>);

struct ServerState<E> {
    entities: Vec<E>,
    latest_limit: Option<usize>,
    latency: Duration,
    fetch_script: VecDeque<Scripted<E>>,
    page_failures: VecDeque<NetworkError>,
    fetches: usize,
    page_fetches: usize,
}

/// Transport backed by a scripted in-memory server.
///
/// Clones share state, so a test keeps one clone to steer the server while
/// the loader owns another.
pub struct ScriptedTransport<E> {
    state: Arc<Mutex<ServerState<E>>>,
    gate: Arc<watch::Sender<bool>>,
}

impl<E> Clone for ScriptedTransport<E> {
    fn clone(&self) -> Self {
        Self { state: Arc::clone(&self.state), gate: Arc::clone(&self.gate) }
    }
}

impl<E: Entity> Default for ScriptedTransport<E> {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl<E: Entity> ScriptedTransport<E> {
    /// Server holding `entities`. The gate starts open.
    pub fn new(entities: Vec<E>) -> Self {
        let (gate, _) = watch::channel(true);
        let transport = Self {
            state: Arc::new(Mutex::new(ServerState {
                entities: Vec::new(),
                latest_limit: None,
                latency: Duration::ZERO,
                fetch_script: VecDeque::new(),
                page_failures: VecDeque::new(),
                fetches: 0,
                page_fetches: 0,
            })),
            gate: Arc::new(gate),
        };
        transport.set_server(entities);
        transport
    }

    /// Bulk fetches return only the newest `limit` entities, as a server
    /// returning its first page would.
    #[must_use]
    pub fn with_latest_limit(self, limit: usize) -> Self {
        self.lock().latest_limit = Some(limit);
        self
    }

    /// Delay every unscripted response by `latency`.
    #[must_use]
    pub fn with_latency(self, latency: Duration) -> Self {
        self.lock().latency = latency;
        self
    }

    /// Replace the server contents.
    pub fn set_server(&self, mut entities: Vec<E>) {
        entities.sort_by(display_order);
        self.lock().entities = entities;
    }

    /// Insert or replace one entity on the server.
    pub fn upsert_server(&self, entity: E) {
        let mut state = self.lock();
        state.entities.retain(|existing| existing.id() != entity.id());
        state.entities.push(entity);
        state.entities.sort_by(display_order);
    }

    /// Remove one entity from the server.
    pub fn remove_server(&self, id: &EntityId) {
        self.lock().entities.retain(|existing| existing.id() != id);
    }

    /// Current server contents in display order.
    pub fn server(&self) -> Vec<E> {
        self.lock().entities.clone()
    }

    /// Answer the next bulk fetch with `result` after `delay`, ignoring the
    /// server contents. Scripted responses are consumed in order.
    pub fn script_fetch(&self, delay: Duration, result: Result<Vec<E>, NetworkError>) {
        self.lock().fetch_script.push_back((delay, result));
    }

    /// Fail the next bulk fetch.
    pub fn fail_next_fetch(&self, error: NetworkError) {
        self.script_fetch(Duration::ZERO, Err(error));
    }

    /// Fail the next backward page fetch.
    pub fn fail_next_page(&self, error: NetworkError) {
        self.lock().page_failures.push_back(error);
    }

    /// Hold every fetch until [`Self::release`].
    pub fn hold(&self) {
        self.gate.send_replace(false);
    }

    /// Let held fetches proceed.
    pub fn release(&self) {
        self.gate.send_replace(true);
    }

    /// Bulk fetches served so far.
    pub fn fetch_count(&self) -> usize {
        self.lock().fetches
    }

    /// Backward page fetches served so far.
    pub fn page_fetch_count(&self) -> usize {
        self.lock().page_fetches
    }

    fn lock(&self) -> MutexGuard<'_, ServerState<E>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn pass_gate(&self) {
        let mut gate = self.gate.subscribe();
        // The sender lives in `self`, so the channel cannot close here.
        let _ = gate.wait_for(|open| *open).await;
    }

    fn next_fetch(&self) -> Scripted<E> {
        let mut state = self.lock();
        state.fetches += 1;
        if let Some(scripted) = state.fetch_script.pop_front() {
            return scripted;
        }

        let take = state.latest_limit.unwrap_or(state.entities.len());
        let latest = state.entities.iter().take(take).cloned().collect();
        (state.latency, Ok(latest))
    }

    fn next_page(&self, before: &EntityId, limit: usize) -> (Duration, Result<Vec<E>, NetworkError>) {
        let mut state = self.lock();
        state.page_fetches += 1;
        if let Some(error) = state.page_failures.pop_front() {
            return (state.latency, Err(error));
        }

        let page = match state.entities.iter().position(|entity| entity.id() == before) {
            Some(index) => state.entities.iter().skip(index + 1).take(limit).cloned().collect(),
            None => Vec::new(),
        };
        (state.latency, Ok(page))
    }
}

impl<E: Entity> Transport<E> for ScriptedTransport<E> {
    async fn fetch(&self, key: &CollectionKey) -> Result<Vec<E>, NetworkError> {
        let (delay, result) = self.next_fetch();
        self.pass_gate().await;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        trace!(%key, ok = result.is_ok(), "scripted fetch answered");
        result
    }

    async fn fetch_before(
        &self,
        key: &CollectionKey,
        before: &EntityId,
        limit: usize,
    ) -> Result<Vec<E>, NetworkError> {
        let (delay, result) = self.next_page(before, limit);
        self.pass_gate().await;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        trace!(%key, %before, ok = result.is_ok(), "scripted page answered");
        result
    }
}
