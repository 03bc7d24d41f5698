//! Fuzz target for the synchronization engine
//!
//! # Strategy
//!
//! - Arbitrary interleavings of feed events, older pages, refreshes and
//!   local actions over a small pool of rooms
//!
//! # Invariants
//!
//! - Engine contents always equal the sort-from-scratch model
//! - Standard invariants (unique ids, display order, derived unread state)
//!   hold after every operation
//! - Replaying emitted changes reproduces the contents

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use roomsync_core::{SyncConfig, SyncEngine};
use roomsync_harness::{
    CollectionState, InvariantRegistry, ModelCollection, ModelRoomId, Operation, RoomSpec,
    SystemSnapshot, model::room_id,
};
use roomsync_proto::{CollectionKey, Room};

#[derive(Debug, Arbitrary)]
struct Scenario {
    initial: Vec<(ModelRoomId, RoomSpec)>,
    ops: Vec<Operation>,
}

fn to_rooms(entries: &[(ModelRoomId, RoomSpec)]) -> Vec<Room> {
    entries.iter().map(|(room, spec)| spec.to_room(*room)).collect()
}

fuzz_target!(|scenario: Scenario| {
    let registry = InvariantRegistry::standard();
    let mut engine = SyncEngine::new(CollectionKey::rooms(), &SyncConfig::default());
    engine.begin_load();
    let mut mirror = Vec::new();
    for change in engine.apply_fresh(to_rooms(&scenario.initial)) {
        change.apply_to(&mut mirror);
    }
    let mut model = ModelCollection::with_rooms(&scenario.initial);

    for op in scenario.ops.iter().take(256) {
        let changes = match op.to_feed_event() {
            Some(event) => engine.apply(event).unwrap_or_default(),
            None => match op {
                Operation::OlderPage { rooms } => engine.insert_older_page(to_rooms(rooms)),
                Operation::Reconcile { rooms } => engine.reconcile(to_rooms(rooms)),
                Operation::MarkRead { room } => engine.mark_read(&[room_id(*room)]),
                Operation::MarkAllRead => engine.mark_all_read(),
                Operation::RemoveLocal { room } => engine.remove_local(&room_id(*room)),
                _ => Vec::new(),
            },
        };
        model.apply(op);
        for change in changes {
            change.apply_to(&mut mirror);
        }

        let state = CollectionState::from_engine(&engine).with_mirror(&mirror);
        assert_eq!(state.entities, model.ordered(), "diverged after {op:?}");
        registry.assert_all(&SystemSnapshot::single(state), "after fuzzed operation");
    }
});
