//! Model-based property tests.
//!
//! These tests generate random operation sequences and verify that the
//! incremental engine stays equivalent to the sort-from-scratch model.
//!
//! # Architecture
//!
//! ```text
//! proptest generates: Vec<Operation>
//!                          │
//!           ┌──────────────┼──────────────┐
//!           ▼              ▼              ▼
//!    ModelCollection   SyncEngine      Compare
//!      (reference)   (+ change mirror) + invariants
//! ```

use proptest::prelude::*;
use roomsync_core::{CollectionChange, SyncConfig, SyncEngine};
use roomsync_harness::{
    CollectionState, InvariantRegistry, ModelCollection, ModelRoomId, Operation, RoomSpec,
    SystemSnapshot, model::room_id,
};
use roomsync_proto::{CollectionKey, Room};

fn spec_strategy() -> impl Strategy<Value = RoomSpec> {
    (any::<u8>(), any::<u8>(), prop::bool::weighted(0.15))
        .prop_map(|(activity, unread, favourite)| RoomSpec { activity, unread, favourite })
}

fn entries_strategy(max: usize) -> impl Strategy<Value = Vec<(ModelRoomId, RoomSpec)>> {
    prop::collection::vec((any::<ModelRoomId>(), spec_strategy()), 0..max)
}

/// Strategy for generating operations over the shared room pool.
fn operation_strategy() -> impl Strategy<Value = Operation> {
    let room = any::<ModelRoomId>();

    prop_oneof![
        4 => (room.clone(), spec_strategy()).prop_map(|(room, spec)| Operation::Create { room, spec }),
        3 => (room.clone(), spec_strategy()).prop_map(|(room, spec)| Operation::Update { room, spec }),
        4 => (room.clone(), any::<Option<u8>>(), any::<Option<bool>>(), any::<Option<u8>>())
            .prop_map(|(room, unread, favourite, activity)| Operation::Patch {
                room,
                unread,
                favourite,
                activity,
            }),
        2 => room.clone().prop_map(|room| Operation::Delete { room }),
        2 => entries_strategy(6).prop_map(|rooms| Operation::OlderPage { rooms }),
        1 => entries_strategy(8).prop_map(|rooms| Operation::Reconcile { rooms }),
        2 => room.clone().prop_map(|room| Operation::MarkRead { room }),
        1 => Just(Operation::MarkAllRead),
        1 => room.prop_map(|room| Operation::RemoveLocal { room }),
    ]
}

fn to_rooms(entries: &[(ModelRoomId, RoomSpec)]) -> Vec<Room> {
    entries.iter().map(|(room, spec)| spec.to_room(*room)).collect()
}

/// Apply `op` to the real engine the way the client actor would.
fn apply_real(engine: &mut SyncEngine<Room>, op: &Operation) -> Vec<CollectionChange<Room>> {
    if let Some(event) = op.to_feed_event() {
        // Stale deletes and patches are errors the actor only logs.
        return engine.apply(event).unwrap_or_default();
    }

    match op {
        Operation::OlderPage { rooms } => engine.insert_older_page(to_rooms(rooms)),
        Operation::Reconcile { rooms } => engine.reconcile(to_rooms(rooms)),
        Operation::MarkRead { room } => engine.mark_read(&[room_id(*room)]),
        Operation::MarkAllRead => engine.mark_all_read(),
        Operation::RemoveLocal { room } => engine.remove_local(&room_id(*room)),
        _ => Vec::new(),
    }
}

fn loaded(initial: &[(ModelRoomId, RoomSpec)]) -> SyncEngine<Room> {
    let mut engine = SyncEngine::new(CollectionKey::rooms(), &SyncConfig::default());
    engine.begin_load();
    engine.apply_fresh(to_rooms(initial));
    engine
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    /// Property: after every operation the engine holds exactly the model's
    /// rooms in the model's order, with the same unread total
    #[test]
    fn prop_engine_matches_model(
        initial in entries_strategy(8),
        ops in prop::collection::vec(operation_strategy(), 1..60)
    ) {
        let mut engine = loaded(&initial);
        let mut model = ModelCollection::with_rooms(&initial);
        prop_assert_eq!(CollectionState::from_engine(&engine).entities, model.ordered());

        for (step, op) in ops.iter().enumerate() {
            apply_real(&mut engine, op);
            model.apply(op);

            let state = CollectionState::from_engine(&engine);
            prop_assert_eq!(&state.entities, &model.ordered(), "step {}: {:?}", step, op);
            prop_assert_eq!(state.unread_total, model.unread_total());
        }
    }

    /// Property: an observer replaying the change stream never diverges, and
    /// the standard invariants hold after every operation
    #[test]
    fn prop_invariants_hold_with_observer_mirror(
        initial in entries_strategy(8),
        ops in prop::collection::vec(operation_strategy(), 1..60)
    ) {
        let registry = InvariantRegistry::standard();
        let mut engine = loaded(&initial);
        let mut mirror = engine.snapshot();

        for op in &ops {
            for change in apply_real(&mut engine, op) {
                change.apply_to(&mut mirror);
            }

            let state = CollectionState::from_engine(&engine).with_mirror(&mirror);
            let result = registry.check_all(&SystemSnapshot::single(state));
            prop_assert!(result.is_ok(), "{:?} after {:?}", result, op);
        }
    }

    /// Property: an operation that leaves the contents unchanged emits no
    /// changes
    #[test]
    fn prop_no_op_operations_emit_nothing(
        initial in entries_strategy(8),
        ops in prop::collection::vec(operation_strategy(), 1..40)
    ) {
        let mut engine = loaded(&initial);

        for op in &ops {
            let before = engine.snapshot();
            let changes = apply_real(&mut engine, op);
            if engine.snapshot() == before {
                prop_assert!(changes.is_empty(), "{:?} emitted {:?}", op, changes);
            }
        }
    }
}
