//! End-to-end synchronization scenarios.
//!
//! Each test spawns a real collection actor over a scripted transport, a
//! scripted event feed and an in-memory cache, on a paused clock.

use std::time::Duration;

use roomsync_client::{CollectionBuilder, CollectionHandle, CollectionLoader, Observer};
use roomsync_core::{CollectionChange, ScrollAnchor, SyncConfig};
use roomsync_harness::{
    CollectionState, InvariantRegistry, ScriptedEventSource, ScriptedTransport, SimEnv,
    SystemSnapshot,
};
use roomsync_proto::{CollectionKey, Entity, FeedEvent, Message, Room, RoomPatch, channel};
use roomsync_storage::{EntityCache, MemoryBackend};

const USER: &str = "u1";

struct Rig<E: Entity> {
    transport: ScriptedTransport<E>,
    source: ScriptedEventSource,
    cache: EntityCache<MemoryBackend>,
    handle: CollectionHandle<E>,
}

fn spawn<E: Entity>(
    builder: CollectionBuilder<E>,
    transport: ScriptedTransport<E>,
    cache: EntityCache<MemoryBackend>,
) -> Rig<E> {
    let source = ScriptedEventSource::new();
    let loader = CollectionLoader::new(transport.clone(), cache.clone());
    let handle = builder.spawn(loader, &source, SimEnv::with_seed(42)).unwrap();
    Rig { transport, source, cache, handle }
}

fn rooms_rig(server: Vec<Room>) -> Rig<Room> {
    let builder = CollectionBuilder::new(CollectionKey::rooms())
        .with_channel(channel::user_rooms(USER));
    spawn(builder, ScriptedTransport::new(server), EntityCache::new(MemoryBackend::new()))
}

fn ids<E: Entity>(entities: &[E]) -> Vec<String> {
    entities.iter().map(|entity| entity.id().to_string()).collect()
}

async fn assert_invariants<E: Entity>(handle: &CollectionHandle<E>, context: &str) {
    let entities = handle.snapshot().await.unwrap();
    let state = CollectionState::from_entities(
        handle.key().as_str(),
        &entities,
        handle.unread_total().await.unwrap(),
        handle.first_unread_position().await.unwrap(),
    );
    InvariantRegistry::standard().assert_all(&SystemSnapshot::single(state), context);
}

/// Skip the initial `Reset` every observer starts with.
async fn observe_from_now<E: Entity>(handle: &CollectionHandle<E>) -> Observer<E> {
    let mut observer = handle.observe().await.unwrap();
    assert!(matches!(observer.next().await, Some(CollectionChange::Reset { .. })));
    observer
}

#[tokio::test(start_paused = true)]
async fn cold_start_fetches_and_orders_unread_first() {
    let rig = rooms_rig(vec![Room::new("r1", 10), Room::new("r2", 5).with_unread(3)]);
    let mut observer = rig.handle.observe().await.unwrap();

    rig.handle.load_initial().await.unwrap();

    // Empty reset at subscription, then the fresh contents. No cache reset.
    assert_eq!(observer.next().await, Some(CollectionChange::Reset { entities: Vec::new() }));
    match observer.next().await {
        Some(CollectionChange::Reset { entities }) => assert_eq!(ids(&entities), ["r2", "r1"]),
        other => panic!("expected reset, got {other:?}"),
    }
    assert_eq!(rig.transport.fetch_count(), 1);
    assert!(rig.cache.get::<Room>(&CollectionKey::rooms()).is_some());
    assert_invariants(&rig.handle, "after cold start").await;
}

#[tokio::test(start_paused = true)]
async fn warm_start_shows_cache_then_fresh() {
    let cache = EntityCache::new(MemoryBackend::new());
    cache
        .put(&roomsync_proto::CollectionSnapshot::new(
            CollectionKey::rooms(),
            vec![Room::new("stale", 1)],
            0,
        ))
        .unwrap();
    let transport = ScriptedTransport::new(vec![Room::new("fresh", 2)]).with_latency(Duration::from_millis(300));
    let builder = CollectionBuilder::new(CollectionKey::rooms());
    let rig = spawn(builder, transport, cache);
    let mut observer = observe_from_now(&rig.handle).await;

    rig.handle.load_initial().await.unwrap();

    let mut resets = Vec::new();
    for _ in 0..2 {
        if let Some(CollectionChange::Reset { entities }) = observer.next().await {
            resets.push(ids(&entities));
        }
    }
    assert_eq!(resets, [vec!["stale".to_owned()], vec!["fresh".to_owned()]]);
}

#[tokio::test(start_paused = true)]
async fn unread_patch_moves_room_to_front() {
    let rig = rooms_rig(vec![Room::new("r2", 10), Room::new("r1", 5)]);
    rig.handle.load_initial().await.unwrap();
    let mut observer = observe_from_now(&rig.handle).await;

    let patch = FeedEvent::<Room>::Patched { id: "r1".into(), patch: RoomPatch::unread(5) };
    rig.source.publish(&channel::user_rooms(USER), &patch).await.unwrap();

    match observer.next().await {
        Some(CollectionChange::Moved { from, to, entity }) => {
            assert_eq!((from, to), (1, 0));
            assert_eq!(entity.unread_items, 5);
        },
        other => panic!("expected move, got {other:?}"),
    }
    assert_eq!(ids(&rig.handle.snapshot().await.unwrap()), ["r1", "r2"]);
    assert_eq!(rig.handle.unread_total().await.unwrap(), 5);
}

#[tokio::test(start_paused = true)]
async fn delete_of_unknown_room_is_silent() {
    let rig = rooms_rig(vec![Room::new("r1", 10)]);
    rig.handle.load_initial().await.unwrap();
    let mut observer = observe_from_now(&rig.handle).await;
    let channel = channel::user_rooms(USER);

    rig.source.publish(&channel, &FeedEvent::<Room>::Deleted("missing".into())).await.unwrap();
    rig.source.publish(&channel, &FeedEvent::<Room>::Deleted("r1".into())).await.unwrap();

    // The first observable change is the real delete.
    assert!(matches!(observer.next().await, Some(CollectionChange::Removed { index: 0, .. })));
    assert_eq!(rig.handle.stats().await.unwrap().stale_dropped, 1);
}

#[tokio::test(start_paused = true)]
async fn mark_read_moves_room_back_into_activity_order() {
    let rig = rooms_rig(vec![Room::new("r1", 10), Room::new("r2", 5).with_unread(3)]);
    rig.handle.load_initial().await.unwrap();
    assert_eq!(ids(&rig.handle.snapshot().await.unwrap()), ["r2", "r1"]);

    assert_eq!(rig.handle.mark_read(vec!["r2".into()]).await, Ok(1));

    assert_eq!(ids(&rig.handle.snapshot().await.unwrap()), ["r1", "r2"]);
    assert_eq!(rig.handle.first_unread_position().await, Ok(None));
    assert_invariants(&rig.handle, "after mark_read").await;
}

fn history(count: u64) -> Vec<Message> {
    (1..=count).map(|n| Message::new(format!("m{n}"), "u2", n * 1_000).with_text(format!("#{n}"))).collect()
}

#[tokio::test(start_paused = true)]
async fn page_overlapping_a_live_message_keeps_one_copy() {
    let config = SyncConfig::default().with_page_size(3).with_pagination_cooldown(Duration::ZERO);
    let transport = ScriptedTransport::new(history(8)).with_latest_limit(3);
    let rig = spawn(
        CollectionBuilder::messages("room").with_config(config),
        transport,
        EntityCache::new(MemoryBackend::new()),
    );
    rig.handle.load_initial().await.unwrap();
    assert_eq!(ids(&rig.handle.snapshot().await.unwrap()), ["m8", "m7", "m6"]);

    // m5 arrives live before the page that also contains it.
    let live = FeedEvent::Created(Message::new("m5", "u2", 5_000).with_text("#5"));
    rig.source.publish(&channel::room_messages("room"), &live).await.unwrap();
    while rig.handle.snapshot().await.unwrap().len() < 4 {
        tokio::task::yield_now().await;
    }

    // The page before m6 is m5 m4 m3; m5 is already resident.
    assert_eq!(rig.handle.request_older_page().await, Ok(2));

    assert_eq!(
        ids(&rig.handle.snapshot().await.unwrap()),
        ["m8", "m7", "m6", "m5", "m4", "m3"]
    );
    assert_invariants(&rig.handle, "after overlapping page").await;
}

#[tokio::test(start_paused = true)]
async fn messages_anchor_at_first_unread() {
    let mut messages = history(6);
    for message in messages.iter_mut().filter(|m| m.sent_at_ms <= 3_000) {
        message.unread = true;
    }
    let transport = ScriptedTransport::new(messages);
    let rig = spawn(
        CollectionBuilder::messages("room"),
        transport,
        EntityCache::new(MemoryBackend::new()),
    );
    rig.handle.load_initial().await.unwrap();

    // Newest first: m6 m5 m4 m3 m2 m1; history stays chronological.
    assert_eq!(ids(&rig.handle.snapshot().await.unwrap()), ["m6", "m5", "m4", "m3", "m2", "m1"]);
    assert_eq!(rig.handle.first_unread_position().await, Ok(Some(3)));
    assert_eq!(
        rig.handle.initial_anchor().await,
        Ok(ScrollAnchor::FirstUnread { index: 3, prefetch_older: true })
    );
}

#[tokio::test(start_paused = true)]
async fn people_and_rooms_split_one_feed() {
    let server = vec![Room::new("group", 10), Room::new("dm", 20).with_one_to_one(true)];
    let cache = EntityCache::new(MemoryBackend::new());
    let source = ScriptedEventSource::new();
    let env = SimEnv::new();

    let rooms = CollectionBuilder::rooms(USER)
        .spawn(CollectionLoader::new(ScriptedTransport::new(server.clone()), cache.clone()), &source, env.clone())
        .unwrap();
    let people = CollectionBuilder::people(USER)
        .spawn(CollectionLoader::new(ScriptedTransport::new(server), cache), &source, env)
        .unwrap();
    rooms.load_initial().await.unwrap();
    people.load_initial().await.unwrap();

    assert_eq!(ids(&rooms.snapshot().await.unwrap()), ["group"]);
    assert_eq!(ids(&people.snapshot().await.unwrap()), ["dm"]);

    let mut observer = observe_from_now(&people).await;
    let created = FeedEvent::Created(Room::new("dm2", 30).with_one_to_one(true));
    assert_eq!(source.publish(&channel::user_rooms(USER), &created).await, Ok(2));

    assert!(matches!(observer.next().await, Some(CollectionChange::Inserted { index: 0, .. })));
    assert_eq!(ids(&rooms.snapshot().await.unwrap()), ["group"]);
}

#[tokio::test(start_paused = true)]
async fn observable_state_after_a_feed_burst() {
    let rig = rooms_rig(vec![Room::new("r1", 10), Room::new("r2", 20)]);
    rig.handle.load_initial().await.unwrap();
    let channel = channel::user_rooms(USER);

    let patch = FeedEvent::<Room>::Patched { id: "r1".into(), patch: RoomPatch::unread(2) };
    rig.source.publish(&channel, &patch).await.unwrap();
    rig.source.publish(&channel, &FeedEvent::Created(Room::new("r3", 30))).await.unwrap();
    while rig.handle.snapshot().await.unwrap().len() < 3 {
        tokio::task::yield_now().await;
    }

    let entities = rig.handle.snapshot().await.unwrap();
    let state = CollectionState::from_entities(
        rig.handle.key().as_str(),
        &entities,
        rig.handle.unread_total().await.unwrap(),
        rig.handle.first_unread_position().await.unwrap(),
    );

    insta::assert_json_snapshot!(SystemSnapshot::single(state), @r#"
    {
      "collections": [
        {
          "key": "rooms",
          "entities": [
            {
              "id": "r1",
              "ordering_key": 10,
              "unread": 2,
              "prioritized": true
            },
            {
              "id": "r3",
              "ordering_key": 30,
              "unread": 0,
              "prioritized": false
            },
            {
              "id": "r2",
              "ordering_key": 20,
              "unread": 0,
              "prioritized": false
            }
          ],
          "unread_total": 2,
          "first_unread": 0
        }
      ]
    }
    "#);
}
