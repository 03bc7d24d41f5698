//! Every backend honours the same contract.

use roomsync_proto::{CollectionKey, CollectionSnapshot, Message, Room};
use roomsync_storage::{CacheBackend, EntityCache, MemoryBackend, RedbBackend};
use tempfile::TempDir;

fn exercise<B: CacheBackend>(backend: &B) {
    let rooms = CollectionKey::rooms();
    let messages = CollectionKey::messages("r1");

    assert_eq!(backend.load(&rooms).unwrap(), None);

    backend.store(&rooms, b"first").unwrap();
    backend.store(&rooms, b"second").unwrap();
    backend.store(&messages, b"m").unwrap();
    assert_eq!(backend.load(&rooms).unwrap(), Some(b"second".to_vec()));

    let mut keys = backend.keys().unwrap();
    keys.sort();
    assert_eq!(keys, vec![messages.clone(), rooms.clone()]);

    backend.remove(&rooms).unwrap();
    backend.remove(&rooms).unwrap();
    assert_eq!(backend.load(&rooms).unwrap(), None);
    assert_eq!(backend.load(&messages).unwrap(), Some(b"m".to_vec()));
}

#[test]
fn memory_backend_contract() {
    exercise(&MemoryBackend::new());
}

#[test]
fn redb_backend_contract() {
    let dir = TempDir::new().unwrap();
    exercise(&RedbBackend::open(dir.path().join("cache.redb")).unwrap());
}

#[test]
fn redb_snapshot_survives_reopen() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("cache.redb");
    let key = CollectionKey::messages("r1");
    let snapshot = CollectionSnapshot::new(
        key.clone(),
        vec![Message::new("m2", "u1", 20).with_text("hi"), Message::new("m1", "u2", 10)],
        1_700_000_000_000,
    );

    {
        let cache = EntityCache::new(RedbBackend::open(&path).unwrap());
        cache.put(&snapshot).unwrap();
    }

    let cache = EntityCache::new(RedbBackend::open(&path).unwrap());
    assert_eq!(cache.get::<Message>(&key), Some(snapshot));
}

#[test]
fn snapshots_of_different_kinds_do_not_collide() {
    let cache = EntityCache::new(MemoryBackend::new());
    let rooms = CollectionSnapshot::new(CollectionKey::rooms(), vec![Room::new("r1", 1)], 0);
    let messages =
        CollectionSnapshot::new(CollectionKey::messages("r1"), vec![Message::new("m1", "u", 1)], 0);

    cache.put(&rooms).unwrap();
    cache.put(&messages).unwrap();

    assert_eq!(cache.get::<Room>(&CollectionKey::rooms()), Some(rooms));
    assert_eq!(cache.get::<Message>(&CollectionKey::messages("r1")), Some(messages));
}
