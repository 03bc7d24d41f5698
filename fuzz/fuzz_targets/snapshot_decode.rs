//! Fuzz target for cached snapshot decoding
//!
//! Cache files survive app upgrades and disk corruption, so the decoder sees
//! arbitrary bytes.
//!
//! # Invariants
//!
//! - Decoding NEVER panics
//! - A decoded snapshot re-encodes and decodes to itself

#![no_main]

use libfuzzer_sys::fuzz_target;
use roomsync_proto::{CollectionSnapshot, Entity, Message, Room};

fn check<E: Entity>(bytes: &[u8]) {
    let Ok(snapshot) = CollectionSnapshot::<E>::decode(bytes) else { return };
    let encoded = snapshot.encode().expect("decoded snapshot must re-encode");
    let again = CollectionSnapshot::<E>::decode(&encoded).expect("re-encoded snapshot must decode");
    assert_eq!(again.entities, snapshot.entities);
    assert_eq!(again.key, snapshot.key);
}

fuzz_target!(|bytes: &[u8]| {
    check::<Room>(bytes);
    check::<Message>(bytes);
});
