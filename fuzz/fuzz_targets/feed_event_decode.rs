//! Fuzz target for feed event decoding
//!
//! # Strategy
//!
//! - Known kinds with arbitrary CBOR payloads
//! - Unknown kind strings
//! - Payloads claiming to be one entity type decoded as another
//!
//! # Invariants
//!
//! - Decoding NEVER panics
//! - Oversized payloads are rejected
//! - A decoded event re-encodes and decodes to itself

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use roomsync_proto::{Entity, FeedEvent, MAX_EVENT_PAYLOAD_SIZE, Message, RawEvent, Room};

#[derive(Debug, Arbitrary)]
enum KindChoice {
    Create,
    Update,
    Remove,
    Patch,
    Other(String),
}

#[derive(Debug, Arbitrary)]
struct Input {
    kind: KindChoice,
    payload: Vec<u8>,
}

fn check<E: Entity>(raw: &RawEvent) {
    let Ok(event) = FeedEvent::<E>::decode(raw) else { return };
    assert!(raw.payload.len() <= MAX_EVENT_PAYLOAD_SIZE);

    let reencoded = event.encode(raw.channel.clone()).expect("decoded event must re-encode");
    let again = FeedEvent::<E>::decode(&reencoded).expect("re-encoded event must decode");
    assert_eq!(again, event);
}

fuzz_target!(|input: Input| {
    let kind = match input.kind {
        KindChoice::Create => "create".to_owned(),
        KindChoice::Update => "update".to_owned(),
        KindChoice::Remove => "remove".to_owned(),
        KindChoice::Patch => "patch".to_owned(),
        KindChoice::Other(kind) => kind,
    };
    let raw = RawEvent { channel: "/fuzz".to_owned(), kind, payload: input.payload };

    check::<Room>(&raw);
    check::<Message>(&raw);
});
