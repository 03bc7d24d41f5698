//! Cache record format.
//!
//! A [`CollectionSnapshot`] is the unit of persistence: the whole ordered
//! collection for one key, replaced atomically. There is no partial update.

use serde::{Deserialize, Serialize};

use crate::{
    codec::{from_cbor, to_cbor},
    entity::Entity,
    errors::{ProtocolError, Result},
    key::CollectionKey,
};

/// Current snapshot format revision.
pub const SNAPSHOT_FORMAT: u8 = 1;

/// Point-in-time copy of a collection, as stored in the cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionSnapshot<E> {
    /// Format revision, checked on decode.
    pub format: u8,
    /// Key the snapshot was stored under.
    pub key: CollectionKey,
    /// Entities in display order.
    pub entities: Vec<E>,
    /// Wall-clock time of the fetch that produced this snapshot, Unix
    /// milliseconds.
    pub fetched_at_ms: u64,
}

impl<E: Entity> CollectionSnapshot<E> {
    /// Snapshot of `entities` under `key`.
    pub fn new(key: CollectionKey, entities: Vec<E>, fetched_at_ms: u64) -> Self {
        Self { format: SNAPSHOT_FORMAT, key, entities, fetched_at_ms }
    }

    /// Encode to CBOR.
    pub fn encode(&self) -> Result<Vec<u8>> {
        to_cbor(self)
    }

    /// Decode from CBOR.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::CborDecode` for undecodable bytes
    /// - `ProtocolError::UnsupportedFormat` for an unknown format revision
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let snapshot: Self = from_cbor(bytes)?;
        if snapshot.format != SNAPSHOT_FORMAT {
            return Err(ProtocolError::UnsupportedFormat(snapshot.format));
        }
        Ok(snapshot)
    }

    /// Number of entities.
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// True if the snapshot holds no entities.
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Message, Room};

    #[test]
    fn snapshot_roundtrip() {
        let snapshot = CollectionSnapshot::new(
            CollectionKey::rooms(),
            vec![Room::new("r2", 20).with_unread(1), Room::new("r1", 10)],
            1_700_000_000_000,
        );
        let bytes = snapshot.encode().unwrap();
        assert_eq!(CollectionSnapshot::<Room>::decode(&bytes).unwrap(), snapshot);
    }

    #[test]
    fn unknown_format_rejected() {
        let mut snapshot =
            CollectionSnapshot::new(CollectionKey::messages("r1"), vec![Message::new("m1", "u", 1)], 0);
        snapshot.format = 9;
        let bytes = snapshot.encode().unwrap();
        assert_eq!(
            CollectionSnapshot::<Message>::decode(&bytes),
            Err(ProtocolError::UnsupportedFormat(9))
        );
    }

    #[test]
    fn truncated_bytes_fail_to_decode() {
        let snapshot = CollectionSnapshot::new(CollectionKey::rooms(), vec![Room::new("r1", 1)], 0);
        let bytes = snapshot.encode().unwrap();
        let truncated = &bytes[..bytes.len() / 2];
        assert!(matches!(
            CollectionSnapshot::<Room>::decode(truncated),
            Err(ProtocolError::CborDecode(_))
        ));
    }
}
