//! Reference model for model-based testing.

mod collection;
mod operation;

pub use collection::ModelCollection;
pub use operation::{ModelRoomId, Operation, ROOM_POOL, RoomSpec, room_id};
