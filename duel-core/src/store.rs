use async_trait::async_trait;
use dashmap::DashMap;
use duel_types::RoomId;
use std::sync::Arc;
use tracing::debug;

use crate::{EngineResult, RoomState, Round};

/// Load/save contract for rooms with their rounds and guesses.
#[async_trait]
pub trait RoomStore: Send + Sync {
    async fn load_room(&self, room_id: RoomId) -> EngineResult<Option<RoomState>>;

    async fn load_round(&self, room_id: RoomId, number: u32) -> EngineResult<Option<Round>>;

    async fn insert_room(&self, state: &RoomState) -> EngineResult<()>;

    /// Open a transaction scoped to one room. With `exclusive`, backends that
    /// support it lock the room row on `load` until commit or drop.
    async fn begin(&self, room_id: RoomId, exclusive: bool)
    -> EngineResult<Box<dyn RoomUnitOfWork>>;
}

/// One transaction on one room. Dropping it without `commit` discards it.
#[async_trait]
pub trait RoomUnitOfWork: Send {
    async fn load(&mut self) -> EngineResult<Option<RoomState>>;

    /// Persist `state` as the new full state of the room.
    async fn commit(self: Box<Self>, state: &RoomState) -> EngineResult<()>;
}

/// In-process store. Relies on the room lock for isolation.
#[derive(Debug, Default, Clone)]
pub struct MemoryRoomStore {
    rooms: Arc<DashMap<RoomId, RoomState>>,
}

impl MemoryRoomStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }
}

#[async_trait]
impl RoomStore for MemoryRoomStore {
    async fn load_room(&self, room_id: RoomId) -> EngineResult<Option<RoomState>> {
        Ok(self.rooms.get(&room_id).map(|entry| entry.value().clone()))
    }

    async fn load_round(&self, room_id: RoomId, number: u32) -> EngineResult<Option<Round>> {
        Ok(self
            .rooms
            .get(&room_id)
            .and_then(|entry| entry.round(number).cloned()))
    }

    async fn insert_room(&self, state: &RoomState) -> EngineResult<()> {
        self.rooms.insert(state.id(), state.clone());
        Ok(())
    }

    async fn begin(
        &self,
        room_id: RoomId,
        _exclusive: bool,
    ) -> EngineResult<Box<dyn RoomUnitOfWork>> {
        Ok(Box::new(MemoryUnitOfWork {
            room_id,
            rooms: self.rooms.clone(),
        }))
    }
}

struct MemoryUnitOfWork {
    room_id: RoomId,
    rooms: Arc<DashMap<RoomId, RoomState>>,
}

#[async_trait]
impl RoomUnitOfWork for MemoryUnitOfWork {
    async fn load(&mut self) -> EngineResult<Option<RoomState>> {
        Ok(self.rooms.get(&self.room_id).map(|entry| entry.value().clone()))
    }

    async fn commit(self: Box<Self>, state: &RoomState) -> EngineResult<()> {
        debug!(room_id = %self.room_id, rounds = state.rounds.len(), "Committing room state");
        self.rooms.insert(self.room_id, state.clone());
        Ok(())
    }
}
