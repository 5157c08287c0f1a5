use duel_core::{
    EngineConfig, EngineResult, EventSink, LockProvider, RoomEngine, RoomLockManager, RoomState,
    RoomStore, publish_all,
};
use duel_types::{GameError, Language, PlayerId, RoomEvent, RoomId, RoomSnapshot};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

/// Entry point for every room operation a transport exposes.
///
/// Mutations run under the room lock inside one unit of work: load, apply
/// the transition to a working copy, commit, then publish the events while
/// the lock is still held. A failed transition leaves nothing behind.
pub struct RoomService {
    store: Arc<dyn RoomStore>,
    locks: RoomLockManager,
    engine: RoomEngine,
    events: Arc<dyn EventSink>,
    config: EngineConfig,
}

impl RoomService {
    pub fn new(
        store: Arc<dyn RoomStore>,
        lock_provider: Arc<dyn LockProvider>,
        engine: RoomEngine,
        events: Arc<dyn EventSink>,
        config: EngineConfig,
    ) -> Self {
        Self {
            store,
            locks: RoomLockManager::new(lock_provider),
            engine,
            events,
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Not locked: nobody else can know the new room's id yet.
    pub async fn create_room(&self, language: &str, player_id: PlayerId) -> EngineResult<RoomSnapshot> {
        let language = Language::from_code(language).ok_or(GameError::InvalidLanguage)?;
        let (state, events) = self.engine.create_room(Uuid::new_v4(), language, player_id);

        self.store.insert_room(&state).await?;
        publish_all(self.events.as_ref(), state.id(), events).await;
        Ok(state.snapshot_for(player_id))
    }

    pub async fn join_room(&self, room_id: RoomId, player_id: PlayerId) -> EngineResult<RoomSnapshot> {
        let state = self
            .mutate(room_id, |engine, state| engine.join(state, player_id))
            .await?;
        Ok(state.snapshot_for(player_id))
    }

    pub async fn submit_guess(
        &self,
        room_id: RoomId,
        player_id: PlayerId,
        guess: &str,
    ) -> EngineResult<RoomSnapshot> {
        let state = self
            .mutate(room_id, |engine, state| {
                let transition = engine.submit_guess(state, player_id, guess)?;
                debug!(
                    %room_id,
                    %player_id,
                    round = transition.round_number,
                    attempt = transition.outcome.attempt_number,
                    status = ?transition.outcome.status,
                    "Guess applied"
                );
                Ok(transition.events)
            })
            .await?;
        Ok(state.snapshot_for(player_id))
    }

    /// Explicit round advance. Only moves on once the current round ended.
    pub async fn start_new_round(
        &self,
        room_id: RoomId,
        player_id: PlayerId,
    ) -> EngineResult<RoomSnapshot> {
        let state = self
            .mutate(room_id, |engine, state| engine.start_new_round(state, player_id))
            .await?;
        Ok(state.snapshot_for(player_id))
    }

    /// Used by the retention job. Closing a closed room is a no-op.
    pub async fn close_room(&self, room_id: RoomId) -> EngineResult<()> {
        self.mutate(room_id, |engine, state| {
            engine.close(state);
            Ok(Vec::new())
        })
        .await?;
        Ok(())
    }

    /// Lock-free read. May observe a state a concurrent writer is replacing.
    pub async fn get_room(&self, room_id: RoomId, requester: PlayerId) -> EngineResult<RoomSnapshot> {
        let state = self
            .store
            .load_room(room_id)
            .await?
            .ok_or(GameError::RoomNotFound { room_id })?;

        if !state.room.is_member(requester) && state.room.is_full() {
            return Err(GameError::RoomAccessDenied { room_id }.into());
        }
        Ok(state.snapshot_for(requester))
    }

    async fn mutate<F>(&self, room_id: RoomId, transition: F) -> EngineResult<RoomState>
    where
        F: FnOnce(&RoomEngine, &mut RoomState) -> EngineResult<Vec<RoomEvent>> + Send,
    {
        self.locks
            .with_room_lock(room_id, self.config.lock_timeout, || async move {
                let mut uow = self
                    .store
                    .begin(room_id, self.config.exclusive_row_lock)
                    .await?;
                let mut state = uow
                    .load()
                    .await?
                    .ok_or(GameError::RoomNotFound { room_id })?;

                let events = transition(&self.engine, &mut state)?;
                uow.commit(&state).await?;

                if !events.is_empty() {
                    info!(%room_id, events = events.len(), "Room state committed");
                }
                publish_all(self.events.as_ref(), room_id, events).await;
                Ok(state)
            })
            .await
    }
}
