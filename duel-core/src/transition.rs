//! Room state transitions.
//!
//! Every mutating room operation is a function from a working copy of
//! [`RoomState`] plus an input to the events it produces. Nothing here does
//! I/O: on `Err` the caller throws the working copy away, on `Ok` it commits
//! the copy and then publishes the events.

use anyhow::anyhow;
use duel_types::{GameError, Language, PlayerId, RoomEvent, RoomId, RoomStatus};
use std::sync::Arc;
use tracing::info;

use crate::{
    Clock, Dictionary, EngineConfig, EngineError, EngineResult, GuessOutcome,
    GuessSubmissionService, GuessValidator, Room, RoomState, RoundFinisher,
    RoundLifecycleManager,
};

#[derive(Debug, Clone, PartialEq)]
pub struct GuessTransition {
    pub round_number: u32,
    pub outcome: GuessOutcome,
    pub events: Vec<RoomEvent>,
}

pub struct RoomEngine {
    lifecycle: RoundLifecycleManager,
    submission: GuessSubmissionService,
    finisher: RoundFinisher,
    clock: Arc<dyn Clock>,
}

impl RoomEngine {
    pub fn new(dictionary: Arc<dyn Dictionary>, clock: Arc<dyn Clock>, config: &EngineConfig) -> Self {
        let validator = GuessValidator::new(dictionary.clone(), config.word_length);
        Self {
            lifecycle: RoundLifecycleManager::new(dictionary, clock.clone(), config),
            submission: GuessSubmissionService::new(validator, clock.clone()),
            finisher: RoundFinisher::new(clock.clone()),
            clock,
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.lifecycle = self.lifecycle.with_seed(seed);
        self
    }

    pub fn create_room(
        &self,
        room_id: RoomId,
        language: Language,
        creator: PlayerId,
    ) -> (RoomState, Vec<RoomEvent>) {
        let room = Room::new(room_id, language, creator, self.clock.now());
        let event = RoomEvent::RoomCreated {
            player_id: creator,
            players: room.players.clone(),
        };
        info!(%room_id, %language, "Room created");
        (RoomState::new(room), vec![event])
    }

    /// Add a player. Rejoining is accepted and keeps the score.
    pub fn join(&self, state: &mut RoomState, player_id: PlayerId) -> EngineResult<Vec<RoomEvent>> {
        let room_id = state.id();
        if state.room.status == RoomStatus::Closed {
            return Err(GameError::RoomClosed { room_id }.into());
        }
        if !state.room.is_member(player_id) && state.room.is_full() {
            return Err(GameError::RoomFull { room_id }.into());
        }

        if state.room.add_player(player_id) {
            info!(%room_id, %player_id, "Player joined room");
        }
        let mut events = vec![RoomEvent::PlayerJoined {
            player_id,
            players: state.room.players.clone(),
        }];

        if state.room.is_full() {
            if state.room.status == RoomStatus::WaitingForPlayers {
                state.room.status = RoomStatus::InProgress;
                info!(%room_id, "Room in progress");
            }
            if state.rounds.is_empty() {
                self.lifecycle.start_new_round(state, &mut events)?;
            }
        }

        Ok(events)
    }

    pub fn submit_guess(
        &self,
        state: &mut RoomState,
        player_id: PlayerId,
        raw_guess: &str,
    ) -> EngineResult<GuessTransition> {
        ensure_playable(state, player_id)?;

        let mut events = Vec::new();
        self.lifecycle.ensure_active_round(state, &mut events)?;

        let room_id = state.id();
        let (room, round) = state
            .current_round_parts()
            .ok_or_else(|| EngineError::Storage(anyhow!("room {} has no current round", room_id)))?;

        let outcome = self
            .submission
            .apply_guess(room, round, player_id, raw_guess, &mut events)?;

        if self.finisher.is_round_finished(room, round) {
            self.finisher.finish_round(round, room, &mut events);
        }

        Ok(GuessTransition {
            round_number: round.number,
            outcome,
            events,
        })
    }

    /// Advance to the next round if the current one has ended. An unfinished
    /// round is left as it is.
    pub fn start_new_round(
        &self,
        state: &mut RoomState,
        player_id: PlayerId,
    ) -> EngineResult<Vec<RoomEvent>> {
        ensure_playable(state, player_id)?;

        let mut events = Vec::new();
        self.lifecycle.ensure_active_round(state, &mut events)?;
        Ok(events)
    }

    /// Returns whether the status changed.
    pub fn close(&self, state: &mut RoomState) -> bool {
        if state.room.status == RoomStatus::Closed {
            return false;
        }
        state.room.status = RoomStatus::Closed;
        info!(room_id = %state.id(), "Room closed");
        true
    }
}

fn ensure_playable(state: &RoomState, player_id: PlayerId) -> EngineResult<()> {
    let room_id = state.id();
    if state.room.status == RoomStatus::Closed {
        return Err(GameError::RoomClosed { room_id }.into());
    }
    if !state.room.is_member(player_id) {
        return Err(GameError::PlayerNotInRoom { player_id }.into());
    }
    if state.room.status != RoomStatus::InProgress {
        return Err(GameError::RoomNotReady { room_id }.into());
    }
    Ok(())
}
