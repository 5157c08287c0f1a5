use anyhow::anyhow;
use duel_types::{GameError, Language, PlayerRoundStatus, RoomEvent, RoundStatus};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use tracing::info;

use crate::{
    Clock, Dictionary, EngineConfig, EngineError, EngineResult, MAX_PLAYERS, RoomState, Round,
};

/// Starts rounds and picks their target words.
pub struct RoundLifecycleManager {
    dictionary: Arc<dyn Dictionary>,
    clock: Arc<dyn Clock>,
    word_length: usize,
    max_attempts: u32,
    rng: Mutex<StdRng>,
}

impl RoundLifecycleManager {
    pub fn new(dictionary: Arc<dyn Dictionary>, clock: Arc<dyn Clock>, config: &EngineConfig) -> Self {
        Self {
            dictionary,
            clock,
            word_length: config.word_length,
            max_attempts: config.max_attempts,
            rng: Mutex::new(StdRng::from_os_rng()),
        }
    }

    /// Deterministic word picks, for tests and replays.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = Mutex::new(StdRng::seed_from_u64(seed));
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Return the round guesses should go to, starting a new one when the
    /// room has none or the current one has ended.
    pub fn ensure_active_round<'a>(
        &self,
        state: &'a mut RoomState,
        events: &mut Vec<RoomEvent>,
    ) -> EngineResult<&'a mut Round> {
        if state.current_round().is_none_or(Round::is_finished) {
            self.start_new_round(state, events)?;
        }

        let room_id = state.id();
        state
            .current_round_mut()
            .ok_or_else(|| EngineError::Storage(anyhow!("room {} has no current round", room_id)))
    }

    /// Open the next round for a room with exactly two players.
    pub fn start_new_round(
        &self,
        state: &mut RoomState,
        events: &mut Vec<RoomEvent>,
    ) -> EngineResult<u32> {
        let room_id = state.id();
        if state.room.players.len() != MAX_PLAYERS {
            return Err(GameError::RoomNotReady { room_id }.into());
        }

        let target_word = self.pick_target_word(state.room.language)?;
        let number = state.max_round_number().map_or(1, |n| n + 1);

        let round = Round {
            room_id,
            number,
            target_word,
            max_attempts: self.max_attempts,
            status: RoundStatus::Playing,
            player_status: state
                .room
                .players
                .iter()
                .map(|&player_id| (player_id, PlayerRoundStatus::Playing))
                .collect(),
            guesses: Vec::new(),
            started_at: self.clock.now(),
            finished_at: None,
        };
        state.rounds.push(round);
        state.room.current_round = Some(number);

        info!(%room_id, round = number, "Round started");
        events.push(RoomEvent::RoundStarted {
            round_number: number,
            max_attempts: self.max_attempts,
        });
        Ok(number)
    }

    /// Uniform pick among the answer words of the configured length.
    fn pick_target_word(&self, language: Language) -> EngineResult<String> {
        let answers = self.dictionary.answer_words(language)?;
        let candidates: Vec<&String> = answers
            .iter()
            .filter(|word| word.chars().count() == self.word_length)
            .collect();

        if candidates.is_empty() {
            return Err(GameError::DictionaryEmpty { language }.into());
        }

        let index = self.rng.lock().random_range(0..candidates.len());
        Ok(candidates[index].clone())
    }
}
