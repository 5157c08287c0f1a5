use duel_types::{GameError, LetterResult, PlayerId, PlayerRoundStatus, RoomEvent};
use std::sync::Arc;
use tracing::{debug, info};

use crate::{
    Clock, EngineResult, Guess, GuessValidator, Room, Round, WordleEvaluator, normalize_guess,
};

/// What a single accepted guess did to its round.
#[derive(Debug, Clone, PartialEq)]
pub struct GuessOutcome {
    pub attempt_number: u32,
    pub letters: Vec<LetterResult>,
    pub status: PlayerRoundStatus,
}

/// Applies one guess to the active round of a room.
pub struct GuessSubmissionService {
    validator: GuessValidator,
    clock: Arc<dyn Clock>,
}

impl GuessSubmissionService {
    pub fn new(validator: GuessValidator, clock: Arc<dyn Clock>) -> Self {
        Self { validator, clock }
    }

    pub fn apply_guess(
        &self,
        room: &Room,
        round: &mut Round,
        player_id: PlayerId,
        raw_guess: &str,
        events: &mut Vec<RoomEvent>,
    ) -> EngineResult<GuessOutcome> {
        let word = normalize_guess(raw_guess);

        match round.status_of(player_id) {
            None => return Err(GameError::PlayerNotInRoom { player_id }.into()),
            Some(status) if status.is_terminal() => {
                return Err(GameError::PlayerAlreadyDone { player_id }.into());
            }
            Some(_) => {}
        }

        // Checked before validation so an over-limit attempt costs no lookups
        let attempt_number = round.attempts_used(player_id) + 1;
        if attempt_number > round.max_attempts {
            return Err(GameError::NoAttemptsLeft {
                max_attempts: round.max_attempts,
            }
            .into());
        }

        self.validator
            .validate(&word, &round.target_word, Some(room.language))?;
        let letters = WordleEvaluator::evaluate(&round.target_word, &word);

        let status = if word == round.target_word {
            PlayerRoundStatus::Won
        } else if attempt_number == round.max_attempts {
            PlayerRoundStatus::Lost
        } else {
            PlayerRoundStatus::Playing
        };

        round.guesses.push(Guess {
            player_id,
            word,
            attempt_number,
            letters: letters.clone(),
            created_at: self.clock.now(),
        });
        debug!(room_id = %room.id, %player_id, attempt = attempt_number, "Guess recorded");

        if status.is_terminal() {
            round.player_status.insert(player_id, status);
            info!(room_id = %room.id, %player_id, round = round.number, ?status, "Player finished round");
            // Scores only move when the round ends, observers still get a refresh
            events.push(RoomEvent::ScoresUpdated {
                scores: room.score_snapshot(),
            });
        }

        Ok(GuessOutcome {
            attempt_number,
            letters,
            status,
        })
    }
}
