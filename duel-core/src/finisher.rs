use duel_types::{PlayerRoundStatus, RoomEvent, RoundStatus};
use std::sync::Arc;
use tracing::info;

use crate::{Clock, Room, Round};

/// Ends rounds and hands out points.
pub struct RoundFinisher {
    clock: Arc<dyn Clock>,
}

impl RoundFinisher {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }

    /// True once every player of the room has won or lost this round.
    pub fn is_round_finished(&self, room: &Room, round: &Round) -> bool {
        room.players.iter().all(|&player_id| {
            round
                .status_of(player_id)
                .is_some_and(|status| status.is_terminal())
        })
    }

    /// Close the round and award one point per winner. Returns false and
    /// emits nothing if the round had already ended.
    pub fn finish_round(&self, round: &mut Round, room: &mut Room, events: &mut Vec<RoomEvent>) -> bool {
        if round.is_finished() {
            return false;
        }

        round.status = RoundStatus::Ended;
        round.finished_at = Some(self.clock.now());

        for (&player_id, &status) in &round.player_status {
            if status == PlayerRoundStatus::Won {
                *room.scores.entry(player_id).or_insert(0) += 1;
            }
        }

        info!(room_id = %room.id, round = round.number, "Round finished");
        events.push(RoomEvent::RoundFinished {
            round_number: round.number,
        });
        events.push(RoomEvent::ScoresUpdated {
            scores: room.score_snapshot(),
        });
        true
    }
}
