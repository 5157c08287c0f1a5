use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::{PlayerId, PlayerScore, RoomId};

/// Notifications emitted after a room mutation has been committed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub enum RoomEvent {
    RoomCreated {
        player_id: PlayerId,
        players: Vec<PlayerId>,
    },
    PlayerJoined {
        player_id: PlayerId,
        players: Vec<PlayerId>,
    },
    RoundStarted {
        round_number: u32,
        max_attempts: u32,
    },
    RoundFinished {
        round_number: u32,
    },
    ScoresUpdated {
        scores: Vec<PlayerScore>,
    },
}

impl RoomEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            RoomEvent::RoomCreated { .. } => "room_created",
            RoomEvent::PlayerJoined { .. } => "player_joined",
            RoomEvent::RoundStarted { .. } => "round_started",
            RoomEvent::RoundFinished { .. } => "round_finished",
            RoomEvent::ScoresUpdated { .. } => "scores_updated",
        }
    }
}

/// A room event addressed to the room it belongs to, as handed to transports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct RoomEnvelope {
    pub room_id: RoomId,
    pub event: RoomEvent,
}
