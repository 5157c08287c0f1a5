use crate::{PlayerId, RoomId};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;

/// Dictionaries a room can be configured with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, TS)]
#[ts(export)]
pub enum Language {
    #[serde(rename = "EN")]
    English,
    #[serde(rename = "IT")]
    Italian,
}

impl Language {
    pub const ALL: [Language; 2] = [Language::English, Language::Italian];

    /// Parse an ISO-639-1 code, case-insensitively. Blank or unknown codes yield `None`.
    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim().to_ascii_uppercase().as_str() {
            "EN" => Some(Language::English),
            "IT" => Some(Language::Italian),
            _ => None,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Language::English => "EN",
            Language::Italian => "IT",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoomStatus {
    WaitingForPlayers, // One player in, waiting for the opponent
    InProgress,        // Two players, a round has been started
    Closed,            // Terminal, set by the retention job
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoundStatus {
    Playing,
    Ended,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlayerRoundStatus {
    Playing,
    Won,
    Lost,
}

impl PlayerRoundStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, PlayerRoundStatus::Won | PlayerRoundStatus::Lost)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LetterStatus {
    Correct, // Right letter, right position
    Present, // Right letter, wrong position
    Absent,  // Not in the word once duplicates are accounted for
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct LetterResult {
    pub letter: char,
    pub status: LetterStatus,
}

impl LetterResult {
    pub fn new(letter: char, status: LetterStatus) -> Self {
        Self { letter, status }
    }
}

/// Error returned when a stored status string does not name a known variant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} value: {value}")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

macro_rules! string_enum {
    ($ty:ident, $kind:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $ty {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($ty::$variant => $text),+
                }
            }
        }

        impl FromStr for $ty {
            type Err = UnknownVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($ty::$variant),)+
                    other => Err(UnknownVariant {
                        kind: $kind,
                        value: other.to_string(),
                    }),
                }
            }
        }
    };
}

string_enum!(RoomStatus, "room status", {
    WaitingForPlayers => "WAITING_FOR_PLAYERS",
    InProgress => "IN_PROGRESS",
    Closed => "CLOSED",
});

string_enum!(RoundStatus, "round status", {
    Playing => "PLAYING",
    Ended => "ENDED",
});

string_enum!(PlayerRoundStatus, "player round status", {
    Playing => "PLAYING",
    Won => "WON",
    Lost => "LOST",
});

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PlayerScore {
    pub player_id: PlayerId,
    pub score: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PlayerRoundState {
    pub player_id: PlayerId,
    pub status: PlayerRoundStatus,
    pub attempts_used: u32,
}

/// A guess as seen by one requester. `word` is withheld for the opponent's
/// guesses while the round is still open for the requester.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct GuessView {
    pub player_id: PlayerId,
    pub attempt_number: u32,
    pub word: Option<String>,
    pub letters: Vec<LetterResult>,
    pub created_at: String, // ISO 8601 string
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct RoundSnapshot {
    pub number: u32,
    pub word_length: u32,
    pub max_attempts: u32,
    pub status: RoundStatus,
    /// Only present once the round ended or the requester is done with it
    pub target_word: Option<String>,
    pub players: Vec<PlayerRoundState>,
    pub guesses: Vec<GuessView>,
    pub started_at: String,
    pub finished_at: Option<String>,
}

impl RoundSnapshot {
    pub fn is_finished(&self) -> bool {
        self.status == RoundStatus::Ended
    }

    pub fn status_of(&self, player_id: PlayerId) -> Option<PlayerRoundStatus> {
        self.players
            .iter()
            .find(|p| p.player_id == player_id)
            .map(|p| p.status)
    }
}

/// Room state personalized for a single requester
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct RoomSnapshot {
    pub id: RoomId,
    pub language: Language,
    pub status: RoomStatus,
    pub players: Vec<PlayerScore>,
    pub current_round: Option<RoundSnapshot>,
    pub created_at: String, // ISO 8601 string
}

impl RoomSnapshot {
    pub fn score_of(&self, player_id: PlayerId) -> Option<i32> {
        self.players
            .iter()
            .find(|p| p.player_id == player_id)
            .map(|p| p.score)
    }
}
