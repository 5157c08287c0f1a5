use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::{Language, PlayerId, RoomId};

/// Expected, typed failures of room operations. Each kind carries a stable
/// code so clients can react to it specifically.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS, thiserror::Error)]
#[ts(export)]
pub enum GameError {
    #[error("room {room_id} not found")]
    RoomNotFound { room_id: RoomId },
    #[error("room {room_id} is full")]
    RoomFull { room_id: RoomId },
    #[error("room {room_id} is closed")]
    RoomClosed { room_id: RoomId },
    #[error("room {room_id} is busy, retry later")]
    RoomBusy { room_id: RoomId },
    #[error("room {room_id} needs two players")]
    RoomNotReady { room_id: RoomId },
    #[error("access to room {room_id} denied")]
    RoomAccessDenied { room_id: RoomId },
    #[error("player {player_id} is not in this room")]
    PlayerNotInRoom { player_id: PlayerId },
    #[error("player {player_id} already finished this round")]
    PlayerAlreadyDone { player_id: PlayerId },
    #[error("guess must be {expected} letters, got {actual}")]
    InvalidGuessLength { expected: u32, actual: u32 },
    #[error("guess may only contain letters A-Z: {guess}")]
    InvalidGuessChars { guess: String },
    #[error("room has no valid language")]
    InvalidLanguage,
    #[error("word not allowed: {word}")]
    WordNotAllowed { word: String },
    #[error("no attempts left (max {max_attempts})")]
    NoAttemptsLeft { max_attempts: u32 },
    #[error("no answer words available for {language}")]
    DictionaryEmpty { language: Language },
}

impl GameError {
    pub fn code(&self) -> &'static str {
        match self {
            GameError::RoomNotFound { .. } => "ROOM_NOT_FOUND",
            GameError::RoomFull { .. } => "ROOM_FULL",
            GameError::RoomClosed { .. } => "ROOM_CLOSED",
            GameError::RoomBusy { .. } => "ROOM_BUSY",
            GameError::RoomNotReady { .. } => "ROOM_NOT_READY",
            GameError::RoomAccessDenied { .. } => "ROOM_ACCESS_DENIED",
            GameError::PlayerNotInRoom { .. } => "PLAYER_NOT_IN_ROOM",
            GameError::PlayerAlreadyDone { .. } => "PLAYER_ALREADY_DONE",
            GameError::InvalidGuessLength { .. } => "INVALID_GUESS_LENGTH",
            GameError::InvalidGuessChars { .. } => "INVALID_GUESS_CHARS",
            GameError::InvalidLanguage => "INVALID_LANGUAGE",
            GameError::WordNotAllowed { .. } => "WORD_NOT_ALLOWED",
            GameError::NoAttemptsLeft { .. } => "NO_ATTEMPTS_LEFT",
            GameError::DictionaryEmpty { .. } => "DICTIONARY_EMPTY",
        }
    }

    /// Only lock contention is worth retrying; everything else is final.
    pub fn is_retryable(&self) -> bool {
        matches!(self, GameError::RoomBusy { .. })
    }
}
