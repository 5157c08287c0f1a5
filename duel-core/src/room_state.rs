use chrono::{DateTime, Utc};
use duel_types::{
    GuessView, Language, LetterResult, PlayerId, PlayerRoundState, PlayerRoundStatus,
    PlayerScore, RoomId, RoomSnapshot, RoomStatus, RoundSnapshot, RoundStatus,
};
use std::collections::{BTreeMap, HashMap};

pub const MAX_PLAYERS: usize = 2;

#[derive(Debug, Clone, PartialEq)]
pub struct Room {
    pub id: RoomId,
    pub language: Language,
    pub status: RoomStatus,
    /// Join order; membership is a set
    pub players: Vec<PlayerId>,
    pub scores: HashMap<PlayerId, i32>,
    pub current_round: Option<u32>,
    pub created_at: DateTime<Utc>,
}

impl Room {
    pub fn new(id: RoomId, language: Language, creator: PlayerId, now: DateTime<Utc>) -> Self {
        let mut room = Self {
            id,
            language,
            status: RoomStatus::WaitingForPlayers,
            players: Vec::new(),
            scores: HashMap::new(),
            current_round: None,
            created_at: now,
        };
        room.add_player(creator);
        room
    }

    pub fn is_member(&self, player_id: PlayerId) -> bool {
        self.players.contains(&player_id)
    }

    pub fn is_full(&self) -> bool {
        self.players.len() >= MAX_PLAYERS
    }

    /// Add a player if not already present. An existing score is never reset.
    /// Returns whether the roster changed.
    pub fn add_player(&mut self, player_id: PlayerId) -> bool {
        self.scores.entry(player_id).or_insert(0);
        if self.is_member(player_id) {
            return false;
        }
        self.players.push(player_id);
        true
    }

    pub fn score_of(&self, player_id: PlayerId) -> i32 {
        self.scores.get(&player_id).copied().unwrap_or(0)
    }

    /// Scores in roster order
    pub fn score_snapshot(&self) -> Vec<PlayerScore> {
        self.players
            .iter()
            .map(|&player_id| PlayerScore {
                player_id,
                score: self.score_of(player_id),
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Guess {
    pub player_id: PlayerId,
    pub word: String,
    pub attempt_number: u32,
    pub letters: Vec<LetterResult>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Round {
    pub room_id: RoomId,
    pub number: u32,
    pub target_word: String, // Hidden from clients
    pub max_attempts: u32,
    pub status: RoundStatus,
    pub player_status: BTreeMap<PlayerId, PlayerRoundStatus>,
    pub guesses: Vec<Guess>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl Round {
    pub fn is_finished(&self) -> bool {
        self.status == RoundStatus::Ended
    }

    pub fn status_of(&self, player_id: PlayerId) -> Option<PlayerRoundStatus> {
        self.player_status.get(&player_id).copied()
    }

    pub fn guesses_by(&self, player_id: PlayerId) -> impl Iterator<Item = &Guess> {
        self.guesses.iter().filter(move |g| g.player_id == player_id)
    }

    pub fn attempts_used(&self, player_id: PlayerId) -> u32 {
        self.guesses_by(player_id).count() as u32
    }

    pub fn word_length(&self) -> usize {
        self.target_word.chars().count()
    }
}

/// A room together with all of its rounds and their guesses.
#[derive(Debug, Clone, PartialEq)]
pub struct RoomState {
    pub room: Room,
    pub rounds: Vec<Round>,
}

impl RoomState {
    pub fn new(room: Room) -> Self {
        Self {
            room,
            rounds: Vec::new(),
        }
    }

    pub fn id(&self) -> RoomId {
        self.room.id
    }

    pub fn round(&self, number: u32) -> Option<&Round> {
        self.rounds.iter().find(|r| r.number == number)
    }

    pub fn current_round(&self) -> Option<&Round> {
        self.room.current_round.and_then(|n| self.round(n))
    }

    pub fn current_round_mut(&mut self) -> Option<&mut Round> {
        let number = self.room.current_round?;
        self.rounds.iter_mut().find(|r| r.number == number)
    }

    /// The room and its current round, borrowed together for mutation
    pub fn current_round_parts(&mut self) -> Option<(&mut Room, &mut Round)> {
        let number = self.room.current_round?;
        let round = self.rounds.iter_mut().find(|r| r.number == number)?;
        Some((&mut self.room, round))
    }

    pub fn max_round_number(&self) -> Option<u32> {
        self.rounds.iter().map(|r| r.number).max()
    }

    /// Room state as one requester is allowed to see it.
    pub fn snapshot_for(&self, requester: PlayerId) -> RoomSnapshot {
        RoomSnapshot {
            id: self.room.id,
            language: self.room.language,
            status: self.room.status,
            players: self.room.score_snapshot(),
            current_round: self
                .current_round()
                .map(|round| round_snapshot(&self.room, round, requester)),
            created_at: self.room.created_at.to_rfc3339(),
        }
    }
}

fn round_snapshot(room: &Room, round: &Round, requester: PlayerId) -> RoundSnapshot {
    let requester_done = round
        .status_of(requester)
        .is_some_and(|status| status.is_terminal());
    let reveal = round.is_finished() || requester_done;

    let players = room
        .players
        .iter()
        .filter_map(|&player_id| {
            round.status_of(player_id).map(|status| PlayerRoundState {
                player_id,
                status,
                attempts_used: round.attempts_used(player_id),
            })
        })
        .collect();

    let guesses = round
        .guesses
        .iter()
        .map(|guess| {
            // The opponent's words stay hidden until the requester can see the answer
            let show_word = reveal || guess.player_id == requester;
            GuessView {
                player_id: guess.player_id,
                attempt_number: guess.attempt_number,
                word: show_word.then(|| guess.word.clone()),
                letters: guess.letters.clone(),
                created_at: guess.created_at.to_rfc3339(),
            }
        })
        .collect();

    RoundSnapshot {
        number: round.number,
        word_length: round.word_length() as u32,
        max_attempts: round.max_attempts,
        status: round.status,
        target_word: reveal.then(|| round.target_word.clone()),
        players,
        guesses,
        started_at: round.started_at.to_rfc3339(),
        finished_at: round.finished_at.map(|t| t.to_rfc3339()),
    }
}
