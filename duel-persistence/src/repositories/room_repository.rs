use anyhow::{anyhow, Context};
use async_trait::async_trait;
use duel_core::{
    EngineError, EngineResult, Guess, Room, RoomState, RoomStore, RoomUnitOfWork, Round,
};
use duel_types::{
    GameError, Language, LetterResult, PlayerRoundStatus, RoomId, RoomStatus, RoundStatus,
};
use sea_orm::{
    AccessMode, ActiveValue::Set, ColumnTrait, ConnectionTrait, DatabaseBackend,
    DatabaseConnection, DatabaseTransaction, DbErr, EntityTrait, IsolationLevel, QueryFilter,
    QueryOrder, QuerySelect, TransactionTrait,
};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, warn};

use crate::entities::{guesses, prelude::*, room_players, rooms, round_players, rounds};

/// Room store backed by SeaORM.
#[derive(Clone)]
pub struct SeaRoomStore {
    db: DatabaseConnection,
    lock_timeout: Option<Duration>,
}

impl SeaRoomStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self {
            db,
            lock_timeout: None,
        }
    }

    /// Bound how long an exclusive load waits for the room row before the
    /// unit of work fails with `RoomBusy`.
    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = Some(timeout);
        self
    }

    pub fn connection(&self) -> &DatabaseConnection {
        &self.db
    }
}

#[async_trait]
impl RoomStore for SeaRoomStore {
    async fn load_room(&self, room_id: RoomId) -> EngineResult<Option<RoomState>> {
        let (isolation, access) = snapshot_read_config(self.db.get_database_backend());
        let txn = self
            .db
            .begin_with_config(isolation, access)
            .await
            .map_err(|e| map_db_err(e, room_id))?;
        let state = load_state(&txn, room_id, false).await?;
        txn.commit().await.map_err(|e| map_db_err(e, room_id))?;
        Ok(state)
    }

    async fn load_round(&self, room_id: RoomId, number: u32) -> EngineResult<Option<Round>> {
        let db_err = |e: DbErr| map_db_err(e, room_id);
        let number = number as i32;

        let Some(model) = Rounds::find_by_id((room_id, number))
            .one(&self.db)
            .await
            .map_err(db_err)?
        else {
            return Ok(None);
        };

        let players = RoundPlayers::find()
            .filter(round_players::Column::RoomId.eq(room_id))
            .filter(round_players::Column::RoundNumber.eq(number))
            .all(&self.db)
            .await
            .map_err(db_err)?;
        let guesses = Guesses::find()
            .filter(guesses::Column::RoomId.eq(room_id))
            .filter(guesses::Column::RoundNumber.eq(number))
            .order_by_asc(guesses::Column::Sequence)
            .all(&self.db)
            .await
            .map_err(db_err)?;

        let round = round_from_models(model, &players, &guesses).map_err(EngineError::Storage)?;
        Ok(Some(round))
    }

    async fn insert_room(&self, state: &RoomState) -> EngineResult<()> {
        let room_id = state.id();
        let txn = self.db.begin().await.map_err(|e| map_db_err(e, room_id))?;
        write_state(&txn, None, state).await?;
        txn.commit().await.map_err(|e| map_db_err(e, room_id))
    }

    async fn begin(
        &self,
        room_id: RoomId,
        exclusive: bool,
    ) -> EngineResult<Box<dyn RoomUnitOfWork>> {
        let txn = self.db.begin().await.map_err(|e| map_db_err(e, room_id))?;
        if exclusive {
            if let Some(sql) = lock_timeout_sql(txn.get_database_backend(), self.lock_timeout) {
                txn.execute_unprepared(&sql)
                    .await
                    .map_err(|e| map_db_err(e, room_id))?;
            }
        }
        Ok(Box::new(SeaUnitOfWork {
            room_id,
            exclusive,
            txn,
            loaded: None,
        }))
    }
}

/// Transaction over one room. Rolled back by the transaction's drop unless
/// committed.
struct SeaUnitOfWork {
    room_id: RoomId,
    exclusive: bool,
    txn: DatabaseTransaction,
    /// State as read by `load`, used to write only what changed
    loaded: Option<Option<RoomState>>,
}

#[async_trait]
impl RoomUnitOfWork for SeaUnitOfWork {
    async fn load(&mut self) -> EngineResult<Option<RoomState>> {
        let state = load_state(&self.txn, self.room_id, self.exclusive).await?;
        self.loaded = Some(state.clone());
        Ok(state)
    }

    async fn commit(mut self: Box<Self>, state: &RoomState) -> EngineResult<()> {
        let previous = match self.loaded.take() {
            Some(previous) => previous,
            None => load_state(&self.txn, self.room_id, self.exclusive).await?,
        };

        write_state(&self.txn, previous.as_ref(), state).await?;
        let room_id = self.room_id;
        self.txn.commit().await.map_err(|e| map_db_err(e, room_id))?;
        debug!(%room_id, "Room transaction committed");
        Ok(())
    }
}

/// Storage lock waits surface as `RoomBusy`, everything else as a storage failure.
pub fn map_db_err(err: DbErr, room_id: RoomId) -> EngineError {
    let message = err.to_string();
    if is_lock_wait(&message) {
        warn!(%room_id, "Storage lock wait timed out: {}", message);
        return GameError::RoomBusy { room_id }.into();
    }
    EngineError::Storage(anyhow!(err).context(format!("room {}", room_id)))
}

/// Transaction-scoped lock wait limit. Postgres waits forever by default;
/// SQLite has no row locks and relies on the driver's busy timeout.
fn lock_timeout_sql(backend: DatabaseBackend, timeout: Option<Duration>) -> Option<String> {
    match (backend, timeout) {
        // 0 would mean no limit
        (DatabaseBackend::Postgres, Some(timeout)) => Some(format!(
            "SET LOCAL lock_timeout = '{}ms'",
            timeout.as_millis().max(1)
        )),
        _ => None,
    }
}

/// Several selects make up one room, so a plain read needs a single snapshot.
/// SQLite transactions already read from one snapshot and reject these options.
fn snapshot_read_config(backend: DatabaseBackend) -> (Option<IsolationLevel>, Option<AccessMode>) {
    match backend {
        DatabaseBackend::Sqlite => (None, None),
        _ => (Some(IsolationLevel::RepeatableRead), Some(AccessMode::ReadOnly)),
    }
}

fn mentions_sqlstate(message: &str, code: &str) -> bool {
    message.contains(code) || message.contains(&format!("SQLSTATE({code})"))
}

fn is_lock_wait(message: &str) -> bool {
    mentions_sqlstate(message, "55P03")
        || message.contains("lock_not_available")
        || message.contains("database is locked")
        || message.contains("database table is locked")
        || message.contains("SQLITE_BUSY")
}

async fn load_state<C: ConnectionTrait>(
    conn: &C,
    room_id: RoomId,
    exclusive: bool,
) -> EngineResult<Option<RoomState>> {
    let db_err = |e: DbErr| map_db_err(e, room_id);

    let mut query = Rooms::find_by_id(room_id);
    // SQLite has no row locks; its writer lock is taken on the first write
    if exclusive && conn.get_database_backend() != DatabaseBackend::Sqlite {
        query = query.lock_exclusive();
    }
    let Some(room_model) = query.one(conn).await.map_err(db_err)? else {
        return Ok(None);
    };

    let players = RoomPlayers::find()
        .filter(room_players::Column::RoomId.eq(room_id))
        .order_by_asc(room_players::Column::Position)
        .all(conn)
        .await
        .map_err(db_err)?;
    let round_models = Rounds::find()
        .filter(rounds::Column::RoomId.eq(room_id))
        .order_by_asc(rounds::Column::Number)
        .all(conn)
        .await
        .map_err(db_err)?;
    let round_players = RoundPlayers::find()
        .filter(round_players::Column::RoomId.eq(room_id))
        .all(conn)
        .await
        .map_err(db_err)?;
    let guesses = Guesses::find()
        .filter(guesses::Column::RoomId.eq(room_id))
        .order_by_asc(guesses::Column::RoundNumber)
        .order_by_asc(guesses::Column::Sequence)
        .all(conn)
        .await
        .map_err(db_err)?;

    let room = room_from_models(room_model, players).map_err(EngineError::Storage)?;
    let mut state = RoomState::new(room);
    for model in round_models {
        let number = model.number;
        let players: Vec<_> = round_players
            .iter()
            .filter(|p| p.round_number == number)
            .cloned()
            .collect();
        let round_guesses: Vec<_> = guesses
            .iter()
            .filter(|g| g.round_number == number)
            .cloned()
            .collect();
        state.rounds.push(
            round_from_models(model, &players, &round_guesses).map_err(EngineError::Storage)?,
        );
    }

    Ok(Some(state))
}

/// Write `state`, touching only rows that differ from `previous`.
/// Guesses are append-only, so only new ones are inserted.
async fn write_state<C: ConnectionTrait>(
    conn: &C,
    previous: Option<&RoomState>,
    state: &RoomState,
) -> EngineResult<()> {
    let room_id = state.id();
    let db_err = |e: DbErr| map_db_err(e, room_id);

    let room = room_model(&state.room);
    if previous.is_some() {
        Rooms::update_many()
            .set(room)
            .filter(rooms::Column::Id.eq(room_id))
            .exec(conn)
            .await
            .map_err(db_err)?;
    } else {
        Rooms::insert(room)
            .exec_without_returning(conn)
            .await
            .map_err(db_err)?;
    }

    if previous.is_none_or(|p| p.room.players != state.room.players || p.room.scores != state.room.scores) {
        RoomPlayers::delete_many()
            .filter(room_players::Column::RoomId.eq(room_id))
            .exec(conn)
            .await
            .map_err(db_err)?;
        let players: Vec<_> = state
            .room
            .players
            .iter()
            .enumerate()
            .map(|(position, &player_id)| room_players::ActiveModel {
                room_id: Set(room_id),
                player_id: Set(player_id),
                position: Set(position as i32),
                score: Set(state.room.score_of(player_id)),
            })
            .collect();
        if !players.is_empty() {
            RoomPlayers::insert_many(players)
                .exec_without_returning(conn)
                .await
                .map_err(db_err)?;
        }
    }

    for round in &state.rounds {
        let before = previous.and_then(|p| p.round(round.number));
        if before == Some(round) {
            continue;
        }
        let number = round.number as i32;

        match before {
            None => {
                Rounds::insert(round_model(round))
                    .exec_without_returning(conn)
                    .await
                    .map_err(db_err)?;
            }
            Some(before) if before.status != round.status || before.finished_at != round.finished_at => {
                Rounds::update_many()
                    .set(round_model(round))
                    .filter(rounds::Column::RoomId.eq(room_id))
                    .filter(rounds::Column::Number.eq(number))
                    .exec(conn)
                    .await
                    .map_err(db_err)?;
            }
            Some(_) => {}
        }

        if before.is_none_or(|b| b.player_status != round.player_status) {
            RoundPlayers::delete_many()
                .filter(round_players::Column::RoomId.eq(room_id))
                .filter(round_players::Column::RoundNumber.eq(number))
                .exec(conn)
                .await
                .map_err(db_err)?;
            let players: Vec<_> = round
                .player_status
                .iter()
                .map(|(&player_id, status)| round_players::ActiveModel {
                    room_id: Set(room_id),
                    round_number: Set(number),
                    player_id: Set(player_id),
                    status: Set(status.as_str().to_string()),
                })
                .collect();
            if !players.is_empty() {
                RoundPlayers::insert_many(players)
                    .exec_without_returning(conn)
                    .await
                    .map_err(db_err)?;
            }
        }

        let already_stored = before.map_or(0, |b| b.guesses.len());
        let new_guesses = round
            .guesses
            .iter()
            .enumerate()
            .skip(already_stored)
            .map(|(sequence, guess)| guess_model(room_id, number, sequence, guess))
            .collect::<anyhow::Result<Vec<_>>>()
            .map_err(EngineError::Storage)?;
        if !new_guesses.is_empty() {
            Guesses::insert_many(new_guesses)
                .exec_without_returning(conn)
                .await
                .map_err(db_err)?;
        }
    }

    Ok(())
}

fn room_model(room: &Room) -> rooms::ActiveModel {
    rooms::ActiveModel {
        id: Set(room.id),
        language: Set(room.language.code().to_string()),
        status: Set(room.status.as_str().to_string()),
        current_round: Set(room.current_round.map(|n| n as i32)),
        created_at: Set(room.created_at),
    }
}

fn round_model(round: &Round) -> rounds::ActiveModel {
    rounds::ActiveModel {
        room_id: Set(round.room_id),
        number: Set(round.number as i32),
        target_word: Set(round.target_word.clone()),
        max_attempts: Set(round.max_attempts as i32),
        status: Set(round.status.as_str().to_string()),
        started_at: Set(round.started_at),
        finished_at: Set(round.finished_at),
    }
}

fn guess_model(
    room_id: RoomId,
    round_number: i32,
    sequence: usize,
    guess: &Guess,
) -> anyhow::Result<guesses::ActiveModel> {
    Ok(guesses::ActiveModel {
        room_id: Set(room_id),
        round_number: Set(round_number),
        player_id: Set(guess.player_id),
        attempt_number: Set(guess.attempt_number as i32),
        sequence: Set(sequence as i32),
        word: Set(guess.word.clone()),
        letters: Set(serde_json::to_string(&guess.letters)?),
        created_at: Set(guess.created_at),
    })
}

fn room_from_models(model: rooms::Model, players: Vec<room_players::Model>) -> anyhow::Result<Room> {
    let language = Language::from_code(&model.language)
        .ok_or_else(|| anyhow!("room {} has unknown language {}", model.id, model.language))?;

    Ok(Room {
        id: model.id,
        language,
        status: model.status.parse::<RoomStatus>()?,
        players: players.iter().map(|p| p.player_id).collect(),
        scores: players.iter().map(|p| (p.player_id, p.score)).collect(),
        current_round: model.current_round.map(|n| n as u32),
        created_at: model.created_at,
    })
}

fn round_from_models(
    model: rounds::Model,
    players: &[round_players::Model],
    guesses: &[guesses::Model],
) -> anyhow::Result<Round> {
    let player_status = players
        .iter()
        .map(|p| Ok((p.player_id, p.status.parse::<PlayerRoundStatus>()?)))
        .collect::<anyhow::Result<BTreeMap<_, _>>>()?;

    let guesses = guesses
        .iter()
        .map(|g| {
            let letters: Vec<LetterResult> = serde_json::from_str(&g.letters)
                .with_context(|| format!("bad letters for guess {} of round {}", g.attempt_number, g.round_number))?;
            Ok(Guess {
                player_id: g.player_id,
                word: g.word.clone(),
                attempt_number: g.attempt_number as u32,
                letters,
                created_at: g.created_at,
            })
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    Ok(Round {
        room_id: model.room_id,
        number: model.number as u32,
        target_word: model.target_word,
        max_attempts: model.max_attempts as u32,
        status: model.status.parse::<RoundStatus>()?,
        player_status,
        guesses,
        started_at: model.started_at,
        finished_at: model.finished_at,
    })
}
