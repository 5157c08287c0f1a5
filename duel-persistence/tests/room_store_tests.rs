use chrono::Utc;
use duel_core::{EngineConfig, RoomEngine, RoomState, RoomStore, StaticDictionary, SystemClock};
use duel_persistence::{connect_to_memory_database, SeaRoomStore};
use duel_types::{Language, PlayerRoundStatus, RoomStatus, RoundStatus};
use migration::{Migrator, MigratorTrait};
use std::sync::Arc;
use uuid::Uuid;

async fn setup_store() -> SeaRoomStore {
    let db = connect_to_memory_database().await.unwrap();
    Migrator::up(&db, None).await.unwrap();
    SeaRoomStore::new(db)
}

fn create_test_engine() -> RoomEngine {
    let dictionary = StaticDictionary::new().with_language(
        Language::English,
        "slate\ntrace\nplane",
        "crane",
    );
    RoomEngine::new(
        Arc::new(dictionary),
        Arc::new(SystemClock),
        &EngineConfig {
            max_attempts: 2,
            ..EngineConfig::default()
        },
    )
}

/// Apply one mutation through a unit of work, like the room service does
async fn mutate<T>(
    store: &SeaRoomStore,
    room_id: Uuid,
    change: impl FnOnce(&mut RoomState) -> T,
) -> T {
    let mut uow = store.begin(room_id, true).await.unwrap();
    let mut state = uow.load().await.unwrap().expect("room exists");
    let result = change(&mut state);
    uow.commit(&state).await.unwrap();
    result
}

#[tokio::test]
async fn test_insert_and_load_new_room() {
    let store = setup_store().await;
    let engine = create_test_engine();
    let alice = Uuid::new_v4();
    let (state, _) = engine.create_room(Uuid::new_v4(), Language::English, alice);

    store.insert_room(&state).await.unwrap();

    let loaded = store.load_room(state.id()).await.unwrap().unwrap();
    assert_eq!(loaded.room.players, vec![alice]);
    assert_eq!(loaded.room.status, RoomStatus::WaitingForPlayers);
    assert_eq!(loaded.room.language, Language::English);
    assert_eq!(loaded.room.score_of(alice), 0);
    assert!(loaded.rounds.is_empty());

    assert!(store.load_room(Uuid::new_v4()).await.unwrap().is_none());
}

#[tokio::test]
async fn test_rounds_and_guesses_round_trip() {
    let store = setup_store().await;
    let engine = create_test_engine();
    let alice = Uuid::new_v4();
    let bob = Uuid::new_v4();
    let (state, _) = engine.create_room(Uuid::new_v4(), Language::English, alice);
    let room_id = state.id();
    store.insert_room(&state).await.unwrap();

    mutate(&store, room_id, |s| engine.join(s, bob).unwrap()).await;
    mutate(&store, room_id, |s| engine.submit_guess(s, alice, "slate").unwrap()).await;
    mutate(&store, room_id, |s| engine.submit_guess(s, bob, "crane").unwrap()).await;
    mutate(&store, room_id, |s| engine.submit_guess(s, alice, "trace").unwrap()).await;

    let loaded = store.load_room(room_id).await.unwrap().unwrap();
    assert_eq!(loaded.room.status, RoomStatus::InProgress);
    assert_eq!(loaded.room.players, vec![alice, bob]);
    assert_eq!(loaded.room.score_of(bob), 1);
    assert_eq!(loaded.room.score_of(alice), 0);

    let round = loaded.round(1).unwrap();
    assert_eq!(round.status, RoundStatus::Ended);
    assert!(round.finished_at.is_some());
    assert_eq!(round.target_word, "CRANE");
    assert_eq!(round.status_of(alice), Some(PlayerRoundStatus::Lost));
    assert_eq!(round.status_of(bob), Some(PlayerRoundStatus::Won));

    let words: Vec<&str> = round.guesses.iter().map(|g| g.word.as_str()).collect();
    assert_eq!(words, vec!["SLATE", "CRANE", "TRACE"]);
    assert_eq!(round.guesses[2].attempt_number, 2);
    assert_eq!(round.guesses[1].letters.len(), 5);

    let direct = store.load_round(room_id, 1).await.unwrap().unwrap();
    assert_eq!(direct.guesses.len(), 3);
    assert_eq!(direct.player_status, round.player_status);
    assert!(store.load_round(room_id, 2).await.unwrap().is_none());
}

#[tokio::test]
async fn test_dropped_unit_of_work_rolls_back() {
    let store = setup_store().await;
    let engine = create_test_engine();
    let (state, _) = engine.create_room(Uuid::new_v4(), Language::English, Uuid::new_v4());
    store.insert_room(&state).await.unwrap();

    {
        let mut uow = store.begin(state.id(), true).await.unwrap();
        let mut working = uow.load().await.unwrap().unwrap();
        engine.close(&mut working);
        // No commit
    }

    let loaded = store.load_room(state.id()).await.unwrap().unwrap();
    assert_eq!(loaded.room.status, RoomStatus::WaitingForPlayers);
}

#[tokio::test]
async fn test_created_at_survives_round_trip() {
    let store = setup_store().await;
    let engine = create_test_engine();
    let before = Utc::now();
    let (state, _) = engine.create_room(Uuid::new_v4(), Language::Italian, Uuid::new_v4());
    store.insert_room(&state).await.unwrap();

    let loaded = store.load_room(state.id()).await.unwrap().unwrap();
    assert_eq!(loaded.room.language, Language::Italian);
    assert!(loaded.room.created_at >= before - chrono::Duration::seconds(1));
}
