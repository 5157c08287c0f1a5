
use duel_core::{
    EngineConfig, EngineError, LockProvider, MemoryRoomStore, RoomStore, room_lock_key,
};
use duel_persistence::{SeaRoomStore, connect_to_memory_database};
use duel_types::{GameError, PlayerRoundStatus, RoomStatus, RoundStatus};
use migration::{Migrator, MigratorTrait};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use test_helpers::*;
use uuid::Uuid;

fn game_error<T: std::fmt::Debug>(result: Result<T, EngineError>) -> GameError {
    match result {
        Err(EngineError::Game(err)) => err,
        other => panic!("expected a game error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_create_room() {
    let setup = TestRoomServerSetup::new();
    let alice = Uuid::new_v4();

    let snapshot = setup.service.create_room("en", alice).await.unwrap();

    assert_eq!(snapshot.status, RoomStatus::WaitingForPlayers);
    assert_eq!(snapshot.players.len(), 1);
    assert_eq!(snapshot.score_of(alice), Some(0));
    assert!(snapshot.current_round.is_none());
    assert_eq!(setup.events.kinds(), vec!["room_created"]);
    assert_eq!(setup.events.rooms(), vec![snapshot.id]);
}

#[tokio::test]
async fn test_create_room_rejects_unknown_language() {
    let setup = TestRoomServerSetup::new();

    let result = setup.service.create_room("xx", Uuid::new_v4()).await;
    assert_eq!(game_error(result), GameError::InvalidLanguage);
    assert_eq!(setup.store.room_count(), 0);
    assert!(setup.events.get_events().is_empty());
}

#[tokio::test]
async fn test_second_player_starts_first_round() {
    let setup = TestRoomServerSetup::new();
    let alice = Uuid::new_v4();
    let bob = Uuid::new_v4();
    let created = setup.service.create_room("EN", alice).await.unwrap();
    setup.events.clear();

    let snapshot = setup.service.join_room(created.id, bob).await.unwrap();

    assert_eq!(snapshot.status, RoomStatus::InProgress);
    let round = snapshot.current_round.as_ref().expect("round started");
    assert_eq!(round.number, 1);
    assert_eq!(round.status, RoundStatus::Playing);
    assert_eq!(round.max_attempts, 6);
    assert!(round.target_word.is_none());
    assert_eq!(setup.events.kinds(), vec!["player_joined", "round_started"]);
}

#[tokio::test]
async fn test_rejoin_keeps_score_and_round() {
    let setup = TestRoomServerSetup::with_max_attempts(1);
    let (room_id, alice, bob) = setup.create_full_room().await;
    setup.service.submit_guess(room_id, alice, "crane").await.unwrap();
    setup.service.submit_guess(room_id, bob, "slate").await.unwrap();
    setup.events.clear();

    let snapshot = setup.service.join_room(room_id, alice).await.unwrap();

    assert_eq!(snapshot.players.len(), 2);
    assert_eq!(snapshot.score_of(alice), Some(1));
    assert_eq!(snapshot.current_round.as_ref().unwrap().number, 1);
    assert_eq!(setup.events.kinds(), vec!["player_joined"]);
}

#[tokio::test]
async fn test_join_errors() {
    let setup = TestRoomServerSetup::new();
    let (room_id, _, _) = setup.create_full_room().await;

    let full = setup.service.join_room(room_id, Uuid::new_v4()).await;
    assert_eq!(game_error(full), GameError::RoomFull { room_id });

    let missing = Uuid::new_v4();
    let not_found = setup.service.join_room(missing, Uuid::new_v4()).await;
    assert_eq!(game_error(not_found), GameError::RoomNotFound { room_id: missing });
}

#[tokio::test]
async fn test_closed_room_rejects_mutations() {
    let setup = TestRoomServerSetup::new();
    let (room_id, alice, _) = setup.create_full_room().await;

    setup.service.close_room(room_id).await.unwrap();
    // Closing twice is harmless
    setup.service.close_room(room_id).await.unwrap();

    let join = setup.service.join_room(room_id, alice).await;
    assert_eq!(game_error(join), GameError::RoomClosed { room_id });
    let guess = setup.service.submit_guess(room_id, alice, "slate").await;
    assert_eq!(game_error(guess), GameError::RoomClosed { room_id });

    assert_eq!(setup.stored(room_id).await.room.status, RoomStatus::Closed);
}

#[tokio::test]
async fn test_get_room_access() {
    let setup = TestRoomServerSetup::new();
    let alice = Uuid::new_v4();
    let created = setup.service.create_room("en", alice).await.unwrap();

    // A waiting room can be peeked at before joining
    let stranger = Uuid::new_v4();
    let peek = setup.service.get_room(created.id, stranger).await.unwrap();
    assert_eq!(peek.status, RoomStatus::WaitingForPlayers);

    setup.service.join_room(created.id, Uuid::new_v4()).await.unwrap();
    let denied = setup.service.get_room(created.id, stranger).await;
    assert_eq!(
        game_error(denied),
        GameError::RoomAccessDenied { room_id: created.id }
    );

    let member = setup.service.get_room(created.id, alice).await.unwrap();
    assert_eq!(member.status, RoomStatus::InProgress);

    let missing = Uuid::new_v4();
    let not_found = setup.service.get_room(missing, alice).await;
    assert_eq!(game_error(not_found), GameError::RoomNotFound { room_id: missing });
}

#[tokio::test]
async fn test_invalid_guess_leaves_state_untouched() {
    let setup = TestRoomServerSetup::new();
    let (room_id, alice, _) = setup.create_full_room().await;
    setup.events.clear();
    let before = setup.stored(room_id).await;

    let short = setup.service.submit_guess(room_id, alice, "cat").await;
    assert_eq!(
        game_error(short),
        GameError::InvalidGuessLength { expected: 5, actual: 3 }
    );
    let unknown = setup.service.submit_guess(room_id, alice, "zzzzz").await;
    assert!(matches!(game_error(unknown), GameError::WordNotAllowed { .. }));

    assert_eq!(setup.stored(room_id).await, before);
    assert!(setup.events.get_events().is_empty());
}

#[tokio::test]
async fn test_guess_by_non_member() {
    let setup = TestRoomServerSetup::new();
    let (room_id, _, _) = setup.create_full_room().await;
    let stranger = Uuid::new_v4();

    let result = setup.service.submit_guess(room_id, stranger, "slate").await;
    assert_eq!(game_error(result), GameError::PlayerNotInRoom { player_id: stranger });
}

#[tokio::test]
async fn test_winner_scores_when_round_ends() {
    let setup = TestRoomServerSetup::new();
    let (room_id, alice, bob) = setup.create_full_room().await;
    setup.events.clear();

    let after_win = setup.service.submit_guess(room_id, alice, "CRANE").await.unwrap();
    let round = after_win.current_round.as_ref().unwrap();
    assert_eq!(round.status_of(alice), Some(PlayerRoundStatus::Won));
    assert_eq!(round.target_word.as_deref(), Some("CRANE"));
    assert_eq!(after_win.score_of(alice), Some(0));
    assert_attempts(&after_win, alice, 1);

    // Bob still plays and does not see the answer or Alice's word
    let bob_view = setup.service.get_room(room_id, bob).await.unwrap();
    let bob_round = bob_view.current_round.as_ref().unwrap();
    assert!(bob_round.target_word.is_none());
    assert!(bob_round.guesses.iter().all(|g| g.word.is_none()));
    assert_eq!(bob_round.guesses[0].letters.len(), 5);

    for word in ["slate", "trace", "plane", "brick", "shout"] {
        setup.service.submit_guess(room_id, bob, word).await.unwrap();
    }
    let last = setup.service.submit_guess(room_id, bob, "lemon").await.unwrap();
    let round = last.current_round.as_ref().unwrap();
    assert_eq!(round.status, RoundStatus::Ended);
    assert_eq!(round.status_of(bob), Some(PlayerRoundStatus::Lost));
    assert_eq!(last.score_of(alice), Some(1));
    assert_eq!(last.score_of(bob), Some(0));
    assert_eq!(setup.events.count("round_finished"), 1);
}

#[tokio::test]
async fn test_player_done_cannot_guess_again() {
    let setup = TestRoomServerSetup::new();
    let (room_id, alice, _) = setup.create_full_room().await;
    setup.service.submit_guess(room_id, alice, "crane").await.unwrap();

    let again = setup.service.submit_guess(room_id, alice, "slate").await;
    assert_eq!(game_error(again), GameError::PlayerAlreadyDone { player_id: alice });
}

#[tokio::test]
async fn test_next_guess_after_round_end_starts_new_round() {
    let setup = TestRoomServerSetup::with_max_attempts(1);
    let (room_id, alice, bob) = setup.create_full_room().await;
    setup.events.clear();

    setup.service.submit_guess(room_id, alice, "slate").await.unwrap();
    let ended = setup.service.submit_guess(room_id, bob, "trace").await.unwrap();
    assert!(ended.current_round.as_ref().unwrap().is_finished());
    assert_eq!(setup.events.count("round_finished"), 1);

    let next = setup.service.submit_guess(room_id, alice, "plane").await.unwrap();
    let round = next.current_round.as_ref().unwrap();
    assert_eq!(round.number, 2);
    assert_eq!(round.status_of(alice), Some(PlayerRoundStatus::Lost));
    assert_attempts(&next, alice, 1);
    assert_attempts(&next, bob, 0);

    assert_eq!(setup.events.count("round_finished"), 1);
    assert_eq!(setup.events.count("round_started"), 1);
    let stored = setup.stored(room_id).await;
    assert_eq!(stored.rounds.len(), 2);
    assert!(stored.round(1).unwrap().is_finished());
}

#[tokio::test]
async fn test_explicit_start_new_round() {
    let setup = TestRoomServerSetup::with_max_attempts(1);
    let (room_id, alice, bob) = setup.create_full_room().await;

    // An unfinished round is kept
    let same = setup.service.start_new_round(room_id, alice).await.unwrap();
    assert_eq!(same.current_round.as_ref().unwrap().number, 1);

    setup.service.submit_guess(room_id, alice, "slate").await.unwrap();
    setup.service.submit_guess(room_id, bob, "slate").await.unwrap();
    setup.events.clear();

    let next = setup.service.start_new_round(room_id, bob).await.unwrap();
    let round = next.current_round.as_ref().unwrap();
    assert_eq!(round.number, 2);
    assert_eq!(round.status, RoundStatus::Playing);
    assert_eq!(setup.events.kinds(), vec!["round_started"]);
}

#[tokio::test]
async fn test_start_round_in_waiting_room() {
    let setup = TestRoomServerSetup::new();
    let alice = Uuid::new_v4();
    let created = setup.service.create_room("en", alice).await.unwrap();

    let result = setup.service.start_new_round(created.id, alice).await;
    assert_eq!(game_error(result), GameError::RoomNotReady { room_id: created.id });
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_guesses_get_dense_attempt_numbers() {
    let setup = TestRoomServerSetup::new();
    let (room_id, alice, bob) = setup.create_full_room().await;

    let mut handles = Vec::new();
    for player in [alice, bob] {
        for word in ["slate", "trace", "plane", "brick"] {
            let service = setup.service.clone();
            handles.push(tokio::spawn(async move {
                service.submit_guess(room_id, player, word).await
            }));
        }
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let stored = setup.stored(room_id).await;
    let round = stored.round(1).unwrap();
    let mut attempts: HashMap<_, Vec<u32>> = HashMap::new();
    for guess in &round.guesses {
        attempts.entry(guess.player_id).or_default().push(guess.attempt_number);
    }
    for player in [alice, bob] {
        let mut numbers = attempts.remove(&player).unwrap();
        numbers.sort_unstable();
        assert_eq!(numbers, vec![1, 2, 3, 4]);
    }
    // Lock entries do not outlive their holders
    assert_eq!(setup.locks.registered_keys(), 0);
}

#[tokio::test]
async fn test_busy_room_is_rejected_without_changes() {
    let setup = TestRoomServerSetup::with_config(EngineConfig {
        lock_timeout: Duration::from_millis(50),
        ..test_config(6)
    });
    let (room_id, alice, _) = setup.create_full_room().await;
    let before = setup.stored(room_id).await;

    let held = setup
        .locks
        .try_acquire(&room_lock_key(room_id), Duration::from_millis(100))
        .await
        .unwrap()
        .expect("lock is free");

    let result = setup.service.submit_guess(room_id, alice, "slate").await;
    let err = game_error(result);
    assert_eq!(err, GameError::RoomBusy { room_id });
    assert!(err.is_retryable());
    assert_eq!(setup.stored(room_id).await, before);

    held.release().await.unwrap();
    setup.service.submit_guess(room_id, alice, "slate").await.unwrap();
}

#[tokio::test]
async fn test_failed_commit_publishes_nothing() {
    let store = Arc::new(FailingCommitStore {
        inner: MemoryRoomStore::new(),
    });
    let events = Arc::new(EventCollector::default());
    let service = create_service(store.clone(), events.clone());
    let alice = Uuid::new_v4();
    let created = service.create_room("en", alice).await.unwrap();
    events.clear();

    let result = service.join_room(created.id, Uuid::new_v4()).await;
    assert!(matches!(result, Err(EngineError::Storage(_))));

    let stored = store.load_room(created.id).await.unwrap().unwrap();
    assert_eq!(stored.room.status, RoomStatus::WaitingForPlayers);
    assert_eq!(stored.room.players, vec![alice]);
    assert!(stored.rounds.is_empty());
    assert!(events.get_events().is_empty());
}

#[tokio::test]
async fn test_sink_failure_does_not_fail_operation() {
    let store = Arc::new(MemoryRoomStore::new());
    let service = create_service(store.clone(), Arc::new(FailingSink));

    let created = service.create_room("en", Uuid::new_v4()).await.unwrap();
    let joined = service.join_room(created.id, Uuid::new_v4()).await.unwrap();

    assert_eq!(joined.status, RoomStatus::InProgress);
    let stored = store.load_room(created.id).await.unwrap().unwrap();
    assert_eq!(stored.rounds.len(), 1);
}

#[tokio::test]
async fn test_full_round_against_sqlite_store() {
    let db = connect_to_memory_database().await.unwrap();
    Migrator::up(&db, None).await.unwrap();
    let store = Arc::new(SeaRoomStore::new(db));
    let events = Arc::new(EventCollector::default());
    let service = create_service(store.clone(), events.clone());
    let alice = Uuid::new_v4();
    let bob = Uuid::new_v4();

    let created = service.create_room("en", alice).await.unwrap();
    service.join_room(created.id, bob).await.unwrap();
    service.submit_guess(created.id, alice, "slate").await.unwrap();
    service.submit_guess(created.id, alice, "crane").await.unwrap();
    service.submit_guess(created.id, bob, "crane").await.unwrap();

    let view = service.get_room(created.id, bob).await.unwrap();
    assert_eq!(view.score_of(alice), Some(1));
    assert_eq!(view.score_of(bob), Some(1));
    let round = view.current_round.as_ref().unwrap();
    assert!(round.is_finished());
    assert_eq!(round.guesses.len(), 3);
    assert!(round.guesses.iter().all(|g| g.word.is_some()));

    let stored_round = store.load_round(created.id, 1).await.unwrap().unwrap();
    assert_eq!(stored_round.attempts_used(alice), 2);
    assert_eq!(events.count("round_finished"), 1);
}

#[tokio::test]
async fn test_exclusive_row_lock_against_sqlite_store() {
    let db = connect_to_memory_database().await.unwrap();
    Migrator::up(&db, None).await.unwrap();
    let config = EngineConfig {
        exclusive_row_lock: true,
        lock_timeout: Duration::from_millis(200),
        ..test_config(2)
    };
    let store = Arc::new(SeaRoomStore::new(db).with_lock_timeout(config.lock_timeout));
    let events = Arc::new(EventCollector::default());
    let service = create_service_with_config(store.clone(), events.clone(), config);
    let alice = Uuid::new_v4();
    let bob = Uuid::new_v4();

    let created = service.create_room("en", alice).await.unwrap();
    service.join_room(created.id, bob).await.unwrap();
    service.submit_guess(created.id, alice, "slate").await.unwrap();
    service.submit_guess(created.id, bob, "crane").await.unwrap();
    let last = service.submit_guess(created.id, alice, "trace").await.unwrap();

    let round = last.current_round.as_ref().unwrap();
    assert!(round.is_finished());
    assert_eq!(last.score_of(bob), Some(1));
    assert_eq!(events.count("round_finished"), 1);

    service.close_room(created.id).await.unwrap();
    let stored = store.load_room(created.id).await.unwrap().unwrap();
    assert_eq!(stored.room.status, RoomStatus::Closed);
}
