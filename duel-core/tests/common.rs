#![allow(dead_code)]

use duel_core::{EngineConfig, RoomEngine, RoomState, StaticDictionary, SystemClock};
use duel_types::{Language, PlayerId};
use std::sync::Arc;
use uuid::Uuid;

/// Dictionary with one answer word per language so target words are known
pub fn create_test_dictionary() -> StaticDictionary {
    StaticDictionary::new()
        .with_language(Language::English, "slate\ntrace\nplane\nbrick", "crane")
        .with_language(Language::Italian, "pasta\nmamma", "pizza")
}

pub fn create_test_engine(max_attempts: u32) -> RoomEngine {
    let config = EngineConfig {
        max_attempts,
        ..EngineConfig::default()
    };
    RoomEngine::new(Arc::new(create_test_dictionary()), Arc::new(SystemClock), &config).with_seed(3)
}

/// A room with two players and round 1 started
pub fn create_two_player_room(engine: &RoomEngine) -> (RoomState, PlayerId, PlayerId) {
    let alice = Uuid::new_v4();
    let bob = Uuid::new_v4();
    let (mut state, _) = engine.create_room(Uuid::new_v4(), Language::English, alice);
    engine.join(&mut state, bob).expect("second player joins");
    (state, alice, bob)
}
