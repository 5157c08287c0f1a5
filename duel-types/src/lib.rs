pub mod game;
pub mod messages;
pub mod errors;

use uuid::Uuid;

pub type RoomId = Uuid;
pub type PlayerId = Uuid;

// Re-export all types
pub use game::*;
pub use messages::*;
pub use errors::*;
