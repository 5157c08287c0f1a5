pub use super::guesses::Entity as Guesses;
pub use super::room_players::Entity as RoomPlayers;
pub use super::rooms::Entity as Rooms;
pub use super::round_players::Entity as RoundPlayers;
pub use super::rounds::Entity as Rounds;
