pub mod prelude;

pub mod guesses;
pub mod room_players;
pub mod rooms;
pub mod round_players;
pub mod rounds;
