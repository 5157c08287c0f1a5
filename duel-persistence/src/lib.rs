pub mod connection;
pub mod entities;
pub mod repositories;

pub use connection::*;
pub use repositories::SeaRoomStore;
