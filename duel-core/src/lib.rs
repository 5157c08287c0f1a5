pub mod clock;
pub mod config;
pub mod dictionary;
pub mod error;
pub mod evaluator;
pub mod events;
pub mod finisher;
pub mod lifecycle;
pub mod lock;
pub mod room_state;
pub mod store;
pub mod submission;
pub mod transition;
pub mod word_validation;

// Re-export main components
pub use clock::*;
pub use config::*;
pub use dictionary::*;
pub use error::*;
pub use evaluator::*;
pub use events::*;
pub use finisher::*;
pub use lifecycle::*;
pub use lock::*;
pub use room_state::*;
pub use store::*;
pub use submission::*;
pub use transition::*;
pub use word_validation::*;
