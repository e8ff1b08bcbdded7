//! Domain entities - Core game objects with identity

mod character;
mod game_state;

pub use character::{Character, GenerationParams};
pub use game_state::{build_turn_queue, DeclaredAction, GamePhase, GameState};
