//! Domain layer - Core game logic with no external dependencies
//!
//! This layer contains:
//! - Entities: Character, GameState
//! - Value Objects: ids, stats, dice rolls, action types
//! - Domain Events: the append-only session log
//! - Domain Services: the narrative annotation parser

pub mod entities;
pub mod events;
pub mod services;
pub mod value_objects;
