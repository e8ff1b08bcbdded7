//! Data Transfer Objects - For setup and presentation boundaries
//!
//! DTOs live in the application layer so infrastructure (setup files, the
//! terminal driver) can deserialize input without reaching into the domain.

pub mod session_setup;

pub use session_setup::{
    CharacterSetup, CustomCharacterSetup, ScenarioPreset, SessionSetup, SetupError,
};
