//! Application services - Use case implementations
//!
//! The prompt builder turns game state into model requests; the turn
//! orchestrator drives a session round by round through the `LlmPort`.

pub mod llm;
pub mod turn_orchestrator;

pub use turn_orchestrator::{
    Completion, GmSettings, LiveText, OrchestratorError, PauseHandle, PreparedStep,
    SessionStatus, Step, TurnOrchestrator,
};
