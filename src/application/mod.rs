//! Application layer - Use cases and orchestration
//!
//! This layer contains:
//! - Ports: the `LlmPort` the orchestrator calls out through
//! - DTOs: session setup input
//! - Services: prompt building and the turn orchestrator

pub mod dto;
pub mod ports;
pub mod services;
