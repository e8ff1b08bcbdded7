//! Infrastructure layer - External adapters and implementations
//!
//! This layer contains:
//! - Config: environment configuration and setup file loading
//! - OpenAI-compatible client: the `LlmPort` adapter over HTTP
//! - Console: the terminal driver used by the binary

pub mod config;
pub mod console;
pub mod openai_compat;
