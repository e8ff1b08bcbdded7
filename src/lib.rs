//! Roundtable Engine - turn-based tabletop RPG sessions played by language models
//!
//! A GM model narrates and adjudicates; each character is voiced by its own
//! model (or by a human at the terminal). Stats, dice and hit points are
//! tracked by the engine, and the GM reports state changes through bracketed
//! annotations that the engine parses and applies.

pub mod application;
pub mod domain;
pub mod infrastructure;
