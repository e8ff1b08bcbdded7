//! Domain services - Pure game logic operating on entities

pub mod narrative_parser;

pub use narrative_parser::{
    apply_effects, parse_condition_changes, parse_hp_changes, parse_narrative, AppliedEffects,
    ConditionChange, ConditionOp, HpChange, NarrativeEffects,
};
