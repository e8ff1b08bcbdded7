//! Value objects - Immutable objects defined by their attributes

mod action_type;
mod dice;
mod ids;
mod stats;

pub use action_type::{classify_action, difficulty_for, ActionType};
pub use dice::{format_roll, roll_d20_with_mod, DiceRoll, D20_SIDES};
pub use ids::*;
pub use stats::{
    compute_max_hp, derive_stats, format_modifier, known_traits, stat_modifier, trait_deltas,
    StatKind, Stats, STAT_BASELINE,
};
