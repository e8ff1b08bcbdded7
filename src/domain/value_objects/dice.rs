//! d20 resolution

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Faces on the only die this game rolls
pub const D20_SIDES: i32 = 20;

/// The result of one modified d20 roll
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiceRoll {
    /// Die notation, always `d20`
    pub dice: String,
    /// Raw face value in `1..=20`
    pub value: i32,
    pub modifier: i32,
    pub total: i32,
    /// Target difficulty (DC), if the roll has pass/fail semantics
    pub difficulty: Option<i32>,
    /// `total >= difficulty`; `None` for a flavor roll without a difficulty
    pub success: Option<bool>,
}

impl DiceRoll {
    /// Build a roll from an already-drawn face value
    pub fn from_value(value: i32, modifier: i32, difficulty: Option<i32>) -> Self {
        let total = value + modifier;
        Self {
            dice: "d20".to_string(),
            value,
            modifier,
            total,
            difficulty,
            success: difficulty.map(|dc| total >= dc),
        }
    }

    /// Roll a d20 with the given RNG
    pub fn roll<R: Rng + ?Sized>(rng: &mut R, modifier: i32, difficulty: Option<i32>) -> Self {
        let value = rng.gen_range(1..=D20_SIDES);
        Self::from_value(value, modifier, difficulty)
    }
}

/// Roll a d20, add the modifier and compare against the difficulty when given
pub fn roll_d20_with_mod(modifier: i32, difficulty: Option<i32>) -> DiceRoll {
    DiceRoll::roll(&mut rand::thread_rng(), modifier, difficulty)
}

/// Canonical text of a roll: `d20(<value>)<±modifier>=<total>[ vs DC<dc> 成功|失败]`
///
/// This string is shown in the log and sent verbatim to the model.
pub fn format_roll(roll: &DiceRoll) -> String {
    let modifier = if roll.modifier >= 0 {
        format!("+{}", roll.modifier)
    } else {
        roll.modifier.to_string()
    };
    let mut text = format!("d20({}){}={}", roll.value, modifier, roll.total);
    if let Some(dc) = roll.difficulty {
        let label = if roll.success == Some(true) { "成功" } else { "失败" };
        text.push_str(&format!(" vs DC{} {}", dc, label));
    }
    text
}

impl std::fmt::Display for DiceRoll {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&format_roll(self))
    }
}
