//! Action classification and difficulty table

use serde::{Deserialize, Serialize};

use super::StatKind;

/// Keyword cues checked in order; the first stat with a matching cue wins
const ACTION_CUES: &[(StatKind, &[&str])] = &[
    (StatKind::Strength, &["攻击", "斩", "劈"]),
    (StatKind::Agility, &["躲", "闪", "防"]),
    (StatKind::Charisma, &["说服", "交涉", "谈"]),
    (StatKind::Intellect, &["分析", "观察", "思考"]),
];

/// Classify free action text into the stat it is rolled with
///
/// Cue groups are scanned in a fixed order (attack, defense, persuasion,
/// analysis) so text matching several groups resolves to the earliest one.
/// Falls back to strength.
pub fn classify_action(action: &str) -> StatKind {
    ACTION_CUES
        .iter()
        .find(|(_, cues)| cues.iter().any(|cue| action.contains(cue)))
        .map(|(stat, _)| *stat)
        .unwrap_or(StatKind::Strength)
}

/// Difficulty class for an action rolled with `stat`
pub fn difficulty_for(stat: StatKind) -> i32 {
    match stat {
        StatKind::Strength => 12,
        StatKind::Agility => 10,
        StatKind::Intellect => 14,
        StatKind::Charisma => 13,
        StatKind::Willpower => 12,
    }
}

/// Action type picked explicitly by the human-controlled character
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionType {
    Attack,
    Defend,
    Skill,
    Talk,
    /// Free-form action, rolled like an attack
    Custom,
}

impl ActionType {
    pub const ALL: [ActionType; 5] = [
        ActionType::Attack,
        ActionType::Defend,
        ActionType::Skill,
        ActionType::Talk,
        ActionType::Custom,
    ];

    pub fn stat(&self) -> StatKind {
        match self {
            Self::Attack | Self::Custom => StatKind::Strength,
            Self::Defend => StatKind::Agility,
            Self::Skill => StatKind::Intellect,
            Self::Talk => StatKind::Charisma,
        }
    }

    pub fn difficulty(&self) -> i32 {
        difficulty_for(self.stat())
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Attack => "攻击",
            Self::Defend => "防御",
            Self::Skill => "技能",
            Self::Talk => "交涉",
            Self::Custom => "自定义",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Attack => "attack",
            Self::Defend => "defend",
            Self::Skill => "skill",
            Self::Talk => "talk",
            Self::Custom => "custom",
        }
    }
}

impl std::str::FromStr for ActionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        ActionType::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s) || t.label() == s)
            .ok_or_else(|| format!("Unknown action type: {}", s))
    }
}

impl std::fmt::Display for ActionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
