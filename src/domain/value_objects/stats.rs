//! Character stats derived from qualitative traits

use serde::{Deserialize, Serialize};

/// Value every stat starts from before trait deltas are applied
pub const STAT_BASELINE: i32 = 10;

/// The five stats every character carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatKind {
    Strength,
    Agility,
    Intellect,
    Charisma,
    Willpower,
}

impl StatKind {
    pub const ALL: [StatKind; 5] = [
        StatKind::Strength,
        StatKind::Agility,
        StatKind::Intellect,
        StatKind::Charisma,
        StatKind::Willpower,
    ];

    /// Three-letter label used in prompts
    pub fn abbreviation(&self) -> &'static str {
        match self {
            Self::Strength => "STR",
            Self::Agility => "AGI",
            Self::Intellect => "INT",
            Self::Charisma => "CHA",
            Self::Willpower => "WIL",
        }
    }
}

impl std::fmt::Display for StatKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.abbreviation())
    }
}

/// A character's stat block. Values are unclamped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
    pub strength: i32,
    pub agility: i32,
    pub intellect: i32,
    pub charisma: i32,
    pub willpower: i32,
}

impl Default for Stats {
    fn default() -> Self {
        Self {
            strength: STAT_BASELINE,
            agility: STAT_BASELINE,
            intellect: STAT_BASELINE,
            charisma: STAT_BASELINE,
            willpower: STAT_BASELINE,
        }
    }
}

impl Stats {
    pub fn get(&self, kind: StatKind) -> i32 {
        match kind {
            StatKind::Strength => self.strength,
            StatKind::Agility => self.agility,
            StatKind::Intellect => self.intellect,
            StatKind::Charisma => self.charisma,
            StatKind::Willpower => self.willpower,
        }
    }

    fn get_mut(&mut self, kind: StatKind) -> &mut i32 {
        match kind {
            StatKind::Strength => &mut self.strength,
            StatKind::Agility => &mut self.agility,
            StatKind::Intellect => &mut self.intellect,
            StatKind::Charisma => &mut self.charisma,
            StatKind::Willpower => &mut self.willpower,
        }
    }

    pub fn with_stat(mut self, kind: StatKind, value: i32) -> Self {
        *self.get_mut(kind) = value;
        self
    }

    /// Modifier applied to d20 rolls made with the given stat
    pub fn modifier(&self, kind: StatKind) -> i32 {
        stat_modifier(self.get(kind))
    }
}

/// Trait name to stat deltas
const TRAIT_TABLE: &[(&str, &[(StatKind, i32)])] = &[
    ("剑道至上", &[(StatKind::Strength, 2), (StatKind::Agility, 1)]),
    ("极端克制", &[(StatKind::Willpower, 2), (StatKind::Charisma, -1)]),
    ("寡言直率", &[(StatKind::Charisma, -1), (StatKind::Willpower, 1)]),
    ("感情极端", &[(StatKind::Willpower, -1), (StatKind::Strength, 1)]),
    ("洒脱自在", &[(StatKind::Charisma, 2), (StatKind::Willpower, 1)]),
    ("古道热肠", &[(StatKind::Charisma, 1), (StatKind::Willpower, 1)]),
    ("冷静分析", &[(StatKind::Intellect, 2), (StatKind::Agility, 1)]),
    ("机敏灵活", &[(StatKind::Agility, 2), (StatKind::Intellect, 1)]),
    ("神秘莫测", &[(StatKind::Intellect, 1), (StatKind::Charisma, 1)]),
    ("狡诈多变", &[(StatKind::Intellect, 2), (StatKind::Charisma, 1)]),
    ("温柔体贴", &[(StatKind::Charisma, 2), (StatKind::Willpower, 1)]),
    ("暴力倾向", &[(StatKind::Strength, 2), (StatKind::Willpower, -1)]),
    ("坚韧不拔", &[(StatKind::Willpower, 2), (StatKind::Strength, 1)]),
    ("领袖气质", &[(StatKind::Charisma, 2), (StatKind::Strength, 1)]),
];

/// Stat deltas granted by a trait, if the trait is known
pub fn trait_deltas(trait_name: &str) -> Option<&'static [(StatKind, i32)]> {
    TRAIT_TABLE
        .iter()
        .find(|(name, _)| *name == trait_name)
        .map(|(_, deltas)| *deltas)
}

/// All traits that affect stats
pub fn known_traits() -> impl Iterator<Item = &'static str> {
    TRAIT_TABLE.iter().map(|(name, _)| *name)
}

/// Derive a stat block from trait labels
///
/// Every stat starts at [`STAT_BASELINE`]; each known trait adds its deltas.
/// Unknown traits are ignored.
pub fn derive_stats<S: AsRef<str>>(traits: &[S]) -> Stats {
    let mut stats = Stats::default();
    for deltas in traits.iter().filter_map(|t| trait_deltas(t.as_ref())) {
        for (kind, delta) in deltas {
            *stats.get_mut(*kind) += delta;
        }
    }
    stats
}

/// Maximum hit points for a willpower score
pub fn compute_max_hp(willpower: i32) -> i32 {
    20 + 2 * willpower
}

/// Standard ability modifier, `floor((stat - 10) / 2)`
pub fn stat_modifier(stat: i32) -> i32 {
    (stat - 10).div_euclid(2)
}

/// Render a modifier with an explicit sign (`+2`, `+0`, `-1`)
pub fn format_modifier(modifier: i32) -> String {
    if modifier >= 0 {
        format!("+{}", modifier)
    } else {
        modifier.to_string()
    }
}
