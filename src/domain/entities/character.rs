//! Character entity - A participant in the session, AI- or human-controlled

use serde::{Deserialize, Serialize};

use crate::domain::value_objects::{compute_max_hp, derive_stats, CharacterId, StatKind, Stats};

/// Parameters used to generate a character's dialogue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationParams {
    /// Persona text, sent as the head of the character's system prompt
    pub persona: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl GenerationParams {
    pub fn new(persona: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            persona: persona.into(),
            model: model.into(),
            temperature: 0.8,
            max_tokens: 512,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

/// A character in the session
///
/// Invariants: `0 <= hp <= max_hp` and `eliminated == (hp == 0)`.
/// `max_hp` is fixed at creation from willpower.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Character {
    pub id: CharacterId,
    pub name: String,
    pub hp: i32,
    pub max_hp: i32,
    pub stats: Stats,
    /// Active condition labels, without duplicates
    pub conditions: Vec<String>,
    pub eliminated: bool,
    pub is_human: bool,
    pub generation: GenerationParams,
}

impl Character {
    pub fn new(
        id: impl Into<CharacterId>,
        name: impl Into<String>,
        stats: Stats,
        generation: GenerationParams,
    ) -> Self {
        let max_hp = compute_max_hp(stats.willpower).max(0);
        Self {
            id: id.into(),
            name: name.into(),
            hp: max_hp,
            max_hp,
            stats,
            conditions: Vec::new(),
            eliminated: max_hp == 0,
            is_human: false,
            generation,
        }
    }

    /// Create a character whose stats are derived from trait labels
    pub fn from_traits<S: AsRef<str>>(
        id: impl Into<CharacterId>,
        name: impl Into<String>,
        traits: &[S],
        generation: GenerationParams,
    ) -> Self {
        Self::new(id, name, derive_stats(traits), generation)
    }

    pub fn human_controlled(mut self) -> Self {
        self.is_human = true;
        self
    }

    pub fn is_alive(&self) -> bool {
        !self.eliminated
    }

    pub fn modifier(&self, stat: StatKind) -> i32 {
        self.stats.modifier(stat)
    }

    /// Apply a signed HP change, clamped to `[0, max_hp]`
    ///
    /// The eliminated flag is re-evaluated from the new HP every time, so a
    /// healing delta on a character at 0 HP brings it back.
    pub fn apply_hp_delta(&mut self, delta: i32) -> i32 {
        self.hp = self.hp.saturating_add(delta).clamp(0, self.max_hp);
        self.eliminated = self.hp == 0;
        self.hp
    }

    /// Add a condition; returns false if it was already present
    pub fn add_condition(&mut self, condition: impl Into<String>) -> bool {
        let condition = condition.into();
        if self.has_condition(&condition) {
            return false;
        }
        self.conditions.push(condition);
        true
    }

    /// Remove a condition; returns false if it was not present
    pub fn remove_condition(&mut self, condition: &str) -> bool {
        let before = self.conditions.len();
        self.conditions.retain(|c| c != condition);
        self.conditions.len() != before
    }

    pub fn has_condition(&self, condition: &str) -> bool {
        self.conditions.iter().any(|c| c == condition)
    }
}
