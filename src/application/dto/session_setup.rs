//! Session setup input
//!
//! Produced by whatever collects the roster (a setup file for the binary)
//! and turned into the initial [`GameState`].

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::domain::entities::{Character, GameState, GenerationParams};
use crate::domain::value_objects::{CharacterId, Stats};

const DEFAULT_MODEL: &str = "gpt-4o-mini";
const CUSTOM_PERSONA: &str = "你是一个冒险者。";

/// Errors raised while validating setup input
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SetupError {
    #[error("At least one character is required")]
    EmptyRoster,
    #[error("Duplicate character id: {0}")]
    DuplicateCharacter(String),
    #[error("Duplicate character name: {0}")]
    DuplicateName(String),
    #[error("Human character not in roster: {0}")]
    UnknownHumanCharacter(String),
    #[error("Both a roster human character and a custom character were given")]
    ConflictingHumanSelection,
    #[error("Scene description is empty")]
    EmptyScene,
}

/// Built-in scene presets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScenarioPreset {
    Dungeon,
    Social,
    Survival,
}

impl ScenarioPreset {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Dungeon => "地下城探索",
            Self::Social => "社交谋略",
            Self::Survival => "荒野求生",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::Dungeon => "一行人深入危险的地下迷宫，面对怪物和陷阱。",
            Self::Social => "在一场盛大的宴会上，各方势力暗中角力，真相隐藏在华丽的面具之下。",
            Self::Survival => "被困在荒无人烟的绝境中，必须团结合作才能生还。",
        }
    }
}

/// One roster entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CharacterSetup {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub traits: Vec<String>,
    /// Persona system prompt for the character
    #[serde(default)]
    pub persona: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

/// A human character created at setup rather than picked from the roster
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomCharacterSetup {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

/// Everything needed to start a session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSetup {
    /// Preset used when `scene` is absent
    #[serde(default)]
    pub scenario: Option<ScenarioPreset>,
    /// Custom scene text; takes precedence over the preset
    #[serde(default)]
    pub scene: Option<String>,
    /// GM rules text; the built-in rules are used when absent
    #[serde(default)]
    pub rules: Option<String>,
    pub characters: Vec<CharacterSetup>,
    #[serde(default)]
    pub human_character_id: Option<String>,
    #[serde(default)]
    pub custom_character: Option<CustomCharacterSetup>,
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_temperature() -> f32 {
    0.8
}

fn default_max_tokens() -> u32 {
    1024
}

impl CharacterSetup {
    fn to_character(&self, is_human: bool) -> Character {
        let generation = GenerationParams::new(self.persona.clone(), self.model.clone())
            .with_temperature(self.temperature)
            .with_max_tokens(self.max_tokens);
        let character = Character::from_traits(self.id.as_str(), self.name.clone(), &self.traits, generation);
        if is_human {
            character.human_controlled()
        } else {
            character
        }
    }
}

impl CustomCharacterSetup {
    fn to_character(&self) -> Character {
        let persona = if self.description.trim().is_empty() {
            CUSTOM_PERSONA.to_string()
        } else {
            self.description.clone()
        };
        let generation = GenerationParams::new(persona, DEFAULT_MODEL)
            .with_temperature(0.8)
            .with_max_tokens(512);
        Character::new(CharacterId::custom(), self.name.clone(), Stats::default(), generation)
            .human_controlled()
    }
}

impl SessionSetup {
    /// Scene text: the custom scene, else the preset's description
    pub fn scene_text(&self) -> Option<String> {
        self.scene
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .or_else(|| self.scenario.map(|p| p.description().to_string()))
    }

    /// Validate the setup and build the initial state
    pub fn build_state(&self) -> Result<GameState, SetupError> {
        if self.characters.is_empty() {
            return Err(SetupError::EmptyRoster);
        }

        let mut seen = HashSet::new();
        for c in &self.characters {
            if !seen.insert(c.id.as_str()) || c.id == CharacterId::CUSTOM {
                return Err(SetupError::DuplicateCharacter(c.id.clone()));
            }
        }

        // Annotations address characters by name
        let mut names = HashSet::new();
        let custom_name = self.custom_character.as_ref().map(|c| c.name.as_str());
        for name in self.characters.iter().map(|c| c.name.as_str()).chain(custom_name) {
            if !names.insert(name.trim()) {
                return Err(SetupError::DuplicateName(name.trim().to_string()));
            }
        }

        if self.human_character_id.is_some() && self.custom_character.is_some() {
            return Err(SetupError::ConflictingHumanSelection);
        }
        if let Some(human) = &self.human_character_id {
            if !seen.contains(human.as_str()) {
                return Err(SetupError::UnknownHumanCharacter(human.clone()));
            }
        }

        let scene = self.scene_text().ok_or(SetupError::EmptyScene)?;

        let mut characters: Vec<Character> = self
            .characters
            .iter()
            .map(|c| c.to_character(self.human_character_id.as_deref() == Some(c.id.as_str())))
            .collect();
        if let Some(custom) = &self.custom_character {
            characters.push(custom.to_character());
        }

        Ok(GameState::new(scene, characters))
    }
}
