//! Game state - The authoritative state of one running session

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::domain::entities::Character;
use crate::domain::events::GameEvent;
use crate::domain::value_objects::{CharacterId, DiceRoll};

/// Phase of the current round
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GamePhase {
    /// The GM describes the opening or ongoing scene
    GmNarration,
    /// Characters in the turn queue declare actions
    PlayerActions,
    /// The GM adjudicates the round's actions
    Resolution,
}

impl GamePhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GmNarration => "gm-narration",
            Self::PlayerActions => "player-actions",
            Self::Resolution => "resolution",
        }
    }
}

impl std::fmt::Display for GamePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An action declared this round, waiting for resolution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeclaredAction {
    pub character_id: CharacterId,
    pub character_name: String,
    pub action: String,
    pub roll: DiceRoll,
}

/// State of a session
///
/// The turn queue always holds a subsequence of the living characters' ids
/// in roster order. `version` increases with every committed mutation so
/// that stale completions can be detected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameState {
    pub phase: GamePhase,
    /// Starts at 1, incremented after each completed resolution
    pub round: u32,
    /// Scene description, fixed for the session
    pub scene: String,
    pub characters: Vec<Character>,
    /// Append-only event log
    pub log: Vec<GameEvent>,
    /// Characters still owed a turn this round; the front is next
    pub turn_queue: VecDeque<CharacterId>,
    /// Actions collected so far this round
    pub declared_actions: Vec<DeclaredAction>,
    pub version: u64,
}

impl GameState {
    pub fn new(scene: impl Into<String>, characters: Vec<Character>) -> Self {
        let turn_queue = build_turn_queue(&characters);
        Self {
            phase: GamePhase::GmNarration,
            round: 1,
            scene: scene.into(),
            characters,
            log: Vec::new(),
            turn_queue,
            declared_actions: Vec::new(),
            version: 0,
        }
    }

    pub fn character(&self, id: &CharacterId) -> Option<&Character> {
        self.characters.iter().find(|c| &c.id == id)
    }

    pub fn character_mut(&mut self, id: &CharacterId) -> Option<&mut Character> {
        self.characters.iter_mut().find(|c| &c.id == id)
    }

    pub fn character_by_name_mut(&mut self, name: &str) -> Option<&mut Character> {
        self.characters.iter_mut().find(|c| c.name == name)
    }

    pub fn alive_characters(&self) -> impl Iterator<Item = &Character> {
        self.characters.iter().filter(|c| c.is_alive())
    }

    /// The session ends when at most one character is still standing
    pub fn is_over(&self) -> bool {
        self.alive_characters().count() <= 1
    }

    pub fn push_event(&mut self, event: GameEvent) {
        self.log.push(event);
    }

    /// The last `window` events, oldest first
    pub fn recent_log(&self, window: usize) -> &[GameEvent] {
        let start = self.log.len().saturating_sub(window);
        &self.log[start..]
    }

    /// Rebuild the queue from scratch for a new round
    pub fn rebuild_turn_queue(&mut self) {
        self.turn_queue = build_turn_queue(&self.characters);
    }

    pub fn next_in_queue(&self) -> Option<&CharacterId> {
        self.turn_queue.front()
    }

    pub(crate) fn bump_version(&mut self) {
        self.version += 1;
    }
}

/// Ids of living characters, in roster order
pub fn build_turn_queue(characters: &[Character]) -> VecDeque<CharacterId> {
    characters
        .iter()
        .filter(|c| c.is_alive())
        .map(|c| c.id.clone())
        .collect()
}
