//! Game events - The append-only session log
//!
//! Events are created once and never edited. The log is the only record of
//! what happened during a session.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::value_objects::{format_roll, DiceRoll, EventId};

/// Speaker label used for Game Master events
pub const GM_SPEAKER: &str = "GM";
/// Speaker label used for engine-generated events
pub const SYSTEM_SPEAKER: &str = "系统";

/// Kind of a log entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameEventKind {
    /// GM scene narration
    Narration,
    /// A character's declared action
    Action,
    /// The dice roll attached to an action
    Roll,
    /// GM adjudication of a round
    Result,
    /// Engine notices (eliminations, game over)
    System,
    /// Out-of-character input from the human player
    User,
}

/// One entry in the session log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameEvent {
    pub id: EventId,
    pub kind: GameEventKind,
    pub speaker: String,
    pub content: String,
    pub roll: Option<DiceRoll>,
    pub timestamp: DateTime<Utc>,
}

impl GameEvent {
    pub fn new(kind: GameEventKind, speaker: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: EventId::new(),
            kind,
            speaker: speaker.into(),
            content: content.into(),
            roll: None,
            timestamp: Utc::now(),
        }
    }

    pub fn narration(content: impl Into<String>) -> Self {
        Self::new(GameEventKind::Narration, GM_SPEAKER, content)
    }

    pub fn action(speaker: impl Into<String>, content: impl Into<String>) -> Self {
        Self::new(GameEventKind::Action, speaker, content)
    }

    /// Roll event; content is `<speaker> <formatted roll>`
    pub fn roll(speaker: impl Into<String>, roll: DiceRoll) -> Self {
        let speaker = speaker.into();
        let content = format!("{} {}", speaker, format_roll(&roll));
        Self {
            roll: Some(roll),
            ..Self::new(GameEventKind::Roll, speaker, content)
        }
    }

    pub fn result(content: impl Into<String>) -> Self {
        Self::new(GameEventKind::Result, GM_SPEAKER, content)
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(GameEventKind::System, SYSTEM_SPEAKER, content)
    }

    pub fn user(speaker: impl Into<String>, content: impl Into<String>) -> Self {
        Self::new(GameEventKind::User, speaker, content)
    }
}
