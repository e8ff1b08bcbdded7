//! Domain events - Things that have happened during a session

mod game_event;

pub use game_event::{GameEvent, GameEventKind, GM_SPEAKER, SYSTEM_SPEAKER};
