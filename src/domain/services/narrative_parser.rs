//! Narrative parser - Structured effects from GM annotations
//!
//! The GM is instructed to close its adjudication with bracketed markers:
//!
//! - `[HP变动: <name> <+N|-N>]`
//! - `[状态: <name> <+|-><condition>]`
//!
//! Anything that does not match is prose and is ignored. The markers are
//! left in the text; stripping them is a display concern.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::domain::entities::GameState;
use crate::domain::value_objects::CharacterId;

const HP_MARKER: &str = "[HP变动:";
const CONDITION_MARKER: &str = "[状态:";

/// A signed HP change for a named character
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HpChange {
    pub name: String,
    pub delta: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConditionOp {
    Add,
    Remove,
}

/// A condition added to or removed from a named character
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConditionChange {
    pub name: String,
    pub condition: String,
    pub op: ConditionOp,
}

/// All effects found in one GM response, in scan order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NarrativeEffects {
    pub hp_changes: Vec<HpChange>,
    pub condition_changes: Vec<ConditionChange>,
}

impl NarrativeEffects {
    pub fn is_empty(&self) -> bool {
        self.hp_changes.is_empty() && self.condition_changes.is_empty()
    }
}

/// What applying effects did to the state
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppliedEffects {
    /// Characters that went from alive to eliminated, in roster order
    pub newly_eliminated: Vec<CharacterId>,
    /// Names that matched no character
    pub unmatched_names: Vec<String>,
}

/// Parse both annotation kinds from GM text
pub fn parse_narrative(text: &str) -> NarrativeEffects {
    NarrativeEffects {
        hp_changes: parse_hp_changes(text),
        condition_changes: parse_condition_changes(text),
    }
}

/// Extract every well-formed `[HP变动: <name> <+N|-N>]` marker
pub fn parse_hp_changes(text: &str) -> Vec<HpChange> {
    scan_annotations(text, HP_MARKER, parse_hp_body)
}

/// Extract every well-formed `[状态: <name> <+|-><condition>]` marker
pub fn parse_condition_changes(text: &str) -> Vec<ConditionChange> {
    scan_annotations(text, CONDITION_MARKER, parse_condition_body)
}

/// Parse the body between `marker` and the next `]` on the same line
///
/// A well-formed annotation is consumed whole and scanning resumes after
/// its `]`, so a marker nested inside it is never read a second time.
fn scan_annotations<T>(text: &str, marker: &str, parse: impl Fn(&str) -> Option<T>) -> Vec<T> {
    let mut found = Vec::new();
    let mut rest = text;

    while let Some(start) = rest.find(marker) {
        let after = &rest[start + marker.len()..];
        let parsed = after
            .find(']')
            .map(|end| &after[..end])
            .filter(|body| !body.contains('\n'))
            .and_then(|body| parse(body).map(|item| (item, body.len() + 1)));

        rest = match parsed {
            Some((item, consumed)) => {
                found.push(item);
                &after[consumed..]
            }
            None => after,
        };
    }
    found
}

fn parse_hp_body(body: &str) -> Option<HpChange> {
    let body = body.trim_start();
    let split = body.rfind(char::is_whitespace)?;
    let (name, delta) = (body[..split].trim_end(), body[split..].trim_start());

    let mut chars = delta.chars();
    let sign = chars.next()?;
    let digits = chars.as_str();
    if !matches!(sign, '+' | '-') || digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    if name.is_empty() {
        return None;
    }

    let delta: i32 = delta.parse().ok()?;
    Some(HpChange {
        name: name.to_string(),
        delta,
    })
}

fn parse_condition_body(body: &str) -> Option<ConditionChange> {
    let body = body.trim_start();

    // The name ends at the first whitespace run that is followed by a sign
    let mut search_from = 0;
    while let Some(offset) = body[search_from..].find(char::is_whitespace) {
        let ws_start = search_from + offset;
        let after_ws = body[ws_start..].trim_start();
        let ws_end = body.len() - after_ws.len();

        if ws_start > 0 {
            let mut chars = after_ws.chars();
            let op = match chars.next() {
                Some('+') => Some(ConditionOp::Add),
                Some('-') => Some(ConditionOp::Remove),
                _ => None,
            };
            let condition = chars.as_str();
            if let Some(op) = op {
                if !condition.is_empty() {
                    return Some(ConditionChange {
                        name: body[..ws_start].to_string(),
                        condition: condition.to_string(),
                        op,
                    });
                }
            }
        }

        if ws_end >= body.len() {
            break;
        }
        search_from = ws_end;
    }
    None
}

/// Apply parsed effects to the state
///
/// HP changes are applied first, in scan order, each clamped to
/// `[0, max_hp]`; then condition changes. Names that match no character
/// are dropped. Elimination events are left to the caller.
pub fn apply_effects(state: &mut GameState, effects: &NarrativeEffects) -> AppliedEffects {
    let eliminated_before: HashSet<CharacterId> = state
        .characters
        .iter()
        .filter(|c| c.eliminated)
        .map(|c| c.id.clone())
        .collect();

    let mut unmatched_names = Vec::new();

    for change in &effects.hp_changes {
        match state.character_by_name_mut(&change.name) {
            Some(character) => {
                let hp = character.apply_hp_delta(change.delta);
                tracing::debug!(name = %change.name, delta = change.delta, hp, "Applied HP change");
            }
            None => unmatched_names.push(change.name.clone()),
        }
    }

    for change in &effects.condition_changes {
        match state.character_by_name_mut(&change.name) {
            Some(character) => {
                match change.op {
                    ConditionOp::Add => character.add_condition(change.condition.clone()),
                    ConditionOp::Remove => character.remove_condition(&change.condition),
                };
            }
            None => unmatched_names.push(change.name.clone()),
        }
    }

    if !unmatched_names.is_empty() {
        tracing::warn!(?unmatched_names, "Dropped annotations for unknown characters");
    }

    let newly_eliminated = state
        .characters
        .iter()
        .filter(|c| c.eliminated && !eliminated_before.contains(&c.id))
        .map(|c| c.id.clone())
        .collect();

    AppliedEffects {
        newly_eliminated,
        unmatched_names,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::{Character, GenerationParams};
    use crate::domain::value_objects::Stats;

    fn state() -> GameState {
        let characters = [("ayla", "艾拉"), ("bo", "柏")]
            .iter()
            .map(|(id, name)| {
                Character::new(*id, *name, Stats::default(), GenerationParams::new("", "mock"))
            })
            .collect();
        GameState::new("古墓", characters)
    }

    #[test]
    fn test_parse_single_hp_change() {
        let changes = parse_hp_changes("剑光一闪，艾拉受了伤。[HP变动: 艾拉 -5] 战斗继续。");
        assert_eq!(
            changes,
            vec![HpChange {
                name: "艾拉".to_string(),
                delta: -5
            }]
        );
    }

    #[test]
    fn test_parse_without_annotations() {
        assert!(parse_narrative("夜色深沉，什么也没有发生。").is_empty());
    }

    #[test]
    fn test_repeated_names_yield_independent_changes() {
        let changes = parse_hp_changes("[HP变动: 艾拉 -5][HP变动: 艾拉 +2]");
        assert_eq!(changes.len(), 2);
        assert_eq!(changes[0].delta, -5);
        assert_eq!(changes[1].delta, 2);
    }

    #[test]
    fn test_parse_tolerates_malformed_markers() {
        let text = "[HP变动: 艾拉 五] [HP变动: -3] [HP变动: 柏 +x] [HP变动 艾拉 -1] [HP变动: 柏 +4]";
        let changes = parse_hp_changes(text);
        assert_eq!(
            changes,
            vec![HpChange {
                name: "柏".to_string(),
                delta: 4
            }]
        );
    }

    #[test]
    fn test_parse_name_with_spaces() {
        let changes = parse_hp_changes("[HP变动:Old Tom   -12]");
        assert_eq!(changes[0].name, "Old Tom");
        assert_eq!(changes[0].delta, -12);
    }

    #[test]
    fn test_parse_condition_changes() {
        let changes = parse_condition_changes("毒雾弥漫。[状态: 艾拉 +中毒] [状态: 柏 -眩晕]");
        assert_eq!(
            changes,
            vec![
                ConditionChange {
                    name: "艾拉".to_string(),
                    condition: "中毒".to_string(),
                    op: ConditionOp::Add,
                },
                ConditionChange {
                    name: "柏".to_string(),
                    condition: "眩晕".to_string(),
                    op: ConditionOp::Remove,
                },
            ]
        );
    }

    #[test]
    fn test_parse_malformed_condition_is_ignored() {
        assert!(parse_condition_changes("[状态: 艾拉 中毒] [状态: +中毒] [状态: 艾拉 +]").is_empty());
    }

    #[test]
    fn test_marker_does_not_span_lines() {
        assert!(parse_hp_changes("[HP变动: 艾拉\n-5]").is_empty());
    }

    #[test]
    fn test_nested_marker_is_consumed_with_outer_annotation() {
        let changes = parse_hp_changes("[HP变动: [HP变动: 艾拉 -5]");
        assert_eq!(
            changes,
            vec![HpChange {
                name: "[HP变动: 艾拉".to_string(),
                delta: -5
            }]
        );

        let mut state = state();
        let applied = apply_effects(&mut state, &parse_narrative("[HP变动: [HP变动: 艾拉 -5]"));
        assert_eq!(state.character(&"ayla".into()).unwrap().hp, 40);
        assert_eq!(applied.unmatched_names, vec!["[HP变动: 艾拉".to_string()]);
    }

    #[test]
    fn test_unclosed_marker_does_not_hide_the_next_one() {
        let changes = parse_hp_changes("[HP变动: 艾拉 重伤\n[HP变动: 柏 -3]");
        assert_eq!(
            changes,
            vec![HpChange {
                name: "柏".to_string(),
                delta: -3
            }]
        );
    }

    #[test]
    fn test_apply_clamps_and_eliminates() {
        let mut state = state();
        let effects = parse_narrative("[HP变动: 柏 -100] [HP变动: 艾拉 -5]");
        let applied = apply_effects(&mut state, &effects);

        let bo = state.character(&"bo".into()).unwrap();
        assert_eq!(bo.hp, 0);
        assert!(bo.eliminated);
        assert_eq!(applied.newly_eliminated, vec![CharacterId::from("bo")]);
        assert_eq!(state.character(&"ayla".into()).unwrap().hp, 35);
    }

    #[test]
    fn test_apply_drops_unknown_names() {
        let mut state = state();
        let before = state.characters.clone();
        let applied = apply_effects(&mut state, &parse_narrative("[HP变动: 路人 -5] [状态: 路人 +中毒]"));
        assert_eq!(state.characters, before);
        assert_eq!(applied.unmatched_names, vec!["路人".to_string(), "路人".to_string()]);
    }

    #[test]
    fn test_apply_conditions_idempotently() {
        let mut state = state();
        apply_effects(
            &mut state,
            &parse_narrative("[状态: 艾拉 +中毒] [状态: 艾拉 +中毒] [状态: 柏 -眩晕]"),
        );
        assert_eq!(state.character(&"ayla".into()).unwrap().conditions, vec!["中毒".to_string()]);
        assert!(state.character(&"bo".into()).unwrap().conditions.is_empty());
    }

    #[test]
    fn test_eliminated_then_healed_in_same_response_is_not_reported() {
        let mut state = state();
        let applied = apply_effects(&mut state, &parse_narrative("[HP变动: 艾拉 -40] [HP变动: 艾拉 +3]"));
        assert!(applied.newly_eliminated.is_empty());
        let ayla = state.character(&"ayla".into()).unwrap();
        assert_eq!(ayla.hp, 3);
        assert!(!ayla.eliminated);
    }
}
