//! Prompt building functions for LLM requests
//!
//! Three request shapes are built here: GM narration, GM resolution and a
//! character's action. All of them render the log through
//! [`format_log_digest`] so the GM and the characters read the same history.

use crate::application::ports::outbound::ChatMessage;
use crate::domain::entities::{Character, GameState};
use crate::domain::events::{GameEvent, GameEventKind};
use crate::domain::value_objects::{format_modifier, format_roll, StatKind};

/// Events shown to the GM when narrating
pub const NARRATION_LOG_WINDOW: usize = 15;
/// Events shown to the GM when resolving a round
pub const RESOLUTION_LOG_WINDOW: usize = 10;
/// Events shown to a character deciding its action
pub const ACTION_LOG_WINDOW: usize = 8;

pub const OPENING_SCENE_REQUEST: &str = "游戏开始。请描述开场场景，为角色们设定初始情境。";
pub const CHARACTER_TURN_PROMPT: &str = "现在轮到你行动了。请宣布你的行动。";

/// Rules text used when the session setup supplies none
pub const DEFAULT_GM_RULES: &str = "\
你是一场桌游RPG的游戏主持人（GM）。你负责描述场景、扮演非玩家角色，并根据角色的行动和骰子结果裁定发生了什么。

【规则】
- 每个角色有五项属性：力量(STR)、敏捷(AGI)、智力(INT)、魅力(CHA)、意志(WIL)，括号内为检定修正值。
- 行动以d20加修正值检定，总值不低于难度(DC)即为成功。
- 生命值(HP)降到0的角色被淘汰，不再行动。
- 叙述简洁生动，每次回复不超过300字。

【标注格式】
裁定结果时，如有生命值或状态变化，请在回复末尾逐条标注：
[HP变动: 角色名 -N] 或 [HP变动: 角色名 +N]
[状态: 角色名 +状态名] 或 [状态: 角色名 -状态名]
角色名必须与角色状态中的名字完全一致。";

/// Render log events as one block, one tagged line per event
pub fn format_log_digest(events: &[GameEvent]) -> String {
    events
        .iter()
        .map(|e| match e.kind {
            GameEventKind::Narration => format!("[GM]: {}", e.content),
            GameEventKind::Action => format!("[{}的行动]: {}", e.speaker, e.content),
            GameEventKind::Roll => format!("[骰子] {}", e.content),
            GameEventKind::Result => format!("[结果]: {}", e.content),
            GameEventKind::System => format!("[系统]: {}", e.content),
            GameEventKind::User => format!("[玩家]: {}", e.content),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// One status line: HP (or elimination), conditions, stats with modifiers
pub fn format_character_status(character: &Character) -> String {
    let status = if character.eliminated {
        "【已淘汰】".to_string()
    } else {
        format!("HP: {}/{}", character.hp, character.max_hp)
    };

    let conditions = if character.conditions.is_empty() {
        String::new()
    } else {
        format!(" 状态: {}", character.conditions.join(", "))
    };

    let stats = StatKind::ALL
        .iter()
        .map(|kind| {
            format!(
                "{}:{}({})",
                kind.abbreviation(),
                character.stats.get(*kind),
                format_modifier(character.modifier(*kind))
            )
        })
        .collect::<Vec<_>>()
        .join(" ");

    format!("- {}: {}{} | {}", character.name, status, conditions, stats)
}

/// System prompt shared by narration and resolution requests
pub fn build_gm_system_prompt(rules: &str, state: &GameState) -> String {
    let summaries = state
        .characters
        .iter()
        .map(format_character_status)
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "{}\n\n【当前场景】\n{}\n\n【第{}轮】\n\n【角色状态】\n{}",
        rules, state.scene, state.round, summaries
    )
}

/// Messages asking the GM to open or continue the scene
pub fn build_gm_narration_messages(rules: &str, state: &GameState) -> Vec<ChatMessage> {
    let recent = state.recent_log(NARRATION_LOG_WINDOW);
    let request = if recent.is_empty() {
        OPENING_SCENE_REQUEST.to_string()
    } else {
        format!(
            "以下是最近发生的事件：\n{}\n\n请描述当前场景的最新发展。",
            format_log_digest(recent)
        )
    };

    vec![
        ChatMessage::system(build_gm_system_prompt(rules, state)),
        ChatMessage::user(request),
    ]
}

/// Messages asking the GM to adjudicate this round's declared actions
pub fn build_gm_resolution_messages(rules: &str, state: &GameState) -> Vec<ChatMessage> {
    let actions = state
        .declared_actions
        .iter()
        .map(|a| format!("{}: {} | 骰子: {}", a.character_name, a.action, format_roll(&a.roll)))
        .collect::<Vec<_>>()
        .join("\n");

    let recent = state.recent_log(RESOLUTION_LOG_WINDOW);
    let log = if recent.is_empty() {
        String::new()
    } else {
        format!("\n\n最近事件：\n{}", format_log_digest(recent))
    };

    vec![
        ChatMessage::system(build_gm_system_prompt(rules, state)),
        ChatMessage::user(format!(
            "本轮所有角色的行动和骰子结果如下：\n{}{}\n\n请裁定结果并叙述发生了什么。如有HP变动或状态变化，请在末尾标注。",
            actions, log
        )),
    ]
}

/// System prompt for a character: persona, scene and recent events
pub fn build_character_action_prompt(character: &Character, state: &GameState) -> String {
    let recent = state.recent_log(ACTION_LOG_WINDOW);
    let log = if recent.is_empty() {
        String::new()
    } else {
        format!("\n\n【最近发生的事】\n{}", format_log_digest(recent))
    };

    format!(
        "{}\n\n【游戏模式】\n你正在参与一个桌游RPG。当前场景：{}{}\n\n\
         根据当前局势和你的性格，宣布你想要采取的行动。\n\
         回复格式：简短描述你的行动（1-2句话），以动作开头。例如：\"举剑向敌人发起攻击。\" 或 \"尝试说服对方放下武器。\"",
        character.generation.persona, state.scene, log
    )
}

/// Messages asking a character to declare one action
pub fn build_character_action_messages(character: &Character, state: &GameState) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(build_character_action_prompt(character, state)),
        ChatMessage::user(CHARACTER_TURN_PROMPT),
    ]
}
