//! LLM request building

pub mod prompt_builder;

pub use prompt_builder::{
    build_character_action_messages, build_gm_narration_messages, build_gm_resolution_messages,
    build_gm_system_prompt, format_log_digest, DEFAULT_GM_RULES,
};
