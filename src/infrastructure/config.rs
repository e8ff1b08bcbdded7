//! Application configuration

use std::env;
use std::str::FromStr;

use anyhow::{Context, Result};

use crate::application::dto::SessionSetup;
use crate::application::services::GmSettings;

/// Application configuration loaded from environment
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// OpenAI-compatible API base URL
    pub llm_base_url: String,
    /// Bearer token, if the endpoint needs one
    pub llm_api_key: Option<String>,

    /// Model used for GM narration and resolution
    pub gm_model: String,
    pub gm_temperature: f32,
    pub gm_max_tokens: u32,

    /// Session setup file (TOML, JSON or YAML)
    pub setup_path: String,
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let env_or = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_string());

        Ok(Self {
            llm_base_url: env_or("LLM_BASE_URL", "https://api.openai.com/v1"),
            llm_api_key: get("LLM_API_KEY").filter(|k| !k.is_empty()),

            gm_model: env_or("GM_MODEL", "gpt-4o-mini"),
            gm_temperature: parse_var("GM_TEMPERATURE", &env_or("GM_TEMPERATURE", "0.9"))?,
            gm_max_tokens: parse_var("GM_MAX_TOKENS", &env_or("GM_MAX_TOKENS", "2048"))?,

            setup_path: env_or("SETUP_PATH", "session.toml"),
        })
    }

    /// GM call parameters, with the setup's rules text when it has one
    pub fn gm_settings(&self, rules: Option<&str>) -> GmSettings {
        let settings = GmSettings::new(self.gm_model.clone())
            .with_temperature(self.gm_temperature)
            .with_max_tokens(self.gm_max_tokens);
        match rules.map(str::trim).filter(|r| !r.is_empty()) {
            Some(rules) => settings.with_rules(rules),
            None => settings,
        }
    }
}

fn parse_var<T>(key: &str, value: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value
        .trim()
        .parse()
        .with_context(|| format!("{} must be a valid number, got {:?}", key, value))
}

/// Load a session setup file; the format follows the file extension
pub fn load_setup(path: &str) -> Result<SessionSetup> {
    config::Config::builder()
        .add_source(config::File::with_name(path))
        .build()
        .with_context(|| format!("Failed to read setup file {}", path))?
        .try_deserialize::<SessionSetup>()
        .with_context(|| format!("Invalid setup file {}", path))
}
