//! Roundtable Engine - terminal runner
//!
//! Usage: `roundtable-engine [setup-file]`
//!
//! The setup file path falls back to `SETUP_PATH`, then `session.toml`.

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use roundtable_engine::application::services::TurnOrchestrator;
use roundtable_engine::infrastructure::config::{load_setup, AppConfig};
use roundtable_engine::infrastructure::console::ConsoleDriver;
use roundtable_engine::infrastructure::openai_compat::OpenAiCompatClient;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "roundtable_engine=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    tracing::info!("Starting Roundtable Engine");

    // Load configuration
    let config = AppConfig::from_env()?;
    let setup_path = std::env::args().nth(1).unwrap_or_else(|| config.setup_path.clone());
    tracing::info!("Configuration loaded");
    tracing::info!("  LLM: {}", config.llm_base_url);
    tracing::info!("  GM model: {}", config.gm_model);
    tracing::info!("  Setup: {}", setup_path);

    let setup = load_setup(&setup_path)?;
    let state = setup
        .build_state()
        .with_context(|| format!("Invalid session setup in {}", setup_path))?;
    tracing::info!(
        characters = state.characters.len(),
        scene = %state.scene,
        "Session ready"
    );

    let client = OpenAiCompatClient::new(&config.llm_base_url).with_api_key(config.llm_api_key.clone());
    let orchestrator = TurnOrchestrator::new(client, state, config.gm_settings(setup.rules.as_deref()));

    ConsoleDriver::new(orchestrator).run().await
}
