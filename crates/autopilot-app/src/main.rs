//! Autopilot application binary - composition root.
//!
//! Ties together all Autopilot crates into a single executable:
//! 1. Load configuration from TOML
//! 2. Open SQLite storage and run migrations
//! 3. Build the knowledge service and rehydrate the vector index
//! 4. Build the connector registry and dispatch engine from config
//! 5. Wire the pipeline runner and start the axum REST API server

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;

use autopilot_api::{start_server, AppState};
use autopilot_core::config::AutopilotConfig;
use autopilot_dispatch::connectors::{EmailConnector, SlackConnector, TicketConnector};
use autopilot_dispatch::{ConnectorRegistry, DispatchEngine, UnconfiguredCalendar};
use autopilot_knowledge::{KnowledgeService, MockEmbedding};
use autopilot_pipeline::{
    PassthroughTranscriber, PipelineRunner, RuleBasedExtractor, TemplateDrafter,
};
use autopilot_store::{Database, RunRepository};

mod cli;

use cli::CliArgs;

/// Expand ~ to home directory in a path string.
fn resolve_data_dir(data_dir: &str) -> PathBuf {
    if data_dir.starts_with("~/") || data_dir.starts_with("~\\") {
        #[cfg(target_os = "windows")]
        let home = std::env::var("USERPROFILE").unwrap_or_else(|_| ".".to_string());
        #[cfg(not(target_os = "windows"))]
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
        PathBuf::from(home).join(&data_dir[2..])
    } else {
        PathBuf::from(data_dir)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    // Config.
    let config_file = args.resolve_config_path();
    let mut config = AutopilotConfig::load_or_default(&config_file);
    if let Some(dir) = args.resolve_data_dir() {
        config.general.data_dir = dir;
    }
    if let Some(level) = args.resolve_log_level() {
        config.general.log_level = level;
    }
    config.general.port = args.resolve_port(config.general.port);

    // Tracing.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new(config.general.log_level.clone())
            }),
        )
        .init();

    tracing::info!("Starting Autopilot v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(path = %config_file.display(), "Configuration loaded");

    // Storage.
    let data_dir = resolve_data_dir(&config.general.data_dir);
    if let Err(e) = std::fs::create_dir_all(&data_dir) {
        tracing::error!(path = %data_dir.display(), error = %e, "Failed to create data directory");
        return Err(e.into());
    }

    let db_path = data_dir.join("autopilot.db");
    let database = Arc::new(Database::new(&db_path)?);
    tracing::info!(path = %db_path.display(), "SQLite database opened");

    // Knowledge service with index rehydration from the chunk store.
    let knowledge = Arc::new(KnowledgeService::new(
        Arc::clone(&database),
        Arc::new(MockEmbedding::new()),
        config.knowledge.clone(),
    ));
    let rehydrated = knowledge.load()?;
    tracing::info!(chunks = rehydrated, "Knowledge index ready");

    // Connector registry from config.
    let mut registry = ConnectorRegistry::new();
    registry.register(Arc::new(SlackConnector::new(&config.slack)));
    registry.register(Arc::new(TicketConnector::new(&config.ticket)));
    registry.register(Arc::new(EmailConnector::new(&config.email)));
    let dispatch = Arc::new(DispatchEngine::new(
        registry,
        Arc::new(UnconfiguredCalendar),
    ));
    tracing::info!("Dispatch engine ready");

    // Pipeline runner with the built-in deterministic collaborators.
    let runner = Arc::new(PipelineRunner::new(
        RunRepository::new(Arc::clone(&database)),
        Arc::clone(&knowledge),
        dispatch,
        Arc::new(PassthroughTranscriber),
        Arc::new(RuleBasedExtractor),
        Arc::new(TemplateDrafter),
        config.slack.clone(),
    ));

    // API server.
    let state = AppState::new(config, database, knowledge, runner);
    start_server(state).await?;

    Ok(())
}
