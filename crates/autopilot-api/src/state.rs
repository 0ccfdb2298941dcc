//! Application state shared across route handlers.

use std::sync::Arc;
use std::time::Instant;

use autopilot_core::config::AutopilotConfig;
use autopilot_knowledge::KnowledgeService;
use autopilot_pipeline::PipelineRunner;
use autopilot_store::Database;

/// Shared application state, cheap to clone into handler tasks.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AutopilotConfig>,
    pub database: Arc<Database>,
    pub knowledge: Arc<KnowledgeService>,
    pub runner: Arc<PipelineRunner>,
    /// Server start time for uptime reporting.
    pub start_time: Instant,
}

impl AppState {
    pub fn new(
        config: AutopilotConfig,
        database: Arc<Database>,
        knowledge: Arc<KnowledgeService>,
        runner: Arc<PipelineRunner>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            database,
            knowledge,
            runner,
            start_time: Instant::now(),
        }
    }
}
