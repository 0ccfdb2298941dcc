//! Shared types, error taxonomy, and configuration for the Autopilot
//! orchestration engine.

pub mod config;
pub mod error;
pub mod types;

pub use config::AutopilotConfig;
pub use error::{AutopilotError, Result};
