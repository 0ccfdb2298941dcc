use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{AutopilotError, Result};

/// Top-level configuration for the Autopilot application.
///
/// Loaded from `~/.autopilot/config.toml` by default. Each section
/// corresponds to a bounded context or an external connector.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AutopilotConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub knowledge: KnowledgeConfig,
    #[serde(default)]
    pub slack: SlackConfig,
    #[serde(default)]
    pub ticket: TicketConfig,
    #[serde(default)]
    pub email: EmailConfig,
}

impl AutopilotConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: AutopilotConfig = toml::from_str(&content)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration, falling back to defaults if the file does not
    /// exist or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| AutopilotError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Data directory for the SQLite database.
    pub data_dir: String,
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
    /// HTTP listen port.
    pub port: u16,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            data_dir: "~/.autopilot/data".to_string(),
            log_level: "info".to_string(),
            port: 8080,
        }
    }
}

/// Knowledge-base ingestion and retrieval settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KnowledgeConfig {
    /// Target characters per chunk.
    pub chunk_size: usize,
    /// Trailing characters carried into the next chunk.
    pub chunk_overlap: usize,
    /// Number of evidence snippets returned per retrieval.
    pub top_k: usize,
    /// Maximum texts per embedding request.
    pub embed_batch_size: usize,
}

impl Default for KnowledgeConfig {
    fn default() -> Self {
        Self {
            chunk_size: 600,
            chunk_overlap: 100,
            top_k: 4,
            embed_batch_size: 100,
        }
    }
}

/// Slack incoming-webhook connector settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SlackConfig {
    /// Incoming webhook URL. Empty means unconfigured.
    pub webhook_url: String,
    /// Channel used when an action payload names none.
    pub default_channel: String,
}

impl Default for SlackConfig {
    fn default() -> Self {
        Self {
            webhook_url: String::new(),
            default_channel: "#general".to_string(),
        }
    }
}

/// Ticketing (GraphQL issue-tracker) connector settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TicketConfig {
    pub api_url: String,
    /// API key. Empty means unconfigured.
    pub api_key: String,
    /// Team the created issues belong to.
    pub team_id: String,
}

impl Default for TicketConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.linear.app/graphql".to_string(),
            api_key: String::new(),
            team_id: String::new(),
        }
    }
}

/// Email connector settings (HTTP mail relay).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmailConfig {
    /// Mail-relay endpoint accepting JSON {from, to, subject, body}.
    /// Empty means unconfigured.
    pub relay_url: String,
    pub api_key: String,
    pub from_address: String,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            relay_url: String::new(),
            api_key: String::new(),
            from_address: "autopilot@example.com".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AutopilotConfig::default();
        assert_eq!(config.general.port, 8080);
        assert_eq!(config.knowledge.chunk_size, 600);
        assert_eq!(config.knowledge.chunk_overlap, 100);
        assert_eq!(config.knowledge.top_k, 4);
        assert_eq!(config.knowledge.embed_batch_size, 100);
        assert_eq!(config.slack.default_channel, "#general");
        assert!(config.slack.webhook_url.is_empty());
        assert!(config.ticket.api_key.is_empty());
        assert!(config.email.relay_url.is_empty());
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let toml_str = r#"
            [general]
            port = 9000

            [slack]
            webhook_url = "https://hooks.slack.com/services/T/B/X"
        "#;
        let config: AutopilotConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.general.port, 9000);
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.slack.default_channel, "#general");
        assert_eq!(config.knowledge.chunk_size, 600);
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = AutopilotConfig::default();
        config.general.port = 9999;
        config.ticket.team_id = "TEAM-1".to_string();
        config.save(&path).unwrap();

        let loaded = AutopilotConfig::load(&path).unwrap();
        assert_eq!(loaded.general.port, 9999);
        assert_eq!(loaded.ticket.team_id, "TEAM-1");
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let config = AutopilotConfig::load_or_default(Path::new("/nonexistent/config.toml"));
        assert_eq!(config.general.port, 8080);
    }
}
