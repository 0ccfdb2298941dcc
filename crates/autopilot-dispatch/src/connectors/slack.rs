//! Slack connector via incoming webhook.

use async_trait::async_trait;
use serde_json::Value;
use tracing::{error, info};

use autopilot_core::config::SlackConfig;
use autopilot_core::types::ActionType;

use crate::connector::{ActionPreview, Connector, ConnectorReport};
use crate::connectors::{ellipsize, REQUEST_TIMEOUT};
use crate::error::DispatchError;

/// Posts summary messages to a Slack incoming webhook.
pub struct SlackConnector {
    client: reqwest::Client,
    webhook_url: String,
}

impl SlackConnector {
    pub fn new(config: &SlackConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            webhook_url: config.webhook_url.clone(),
        }
    }
}

#[async_trait]
impl Connector for SlackConnector {
    fn action_type(&self) -> ActionType {
        ActionType::SendSlackSummary
    }

    async fn preview(&self, payload: &Value) -> Result<ActionPreview, DispatchError> {
        let channel = payload.get("channel").and_then(Value::as_str).unwrap_or("#general");
        let message = payload.get("message").and_then(Value::as_str).unwrap_or("");
        Ok(ActionPreview {
            preview: format!("Slack → {}: {}", channel, ellipsize(message, 200)),
            details: serde_json::json!({
                "channel": channel,
                "message_length": message.chars().count(),
            }),
        })
    }

    async fn execute(&self, payload: &Value) -> Result<ConnectorReport, DispatchError> {
        if self.webhook_url.is_empty() {
            return Ok(ConnectorReport::failed("Slack webhook URL not configured"));
        }

        let message = payload.get("message").and_then(Value::as_str).unwrap_or("");
        if message.is_empty() {
            return Ok(ConnectorReport::failed("Empty message"));
        }

        let mut body = serde_json::json!({ "text": message });
        if let Some(channel) = payload.get("channel").and_then(Value::as_str) {
            body["channel"] = Value::String(channel.to_string());
        }

        let resp = self
            .client
            .post(&self.webhook_url)
            .timeout(REQUEST_TIMEOUT)
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        let text = resp.text().await.unwrap_or_default();

        // Incoming webhooks answer a literal "ok" body on success.
        if status.as_u16() == 200 && text == "ok" {
            info!(length = message.chars().count(), "Slack message sent");
            Ok(ConnectorReport::success(serde_json::json!({
                "summary": format!("Message sent to Slack ({} chars)", message.chars().count()),
            })))
        } else {
            error!(status = status.as_u16(), "Slack webhook rejected message");
            Ok(ConnectorReport::failed(format!(
                "Slack returned {}: {}",
                status.as_u16(),
                ellipsize(&text, 200)
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn connector() -> SlackConnector {
        SlackConnector::new(&SlackConfig::default())
    }

    #[tokio::test]
    async fn test_preview_truncates_long_message() {
        let payload = serde_json::json!({
            "channel": "#sales",
            "message": "m".repeat(300),
        });
        let preview = connector().preview(&payload).await.unwrap();
        assert!(preview.preview.starts_with("Slack → #sales: "));
        assert!(preview.preview.ends_with('…'));
        assert_eq!(preview.details["message_length"], 300);
    }

    #[tokio::test]
    async fn test_preview_defaults_channel() {
        let payload = serde_json::json!({ "message": "hello" });
        let preview = connector().preview(&payload).await.unwrap();
        assert_eq!(preview.preview, "Slack → #general: hello");
    }

    #[tokio::test]
    async fn test_execute_unconfigured() {
        let payload = serde_json::json!({ "message": "hello" });
        let report = connector().execute(&payload).await.unwrap();
        assert_eq!(report.status, "failed");
        assert!(report.result["error"].as_str().unwrap().contains("not configured"));
    }

    #[tokio::test]
    async fn test_execute_empty_message() {
        let config = SlackConfig {
            webhook_url: "https://hooks.slack.example/T000/B000".to_string(),
            ..SlackConfig::default()
        };
        let payload = serde_json::json!({});
        let report = SlackConnector::new(&config).execute(&payload).await.unwrap();
        assert_eq!(report.status, "failed");
        assert_eq!(report.result["error"], "Empty message");
    }
}
