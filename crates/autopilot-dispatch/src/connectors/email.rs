//! Email connector via an HTTP mail-relay service.

use async_trait::async_trait;
use serde_json::Value;
use tracing::{error, info};

use autopilot_core::config::EmailConfig;
use autopilot_core::types::ActionType;

use crate::connector::{ActionPreview, Connector, ConnectorReport};
use crate::connectors::{ellipsize, REQUEST_TIMEOUT};
use crate::error::DispatchError;

/// Sends follow-up emails through a JSON mail-relay endpoint.
pub struct EmailConnector {
    client: reqwest::Client,
    relay_url: String,
    api_key: String,
    from_address: String,
}

impl EmailConnector {
    pub fn new(config: &EmailConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            relay_url: config.relay_url.clone(),
            api_key: config.api_key.clone(),
            from_address: config.from_address.clone(),
        }
    }
}

#[async_trait]
impl Connector for EmailConnector {
    fn action_type(&self) -> ActionType {
        ActionType::SendEmailFollowup
    }

    async fn preview(&self, payload: &Value) -> Result<ActionPreview, DispatchError> {
        let to = payload.get("to").and_then(Value::as_str).unwrap_or("");
        let subject = payload.get("subject").and_then(Value::as_str).unwrap_or("");
        let body = payload.get("body").and_then(Value::as_str).unwrap_or("");
        Ok(ActionPreview {
            preview: format!(
                "Email → {}\nSubject: {}\nBody: {}",
                to,
                subject,
                ellipsize(body, 200)
            ),
            details: serde_json::json!({ "to": to, "subject": subject }),
        })
    }

    async fn execute(&self, payload: &Value) -> Result<ConnectorReport, DispatchError> {
        if self.relay_url.is_empty() {
            return Ok(ConnectorReport::failed("Mail relay URL not configured"));
        }

        let to = payload.get("to").and_then(Value::as_str).unwrap_or("");
        if to.is_empty() {
            return Ok(ConnectorReport::failed("Recipient email (to) is required"));
        }
        let subject = payload.get("subject").and_then(Value::as_str).unwrap_or("");
        let body = payload.get("body").and_then(Value::as_str).unwrap_or("");

        let mut request = self
            .client
            .post(&self.relay_url)
            .timeout(REQUEST_TIMEOUT)
            .json(&serde_json::json!({
                "from": self.from_address,
                "to": to,
                "subject": subject,
                "body": body,
            }));
        if !self.api_key.is_empty() {
            request = request.bearer_auth(&self.api_key);
        }

        let resp = request.send().await?;
        let status = resp.status();

        if status.is_success() {
            info!(to, subject, "Email sent");
            Ok(ConnectorReport::success(serde_json::json!({
                "summary": format!("Email sent to {}: {}", to, subject),
            })))
        } else {
            let text = resp.text().await.unwrap_or_default();
            error!(status = status.as_u16(), "Mail relay rejected message");
            Ok(ConnectorReport::failed(format!(
                "Mail relay returned {}: {}",
                status.as_u16(),
                ellipsize(&text, 200)
            )))
        }
    }
}
