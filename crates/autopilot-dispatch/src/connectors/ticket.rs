//! Ticketing connector for a Linear-style GraphQL API.

use async_trait::async_trait;
use serde_json::Value;
use tracing::{error, info};

use autopilot_core::config::TicketConfig;
use autopilot_core::types::ActionType;

use crate::connector::{ActionPreview, Connector, ConnectorReport};
use crate::connectors::{ellipsize, REQUEST_TIMEOUT};
use crate::error::DispatchError;

const CREATE_ISSUE_MUTATION: &str = "\
mutation CreateIssue($input: IssueCreateInput!) {
  issueCreate(input: $input) {
    success
    issue {
      id
      identifier
      url
      title
    }
  }
}";

/// Creates issues through the ticketing system's GraphQL endpoint.
pub struct TicketConnector {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    team_id: String,
}

impl TicketConnector {
    pub fn new(config: &TicketConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url: config.api_url.clone(),
            api_key: config.api_key.clone(),
            team_id: config.team_id.clone(),
        }
    }
}

/// API priority scale: 1 is most urgent, 4 least.
fn priority_number(priority: &str) -> i64 {
    match priority {
        "urgent" => 1,
        "high" => 2,
        "low" => 4,
        _ => 3,
    }
}

#[async_trait]
impl Connector for TicketConnector {
    fn action_type(&self) -> ActionType {
        ActionType::CreateTicket
    }

    async fn preview(&self, payload: &Value) -> Result<ActionPreview, DispatchError> {
        let title = payload.get("title").and_then(Value::as_str).unwrap_or("Untitled");
        let description = payload.get("description").and_then(Value::as_str).unwrap_or("");
        let priority = payload.get("priority").and_then(Value::as_str).unwrap_or("medium");
        Ok(ActionPreview {
            preview: format!(
                "Ticket: [{}] {}\n{}",
                priority.to_uppercase(),
                title,
                ellipsize(description, 200)
            ),
            details: serde_json::json!({ "title": title, "priority": priority }),
        })
    }

    async fn execute(&self, payload: &Value) -> Result<ConnectorReport, DispatchError> {
        if self.api_key.is_empty() {
            return Ok(ConnectorReport::failed("Ticket API key not configured"));
        }

        let title = payload.get("title").and_then(Value::as_str).unwrap_or("Untitled Issue");
        let description = payload.get("description").and_then(Value::as_str).unwrap_or("");
        let priority = payload.get("priority").and_then(Value::as_str).unwrap_or("medium");
        let team_id = payload
            .get("team_id")
            .and_then(Value::as_str)
            .filter(|t| !t.is_empty())
            .unwrap_or(&self.team_id);

        let mut input = serde_json::json!({
            "title": title,
            "description": description,
            "priority": priority_number(priority),
        });
        if !team_id.is_empty() {
            input["teamId"] = Value::String(team_id.to_string());
        }

        let resp = self
            .client
            .post(&self.api_url)
            .timeout(REQUEST_TIMEOUT)
            .header("Authorization", &self.api_key)
            .json(&serde_json::json!({
                "query": CREATE_ISSUE_MUTATION,
                "variables": { "input": input },
            }))
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Ok(ConnectorReport::failed(format!(
                "Ticket API returned {}",
                status.as_u16()
            )));
        }

        let data: Value = resp.json().await?;

        if let Some(errors) = data.get("errors").and_then(Value::as_array) {
            let message = errors
                .first()
                .and_then(|e| e.get("message"))
                .and_then(Value::as_str)
                .unwrap_or("GraphQL error");
            error!(error = message, "Ticket API error");
            return Ok(ConnectorReport::failed(ellipsize(message, 300)));
        }

        let issue_create = &data["data"]["issueCreate"];
        if issue_create["success"].as_bool() != Some(true) {
            return Ok(ConnectorReport::failed("issueCreate returned success=false"));
        }

        let issue = &issue_create["issue"];
        let identifier = issue["identifier"].as_str().unwrap_or("");
        info!(identifier, "Ticket created");
        Ok(ConnectorReport::success(serde_json::json!({
            "id": issue["id"],
            "identifier": identifier,
            "url": issue["url"],
            "summary": format!(
                "Created issue {}: {}",
                identifier,
                issue["title"].as_str().unwrap_or("")
            ),
        })))
    }
}
