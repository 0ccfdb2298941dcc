//! Dispatch engine: routes actions to connectors and absorbs failures.

use std::sync::Arc;

use serde_json::Value;
use tracing::{error, info};

use autopilot_core::types::{truncate_chars, Action, ActionOutcome, ActionType, OutcomeStatus};

use crate::calendar::{calendar_preview, CalendarClient, MeetingCommand};
use crate::connector::ConnectorRegistry;

const PREVIEW_ERROR_CHARS: usize = 200;
const EXECUTE_ERROR_CHARS: usize = 300;

/// Routes previews and executions to the right connector.
///
/// Both entry points are total: connector and calendar failures become
/// preview strings or failed outcomes, never errors bubbling up to the
/// orchestrator.
pub struct DispatchEngine {
    registry: ConnectorRegistry,
    calendar: Arc<dyn CalendarClient>,
}

impl DispatchEngine {
    pub fn new(registry: ConnectorRegistry, calendar: Arc<dyn CalendarClient>) -> Self {
        Self { registry, calendar }
    }

    /// Describe what the action would do, without side effects.
    pub async fn preview_action(&self, action: &Action) -> String {
        match action.kind() {
            Some(ActionType::None) => "No action needed.".to_string(),
            Some(ActionType::CreateMeeting) => calendar_preview(&action.payload),
            Some(kind) => match self.registry.get(kind) {
                Some(connector) => match connector.preview(&action.payload).await {
                    Ok(preview) => preview.preview,
                    Err(e) => {
                        error!(action_type = %action.action_type, error = %e, "Preview failed");
                        format!("Preview error: {}", truncate_chars(&e.to_string(), PREVIEW_ERROR_CHARS))
                    }
                },
                None => format!("Unknown action type: {}", action.action_type),
            },
            None => format!("Unknown action type: {}", action.action_type),
        }
    }

    /// Execute one confirmed action.
    pub async fn execute_action(&self, action: &Action, lang: &str) -> ActionOutcome {
        match action.kind() {
            Some(ActionType::None) => ActionOutcome {
                action_type: action.action_type.clone(),
                status: OutcomeStatus::Skipped,
                result: serde_json::json!({}),
            },
            Some(ActionType::CreateMeeting) => self.execute_calendar(action, lang).await,
            Some(kind) => match self.registry.get(kind) {
                Some(connector) => match connector.execute(&action.payload).await {
                    Ok(report) => {
                        let status = report.status.parse().unwrap_or(OutcomeStatus::Failed);
                        info!(action_type = %action.action_type, status = %status, "Action executed");
                        ActionOutcome {
                            action_type: action.action_type.clone(),
                            status,
                            result: report.result,
                        }
                    }
                    Err(e) => {
                        error!(action_type = %action.action_type, error = %e, "Execute failed");
                        failed_outcome(&action.action_type, &e.to_string())
                    }
                },
                None => failed_outcome(
                    &action.action_type,
                    &format!("Unknown action type: {}", action.action_type),
                ),
            },
            None => failed_outcome(
                &action.action_type,
                &format!("Unknown action type: {}", action.action_type),
            ),
        }
    }

    async fn execute_calendar(&self, action: &Action, lang: &str) -> ActionOutcome {
        let command = match meeting_command(&action.payload, lang) {
            Ok(command) => command,
            Err(message) => return failed_outcome(&action.action_type, &message),
        };

        match self.calendar.check_and_create(&command).await {
            Ok(report) if report.conflict => ActionOutcome {
                action_type: action.action_type.clone(),
                status: OutcomeStatus::Blocked,
                result: serde_json::json!({
                    "conflict": true,
                    "message": report.message,
                    "suggestion": "Please choose a different time slot.",
                }),
            },
            Ok(report) if report.success => ActionOutcome {
                action_type: action.action_type.clone(),
                status: OutcomeStatus::Success,
                result: serde_json::json!({
                    "message": report.message,
                    "summary": format!(
                        "Created: {} on {} {}-{}",
                        command.title, command.date, command.start_time, command.end_time
                    ),
                }),
            },
            Ok(report) => ActionOutcome {
                action_type: action.action_type.clone(),
                status: OutcomeStatus::Failed,
                result: serde_json::json!({ "message": report.message }),
            },
            Err(e) => {
                error!(error = %e, "Calendar execution error");
                failed_outcome(&action.action_type, &e.to_string())
            }
        }
    }
}

/// Resolve a meeting payload into a command; enrichment should already
/// have filled the scheduling fields.
fn meeting_command(payload: &Value, lang: &str) -> Result<MeetingCommand, String> {
    let field = |name: &str| -> Result<String, String> {
        payload
            .get(name)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .ok_or_else(|| format!("Missing meeting field: {}", name))
    };

    Ok(MeetingCommand {
        title: payload
            .get("title")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .unwrap_or("Meeting")
            .to_string(),
        date: field("date")?,
        start_time: field("start_time")?,
        end_time: field("end_time")?,
        attendees: payload
            .get("attendees")
            .and_then(Value::as_array)
            .map(|a| a.iter().filter_map(Value::as_str).map(str::to_string).collect())
            .unwrap_or_default(),
        locale: lang.to_string(),
    })
}

fn failed_outcome(action_type: &str, error: &str) -> ActionOutcome {
    ActionOutcome {
        action_type: action_type.to_string(),
        status: OutcomeStatus::Failed,
        result: serde_json::json!({ "error": truncate_chars(error, EXECUTE_ERROR_CHARS) }),
    }
}
