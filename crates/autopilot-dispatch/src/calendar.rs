//! Calendar client interface.
//!
//! Meeting creation is special-cased in the engine rather than registered
//! as a connector: the calendar can report a scheduling conflict, which
//! maps to a blocked outcome with a remediation suggestion instead of a
//! plain failure.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::DispatchError;

/// A fully resolved meeting-creation request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeetingCommand {
    pub title: String,
    /// Calendar date, `YYYY-MM-DD`.
    pub date: String,
    /// Start time, `HH:MM`.
    pub start_time: String,
    /// End time, `HH:MM`.
    pub end_time: String,
    #[serde(default)]
    pub attendees: Vec<String>,
    /// BCP-47-ish language tag driving the calendar UI locale.
    #[serde(default = "default_locale")]
    pub locale: String,
}

fn default_locale() -> String {
    "en".to_string()
}

/// What the calendar did with a meeting command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarReport {
    pub success: bool,
    /// An overlapping event blocked creation.
    pub conflict: bool,
    pub message: String,
}

/// Checks availability and creates calendar events.
#[async_trait]
pub trait CalendarClient: Send + Sync {
    async fn check_and_create(&self, command: &MeetingCommand) -> Result<CalendarReport, DispatchError>;
}

/// Default calendar backend when no real integration is wired in.
///
/// Reports a non-conflict failure so meeting actions surface as failed
/// rather than silently succeeding.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnconfiguredCalendar;

#[async_trait]
impl CalendarClient for UnconfiguredCalendar {
    async fn check_and_create(&self, _command: &MeetingCommand) -> Result<CalendarReport, DispatchError> {
        Ok(CalendarReport {
            success: false,
            conflict: false,
            message: "Calendar integration is not configured".to_string(),
        })
    }
}

/// Preview string for a meeting payload, formatted locally without
/// touching the calendar.
pub fn calendar_preview(payload: &Value) -> String {
    let title = payload.get("title").and_then(Value::as_str).unwrap_or("Untitled");
    let date = payload.get("date").and_then(Value::as_str).unwrap_or("TBD");
    let start = payload.get("start_time").and_then(Value::as_str).unwrap_or("TBD");
    let end = payload.get("end_time").and_then(Value::as_str).unwrap_or("TBD");
    let attendees: Vec<&str> = payload
        .get("attendees")
        .and_then(Value::as_array)
        .map(|a| a.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();
    let att_str = if attendees.is_empty() {
        "none".to_string()
    } else {
        attendees.join(", ")
    };
    format!(
        "Calendar: {} on {} from {} to {} (attendees: {})",
        title, date, start, end, att_str
    )
}
