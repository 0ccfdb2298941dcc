//! Repository for run records.
//!
//! Each update is a single atomic record write keyed by run id. Stage
//! fields are only ever appended or overwritten; an update never nulls a
//! field written by an earlier stage, and status is enforced forward-only.

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use rusqlite::OptionalExtension;
use uuid::Uuid;

use autopilot_core::error::AutopilotError;
use autopilot_core::types::{
    truncate_chars, Action, ActionOutcome, EvidenceSnippet, Extraction, InputType, ReplyDraft,
    Run, RunStatus, RunType, MAX_ERROR_CHARS,
};

use crate::db::Database;

/// Partial update to a run record. Unset fields are left untouched.
#[derive(Debug, Default, Clone)]
pub struct RunUpdate {
    pub transcript: Option<String>,
    pub extracted: Option<Extraction>,
    pub evidence: Option<Vec<EvidenceSnippet>>,
    pub reply_draft: Option<ReplyDraft>,
    pub actions: Option<Vec<Action>>,
    pub outcomes: Option<Vec<ActionOutcome>>,
    pub status: Option<RunStatus>,
    pub error: Option<String>,
}

impl RunUpdate {
    pub fn transcript(mut self, transcript: impl Into<String>) -> Self {
        self.transcript = Some(transcript.into());
        self
    }

    pub fn extracted(mut self, extracted: Extraction) -> Self {
        self.extracted = Some(extracted);
        self
    }

    pub fn evidence(mut self, evidence: Vec<EvidenceSnippet>) -> Self {
        self.evidence = Some(evidence);
        self
    }

    pub fn reply_draft(mut self, draft: ReplyDraft) -> Self {
        self.reply_draft = Some(draft);
        self
    }

    pub fn actions(mut self, actions: Vec<Action>) -> Self {
        self.actions = Some(actions);
        self
    }

    pub fn outcomes(mut self, outcomes: Vec<ActionOutcome>) -> Self {
        self.outcomes = Some(outcomes);
        self
    }

    pub fn status(mut self, status: RunStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn error(mut self, message: impl Into<String>) -> Self {
        self.error = Some(message.into());
        self
    }
}

/// Projection of a run for listings.
#[derive(Debug, Clone, serde::Serialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub input_type: InputType,
    pub status: RunStatus,
    pub error: Option<String>,
}

/// Repository for run records.
pub struct RunRepository {
    db: Arc<Database>,
}

impl RunRepository {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Insert a fresh run record.
    pub fn create(&self, run: &Run) -> Result<(), AutopilotError> {
        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO runs (run_id, run_type, input_type, raw_input, status, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                rusqlite::params![
                    run.run_id.to_string(),
                    run.run_type.to_string(),
                    run.input_type.to_string(),
                    run.raw_input,
                    run.status.to_string(),
                    run.created_at.timestamp(),
                    run.updated_at.timestamp(),
                ],
            )
            .map_err(|e| AutopilotError::Storage(format!("Failed to create run: {}", e)))?;
            Ok(())
        })
    }

    /// Apply a partial update to a run.
    ///
    /// Bumps `updated_at`. A status change that would move backward is
    /// rejected; the error message is truncated to the storage bound.
    pub fn update(&self, run_id: Uuid, update: RunUpdate) -> Result<(), AutopilotError> {
        self.db.with_conn(|conn| {
            if let Some(new_status) = update.status {
                let current: Option<String> = conn
                    .query_row(
                        "SELECT status FROM runs WHERE run_id = ?1",
                        rusqlite::params![run_id.to_string()],
                        |row| row.get(0),
                    )
                    .optional()
                    .map_err(|e| AutopilotError::Storage(e.to_string()))?;
                let current = current
                    .ok_or_else(|| AutopilotError::NotFound(run_id.to_string()))?
                    .parse::<RunStatus>()
                    .map_err(AutopilotError::Storage)?;
                if !current.can_advance_to(new_status) {
                    return Err(AutopilotError::Storage(format!(
                        "Illegal status transition: {} -> {}",
                        current, new_status
                    )));
                }
            }

            let mut sets: Vec<&str> = Vec::new();
            let mut values: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

            if let Some(transcript) = &update.transcript {
                sets.push("transcript = ?");
                values.push(Box::new(transcript.clone()));
            }
            if let Some(extracted) = &update.extracted {
                sets.push("extracted_json = ?");
                values.push(Box::new(serde_json::to_string(extracted)?));
            }
            if let Some(evidence) = &update.evidence {
                sets.push("evidence_json = ?");
                values.push(Box::new(serde_json::to_string(evidence)?));
            }
            if let Some(draft) = &update.reply_draft {
                sets.push("reply_draft_json = ?");
                values.push(Box::new(serde_json::to_string(draft)?));
            }
            if let Some(actions) = &update.actions {
                sets.push("actions_json = ?");
                values.push(Box::new(serde_json::to_string(actions)?));
            }
            if let Some(outcomes) = &update.outcomes {
                sets.push("outcomes_json = ?");
                values.push(Box::new(serde_json::to_string(outcomes)?));
            }
            if let Some(status) = update.status {
                sets.push("status = ?");
                values.push(Box::new(status.to_string()));
            }
            if let Some(error) = &update.error {
                sets.push("error = ?");
                values.push(Box::new(truncate_chars(error, MAX_ERROR_CHARS)));
            }

            sets.push("updated_at = ?");
            values.push(Box::new(Utc::now().timestamp()));
            values.push(Box::new(run_id.to_string()));

            let sql = format!("UPDATE runs SET {} WHERE run_id = ?", sets.join(", "));
            let changed = conn
                .execute(&sql, rusqlite::params_from_iter(values.iter()))
                .map_err(|e| AutopilotError::Storage(format!("Failed to update run: {}", e)))?;
            if changed == 0 {
                return Err(AutopilotError::NotFound(run_id.to_string()));
            }
            Ok(())
        })
    }

    /// Fetch a run by id.
    pub fn get(&self, run_id: Uuid) -> Result<Option<Run>, AutopilotError> {
        self.db.with_conn(|conn| {
            let row = conn
                .query_row(
                    "SELECT run_id, run_type, input_type, raw_input, transcript,
                            extracted_json, evidence_json, reply_draft_json, actions_json,
                            outcomes_json, status, error, created_at, updated_at
                     FROM runs WHERE run_id = ?1",
                    rusqlite::params![run_id.to_string()],
                    row_to_run,
                )
                .optional()
                .map_err(|e| AutopilotError::Storage(e.to_string()))?;
            match row {
                Some(run) => Ok(Some(run?)),
                None => Ok(None),
            }
        })
    }

    /// List recent runs, newest first.
    pub fn list(&self, limit: u64, offset: u64) -> Result<Vec<RunSummary>, AutopilotError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT run_id, created_at, input_type, status, error
                     FROM runs ORDER BY created_at DESC, run_id LIMIT ?1 OFFSET ?2",
                )
                .map_err(|e| AutopilotError::Storage(e.to_string()))?;

            let rows = stmt
                .query_map(rusqlite::params![limit, offset], |row| {
                    let run_id: String = row.get(0)?;
                    let created_at: i64 = row.get(1)?;
                    let input_type: String = row.get(2)?;
                    let status: String = row.get(3)?;
                    let error: Option<String> = row.get(4)?;
                    Ok((run_id, created_at, input_type, status, error))
                })
                .map_err(|e| AutopilotError::Storage(e.to_string()))?;

            let mut summaries = Vec::new();
            for row in rows {
                let (run_id, created_at, input_type, status, error) =
                    row.map_err(|e| AutopilotError::Storage(e.to_string()))?;
                summaries.push(RunSummary {
                    run_id: Uuid::parse_str(&run_id)
                        .map_err(|e| AutopilotError::Storage(e.to_string()))?,
                    created_at: Utc
                        .timestamp_opt(created_at, 0)
                        .single()
                        .unwrap_or_else(Utc::now),
                    input_type: input_type.parse().map_err(AutopilotError::Storage)?,
                    status: status.parse().map_err(AutopilotError::Storage)?,
                    error,
                });
            }
            Ok(summaries)
        })
    }
}

fn row_to_run(row: &rusqlite::Row<'_>) -> rusqlite::Result<Result<Run, AutopilotError>> {
    let run_id: String = row.get(0)?;
    let run_type: String = row.get(1)?;
    let input_type: String = row.get(2)?;
    let raw_input: String = row.get(3)?;
    let transcript: Option<String> = row.get(4)?;
    let extracted_json: Option<String> = row.get(5)?;
    let evidence_json: Option<String> = row.get(6)?;
    let reply_draft_json: Option<String> = row.get(7)?;
    let actions_json: Option<String> = row.get(8)?;
    let outcomes_json: Option<String> = row.get(9)?;
    let status: String = row.get(10)?;
    let error: Option<String> = row.get(11)?;
    let created_at: i64 = row.get(12)?;
    let updated_at: i64 = row.get(13)?;

    Ok(build_run(
        run_id,
        run_type,
        input_type,
        raw_input,
        transcript,
        extracted_json,
        evidence_json,
        reply_draft_json,
        actions_json,
        outcomes_json,
        status,
        error,
        created_at,
        updated_at,
    ))
}

#[allow(clippy::too_many_arguments)]
fn build_run(
    run_id: String,
    run_type: String,
    input_type: String,
    raw_input: String,
    transcript: Option<String>,
    extracted_json: Option<String>,
    evidence_json: Option<String>,
    reply_draft_json: Option<String>,
    actions_json: Option<String>,
    outcomes_json: Option<String>,
    status: String,
    error: Option<String>,
    created_at: i64,
    updated_at: i64,
) -> Result<Run, AutopilotError> {
    let extracted: Option<Extraction> = match extracted_json {
        Some(json) => Some(serde_json::from_str(&json)?),
        None => None,
    };
    let evidence: Option<Vec<EvidenceSnippet>> = match evidence_json {
        Some(json) => Some(serde_json::from_str(&json)?),
        None => None,
    };
    let reply_draft: Option<ReplyDraft> = match reply_draft_json {
        Some(json) => Some(serde_json::from_str(&json)?),
        None => None,
    };
    let actions: Option<Vec<Action>> = match actions_json {
        Some(json) => Some(serde_json::from_str(&json)?),
        None => None,
    };
    let outcomes: Option<Vec<ActionOutcome>> = match outcomes_json {
        Some(json) => Some(serde_json::from_str(&json)?),
        None => None,
    };

    Ok(Run {
        run_id: Uuid::parse_str(&run_id).map_err(|e| AutopilotError::Storage(e.to_string()))?,
        run_type: run_type
            .parse::<RunType>()
            .map_err(AutopilotError::Storage)?,
        input_type: input_type
            .parse::<InputType>()
            .map_err(AutopilotError::Storage)?,
        raw_input,
        transcript,
        extracted,
        evidence,
        reply_draft,
        actions,
        outcomes,
        status: status.parse::<RunStatus>().map_err(AutopilotError::Storage)?,
        error,
        created_at: Utc
            .timestamp_opt(created_at, 0)
            .single()
            .unwrap_or_else(Utc::now),
        updated_at: Utc
            .timestamp_opt(updated_at, 0)
            .single()
            .unwrap_or_else(Utc::now),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use autopilot_core::types::Intent;

    fn make_repo() -> RunRepository {
        RunRepository::new(Arc::new(Database::in_memory().unwrap()))
    }

    fn sample_extraction() -> Extraction {
        Extraction::from_value(serde_json::json!({
            "intent": "support_issue",
            "summary": "Customer reports a login failure.",
            "next_best_actions": []
        }))
        .unwrap()
    }

    #[test]
    fn test_create_and_get() {
        let repo = make_repo();
        let run = Run::new(RunType::Autopilot, InputType::Text, "Hello, I need help");
        repo.create(&run).unwrap();

        let fetched = repo.get(run.run_id).unwrap().unwrap();
        assert_eq!(fetched.run_id, run.run_id);
        assert_eq!(fetched.status, RunStatus::Pending);
        assert_eq!(fetched.raw_input, "Hello, I need help");
        assert!(fetched.transcript.is_none());
    }

    #[test]
    fn test_get_missing_returns_none() {
        let repo = make_repo();
        assert!(repo.get(Uuid::new_v4()).unwrap().is_none());
    }

    #[test]
    fn test_stagewise_updates_retain_earlier_fields() {
        let repo = make_repo();
        let run = Run::new(RunType::Autopilot, InputType::Text, "Hello");
        repo.create(&run).unwrap();

        repo.update(
            run.run_id,
            RunUpdate::default()
                .transcript("Hello")
                .status(RunStatus::Transcribed),
        )
        .unwrap();

        repo.update(
            run.run_id,
            RunUpdate::default()
                .extracted(sample_extraction())
                .status(RunStatus::Extracted),
        )
        .unwrap();

        let fetched = repo.get(run.run_id).unwrap().unwrap();
        assert_eq!(fetched.status, RunStatus::Extracted);
        // Transcript from the earlier stage survives the later update.
        assert_eq!(fetched.transcript.as_deref(), Some("Hello"));
        assert_eq!(
            fetched.extracted.as_ref().map(|e| e.intent),
            Some(Intent::SupportIssue)
        );
    }

    #[test]
    fn test_backward_status_rejected() {
        let repo = make_repo();
        let run = Run::new(RunType::Autopilot, InputType::Text, "Hello");
        repo.create(&run).unwrap();

        repo.update(
            run.run_id,
            RunUpdate::default()
                .transcript("Hello")
                .status(RunStatus::Transcribed),
        )
        .unwrap();

        let err = repo
            .update(run.run_id, RunUpdate::default().status(RunStatus::Pending))
            .unwrap_err();
        assert!(matches!(err, AutopilotError::Storage(_)));
        assert!(err.to_string().contains("Illegal status transition"));

        let fetched = repo.get(run.run_id).unwrap().unwrap();
        assert_eq!(fetched.status, RunStatus::Transcribed);
    }

    #[test]
    fn test_error_from_any_live_state() {
        let repo = make_repo();
        let run = Run::new(RunType::Autopilot, InputType::Audio, "base64...");
        repo.create(&run).unwrap();

        repo.update(
            run.run_id,
            RunUpdate::default()
                .status(RunStatus::Error)
                .error("decode failed"),
        )
        .unwrap();

        let fetched = repo.get(run.run_id).unwrap().unwrap();
        assert_eq!(fetched.status, RunStatus::Error);
        assert_eq!(fetched.error.as_deref(), Some("decode failed"));
    }

    #[test]
    fn test_error_message_truncated() {
        let repo = make_repo();
        let run = Run::new(RunType::Autopilot, InputType::Text, "Hello");
        repo.create(&run).unwrap();

        let long = "e".repeat(MAX_ERROR_CHARS + 200);
        repo.update(
            run.run_id,
            RunUpdate::default().status(RunStatus::Error).error(long),
        )
        .unwrap();

        let fetched = repo.get(run.run_id).unwrap().unwrap();
        assert_eq!(fetched.error.unwrap().chars().count(), MAX_ERROR_CHARS);
    }

    #[test]
    fn test_outcomes_persisted() {
        use autopilot_core::types::{ActionOutcome, OutcomeStatus};

        let repo = make_repo();
        let run = Run::new(RunType::Autopilot, InputType::Text, "Hello");
        repo.create(&run).unwrap();

        repo.update(
            run.run_id,
            RunUpdate::default()
                .outcomes(vec![ActionOutcome {
                    action_type: "send_slack_summary".to_string(),
                    status: OutcomeStatus::Success,
                    result: serde_json::json!({"summary": "sent"}),
                }])
                .status(RunStatus::Executed),
        )
        .unwrap();

        let fetched = repo.get(run.run_id).unwrap().unwrap();
        assert_eq!(fetched.status, RunStatus::Executed);
        let outcomes = fetched.outcomes.unwrap();
        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].status, OutcomeStatus::Success);
    }

    #[test]
    fn test_update_unknown_run() {
        let repo = make_repo();
        let err = repo
            .update(Uuid::new_v4(), RunUpdate::default().transcript("hi"))
            .unwrap_err();
        assert!(matches!(err, AutopilotError::NotFound(_)));
    }

    #[test]
    fn test_list_newest_first() {
        let repo = make_repo();
        for i in 0..3 {
            let mut run = Run::new(RunType::Autopilot, InputType::Text, &format!("input {}", i));
            // Make creation times distinct and increasing.
            run.created_at = Utc.timestamp_opt(1_700_000_000 + i, 0).single().unwrap();
            repo.create(&run).unwrap();
        }
        let listed = repo.list(10, 0).unwrap();
        assert_eq!(listed.len(), 3);
        assert!(listed[0].created_at >= listed[1].created_at);
        assert!(listed[1].created_at >= listed[2].created_at);

        let paged = repo.list(2, 2).unwrap();
        assert_eq!(paged.len(), 1);
    }
}
