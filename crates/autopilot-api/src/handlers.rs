//! Route handler functions for all API endpoints.
//!
//! Each handler extracts path/query/body parameters via axum extractors,
//! interacts with AppState services, and returns JSON responses.

use axum::extract::{Path, Query, State};
use axum::Json;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use autopilot_core::types::{Action, ActionOutcome, InputType, Run, RunType};
use autopilot_knowledge::SourceDocument;
use autopilot_pipeline::{RunOutput, RunRequest};
use autopilot_store::RunRepository;

use crate::error::ApiError;
use crate::state::AppState;

// =============================================================================
// Request / response types
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct RunBody {
    /// Pipeline variant: "autopilot" (default) or "voice_schedule".
    pub run_type: Option<String>,
    /// Input mode: "audio" or "text".
    pub mode: String,
    /// Base64-encoded audio payload; required when mode is "audio".
    pub audio_base64: Option<String>,
    /// Utterance text; required when mode is "text".
    pub text: Option<String>,
    /// Language hint, defaults to "en".
    pub locale: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ConfirmBody {
    pub run_id: Uuid,
    /// The previewed actions, with `confirmed`/`skip` flags set by the user.
    #[serde(default)]
    pub actions: Vec<Action>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ConfirmResponse {
    pub run_id: Uuid,
    pub results: Vec<ActionOutcome>,
}

#[derive(Debug, Deserialize)]
pub struct IngestBody {
    #[serde(default)]
    pub documents: Vec<SourceDocument>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct IngestResponse {
    pub status: String,
    pub documents: usize,
    pub chunks: usize,
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RunSummaryResponse {
    pub run_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub input_type: String,
    pub status: String,
    pub error: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RunListResponse {
    pub runs: Vec<RunSummaryResponse>,
    pub limit: u64,
    pub offset: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    pub indexed_chunks: usize,
}

// =============================================================================
// Handlers
// =============================================================================

/// POST /autopilot/run - run the full pipeline on a new input.
pub async fn run(
    State(state): State<AppState>,
    Json(body): Json<RunBody>,
) -> Result<Json<RunOutput>, ApiError> {
    let run_type = match body.run_type.as_deref() {
        None => RunType::Autopilot,
        Some(raw) => raw
            .parse::<RunType>()
            .map_err(ApiError::BadRequest)?,
    };

    let mode = match body.mode.as_str() {
        "audio" => InputType::Audio,
        "text" => InputType::Text,
        other => {
            return Err(ApiError::BadRequest(format!(
                "Invalid mode '{}': expected 'audio' or 'text'",
                other
            )))
        }
    };

    let audio = match body.audio_base64 {
        Some(encoded) => Some(BASE64.decode(encoded.as_bytes()).map_err(|e| {
            ApiError::BadRequest(format!("Invalid base64 audio payload: {}", e))
        })?),
        None => None,
    };

    let request = RunRequest {
        run_type,
        mode,
        audio,
        text: body.text,
        locale: body.locale.unwrap_or_else(|| "en".to_string()),
    };

    let output = state.runner.run(request).await?;
    Ok(Json(output))
}

/// POST /autopilot/confirm - execute the confirmed actions of a run.
pub async fn confirm(
    State(state): State<AppState>,
    Json(body): Json<ConfirmBody>,
) -> Result<Json<ConfirmResponse>, ApiError> {
    let results = state.runner.confirm(body.run_id, &body.actions).await?;
    Ok(Json(ConfirmResponse {
        run_id: body.run_id,
        results,
    }))
}

/// POST /autopilot/ingest - rebuild the knowledge base from documents.
pub async fn ingest(
    State(state): State<AppState>,
    Json(body): Json<IngestBody>,
) -> Result<Json<IngestResponse>, ApiError> {
    let summary = state.knowledge.ingest(&body.documents).await?;
    Ok(Json(IngestResponse {
        status: "ok".to_string(),
        documents: summary.documents,
        chunks: summary.chunks,
    }))
}

/// GET /runs - list recent runs, newest first.
pub async fn list_runs(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<RunListResponse>, ApiError> {
    let limit = params.limit.unwrap_or(50).min(200);
    let offset = params.offset.unwrap_or(0);

    let repo = RunRepository::new(state.database.clone());
    let summaries = repo.list(limit, offset)?;

    let runs = summaries
        .into_iter()
        .map(|s| RunSummaryResponse {
            run_id: s.run_id,
            created_at: s.created_at,
            input_type: s.input_type.to_string(),
            status: s.status.to_string(),
            error: s.error,
        })
        .collect();

    Ok(Json(RunListResponse {
        runs,
        limit,
        offset,
    }))
}

/// GET /runs/{id} - fetch a single run with its full stage outputs.
pub async fn get_run(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Run>, ApiError> {
    let run_id = Uuid::parse_str(&id)
        .map_err(|_| ApiError::BadRequest(format!("Invalid run id '{}'", id)))?;

    let repo = RunRepository::new(state.database.clone());
    let run = repo
        .get(run_id)?
        .ok_or_else(|| ApiError::NotFound(format!("Run {} not found", run_id)))?;

    Ok(Json(run))
}

/// GET /health - health check.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        indexed_chunks: state.knowledge.indexed_chunks(),
    })
}
