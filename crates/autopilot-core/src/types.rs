//! Core types and value objects for the Autopilot pipeline.
//!
//! Defines the Run record, actions, extraction schema types, and their
//! supporting enumerations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Longest raw input retained on a run record, in characters.
pub const MAX_RAW_INPUT_CHARS: usize = 10_000;
/// Longest error message retained on a run record, in characters.
pub const MAX_ERROR_CHARS: usize = 1_000;

/// Truncate a string to at most `max` characters, respecting char boundaries.
pub fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        s.chars().take(max).collect()
    }
}

// =============================================================================
// Enums
// =============================================================================

/// Which pipeline variant a run executes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunType {
    Autopilot,
    VoiceSchedule,
}

impl fmt::Display for RunType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunType::Autopilot => write!(f, "autopilot"),
            RunType::VoiceSchedule => write!(f, "voice_schedule"),
        }
    }
}

impl std::str::FromStr for RunType {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "autopilot" => Ok(RunType::Autopilot),
            "voice_schedule" => Ok(RunType::VoiceSchedule),
            _ => Err(format!("Unknown run type: {}", s)),
        }
    }
}

/// The kind of input a run started from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputType {
    Audio,
    Text,
}

impl fmt::Display for InputType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputType::Audio => write!(f, "audio"),
            InputType::Text => write!(f, "text"),
        }
    }
}

impl std::str::FromStr for InputType {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "audio" => Ok(InputType::Audio),
            "text" => Ok(InputType::Text),
            _ => Err(format!("Unknown input type: {}", s)),
        }
    }
}

/// Run lifecycle states.
///
/// Status only moves forward through the pipeline order, except for the
/// absorbing `Error` state which is reachable from any non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Pending,
    Transcribed,
    Extracted,
    Drafted,
    Previewed,
    Executed,
    Error,
}

impl RunStatus {
    /// Position in the forward pipeline order. `Error` has no rank.
    fn rank(self) -> Option<u8> {
        match self {
            RunStatus::Pending => Some(0),
            RunStatus::Transcribed => Some(1),
            RunStatus::Extracted => Some(2),
            RunStatus::Drafted => Some(3),
            RunStatus::Previewed => Some(4),
            RunStatus::Executed => Some(5),
            RunStatus::Error => None,
        }
    }

    /// Whether this status accepts no further transitions.
    pub fn is_terminal(self) -> bool {
        matches!(self, RunStatus::Executed | RunStatus::Error)
    }

    /// Whether a transition from `self` to `to` is legal.
    ///
    /// Forward-only along the pipeline order (skips allowed, since not
    /// every stage changes status), plus `Error` from any live state.
    pub fn can_advance_to(self, to: RunStatus) -> bool {
        if to == RunStatus::Error {
            return !self.is_terminal();
        }
        match (self.rank(), to.rank()) {
            (Some(from), Some(to)) => to > from,
            _ => false,
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunStatus::Pending => write!(f, "pending"),
            RunStatus::Transcribed => write!(f, "transcribed"),
            RunStatus::Extracted => write!(f, "extracted"),
            RunStatus::Drafted => write!(f, "drafted"),
            RunStatus::Previewed => write!(f, "previewed"),
            RunStatus::Executed => write!(f, "executed"),
            RunStatus::Error => write!(f, "error"),
        }
    }
}

impl std::str::FromStr for RunStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(RunStatus::Pending),
            "transcribed" => Ok(RunStatus::Transcribed),
            "extracted" => Ok(RunStatus::Extracted),
            "drafted" => Ok(RunStatus::Drafted),
            "previewed" => Ok(RunStatus::Previewed),
            "executed" => Ok(RunStatus::Executed),
            "error" => Ok(RunStatus::Error),
            _ => Err(format!("Unknown run status: {}", s)),
        }
    }
}

/// Action types with a registered meaning.
///
/// Actions cross the wire with a free-form `action_type` string so that
/// unrecognized types can still be echoed back in a well-formed outcome;
/// parsing into this enum happens at the dispatch boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    None,
    CreateMeeting,
    SendSlackSummary,
    CreateTicket,
    SendEmailFollowup,
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionType::None => write!(f, "none"),
            ActionType::CreateMeeting => write!(f, "create_meeting"),
            ActionType::SendSlackSummary => write!(f, "send_slack_summary"),
            ActionType::CreateTicket => write!(f, "create_ticket"),
            ActionType::SendEmailFollowup => write!(f, "send_email_followup"),
        }
    }
}

impl std::str::FromStr for ActionType {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(ActionType::None),
            "create_meeting" => Ok(ActionType::CreateMeeting),
            "send_slack_summary" => Ok(ActionType::SendSlackSummary),
            "create_ticket" => Ok(ActionType::CreateTicket),
            "send_email_followup" => Ok(ActionType::SendEmailFollowup),
            _ => Err(format!("Unknown action type: {}", s)),
        }
    }
}

/// Outcome status of a dispatched action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    Success,
    Failed,
    /// The target system detected a conflict (e.g. a scheduling collision);
    /// carries a remediation suggestion in the result payload.
    Blocked,
    Skipped,
}

impl fmt::Display for OutcomeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutcomeStatus::Success => write!(f, "success"),
            OutcomeStatus::Failed => write!(f, "failed"),
            OutcomeStatus::Blocked => write!(f, "blocked"),
            OutcomeStatus::Skipped => write!(f, "skipped"),
        }
    }
}

impl std::str::FromStr for OutcomeStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "success" => Ok(OutcomeStatus::Success),
            "failed" => Ok(OutcomeStatus::Failed),
            "blocked" => Ok(OutcomeStatus::Blocked),
            "skipped" => Ok(OutcomeStatus::Skipped),
            _ => Err(format!("Unknown outcome status: {}", s)),
        }
    }
}

/// Classified intent of the utterance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    SalesLead,
    SupportIssue,
    SchedulingRequest,
    PricingQuestion,
    GeneralInquiry,
}

impl Intent {
    /// Human-readable label with underscores replaced by spaces,
    /// used when building retrieval queries.
    pub fn label(self) -> String {
        self.to_string().replace('_', " ")
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Intent::SalesLead => write!(f, "sales_lead"),
            Intent::SupportIssue => write!(f, "support_issue"),
            Intent::SchedulingRequest => write!(f, "scheduling_request"),
            Intent::PricingQuestion => write!(f, "pricing_question"),
            Intent::GeneralInquiry => write!(f, "general_inquiry"),
        }
    }
}

/// Urgency classification from extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
    Low,
    Medium,
    High,
}

impl fmt::Display for Urgency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Urgency::Low => write!(f, "low"),
            Urgency::Medium => write!(f, "medium"),
            Urgency::High => write!(f, "high"),
        }
    }
}

// =============================================================================
// Domain structs
// =============================================================================

/// A proposed or executed side effect against an external system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Action {
    pub action_type: String,
    #[serde(default = "empty_object")]
    pub payload: serde_json::Value,
    #[serde(default = "default_true")]
    pub requires_confirmation: bool,
    #[serde(default)]
    pub confirmed: bool,
    #[serde(default)]
    pub skip: bool,
    #[serde(default)]
    pub confidence: f64,
    /// Human-readable dry-run description, filled during the run step.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview: Option<String>,
}

fn empty_object() -> serde_json::Value {
    serde_json::json!({})
}

fn default_true() -> bool {
    true
}

impl Action {
    /// Parse the wire `action_type` string into the typed enum, if known.
    pub fn kind(&self) -> Option<ActionType> {
        self.action_type.parse().ok()
    }
}

/// Result of dispatching one action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionOutcome {
    pub action_type: String,
    pub status: OutcomeStatus,
    pub result: serde_json::Value,
}

/// Named entities pulled out of the transcript.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Entities {
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub contact_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
}

/// Structured intent produced by the extraction collaborator.
///
/// `intent`, `summary`, and `next_best_actions` are required; enum fields
/// reject unrecognized values. Use [`Extraction::from_value`] to validate
/// collaborator output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Extraction {
    #[serde(default = "default_language")]
    pub conversation_language: String,
    pub intent: Intent,
    #[serde(default)]
    pub urgency: Option<Urgency>,
    #[serde(default)]
    pub budget: Option<String>,
    #[serde(default)]
    pub product_interest: Vec<String>,
    #[serde(default)]
    pub entities: Entities,
    pub summary: String,
    pub next_best_actions: Vec<Action>,
    #[serde(default)]
    pub follow_up_questions: Vec<String>,
    #[serde(default)]
    pub confidence_notes: Vec<String>,
}

fn default_language() -> String {
    "en".to_string()
}

impl Default for Extraction {
    fn default() -> Self {
        Self {
            conversation_language: default_language(),
            intent: Intent::GeneralInquiry,
            urgency: None,
            budget: None,
            product_interest: Vec::new(),
            entities: Entities::default(),
            summary: String::new(),
            next_best_actions: Vec::new(),
            follow_up_questions: Vec::new(),
            confidence_notes: Vec::new(),
        }
    }
}

impl Extraction {
    /// Validate a raw JSON value against the extraction schema.
    ///
    /// Missing required fields or unrecognized enum values produce a
    /// schema error, kept distinct from collaborator transport failures.
    pub fn from_value(value: serde_json::Value) -> crate::error::Result<Self> {
        serde_json::from_value(value)
            .map_err(|e| crate::error::AutopilotError::Schema(e.to_string()))
    }
}

/// Drafted reply returned by the drafting collaborator.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReplyDraft {
    pub reply_text: String,
    #[serde(default)]
    pub citations: Vec<String>,
}

/// Unit of retrievable knowledge-base text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnowledgeChunk {
    pub document_name: String,
    pub chunk_index: usize,
    pub text: String,
}

/// A retrieved chunk with its similarity score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvidenceSnippet {
    pub document_name: String,
    pub chunk_index: usize,
    pub text: String,
    pub score: f64,
}

/// One persisted pipeline execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Run {
    pub run_id: Uuid,
    pub run_type: RunType,
    pub input_type: InputType,
    pub raw_input: String,
    pub transcript: Option<String>,
    pub extracted: Option<Extraction>,
    pub evidence: Option<Vec<EvidenceSnippet>>,
    pub reply_draft: Option<ReplyDraft>,
    pub actions: Option<Vec<Action>>,
    pub outcomes: Option<Vec<ActionOutcome>>,
    pub status: RunStatus,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Run {
    /// Create a fresh pending run, truncating oversized raw input.
    pub fn new(run_type: RunType, input_type: InputType, raw_input: &str) -> Self {
        let now = Utc::now();
        Self {
            run_id: Uuid::new_v4(),
            run_type,
            input_type,
            raw_input: truncate_chars(raw_input, MAX_RAW_INPUT_CHARS),
            transcript: None,
            extracted: None,
            evidence: None,
            reply_draft: None,
            actions: None,
            outcomes: None,
            status: RunStatus::Pending,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }
}
