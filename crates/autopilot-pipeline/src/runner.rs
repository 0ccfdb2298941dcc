//! The pipeline runner: run step and confirm step.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{error, info};
use uuid::Uuid;

use autopilot_core::config::SlackConfig;
use autopilot_core::error::{AutopilotError, Result};
use autopilot_core::types::{
    truncate_chars, Action, ActionOutcome, ActionType, EvidenceSnippet, Extraction, InputType,
    Intent, OutcomeStatus, ReplyDraft, Run, RunStatus, RunType,
};
use autopilot_dispatch::{enrich_actions, DispatchEngine};
use autopilot_knowledge::{build_query, KnowledgeService};
use autopilot_store::{RunRepository, RunUpdate};

use crate::collaborators::{Drafter, Extractor, Transcriber};

/// A request to start a run.
#[derive(Debug, Clone)]
pub struct RunRequest {
    /// Which pipeline variant to execute.
    pub run_type: RunType,
    pub mode: InputType,
    /// Decoded audio bytes; required in audio mode.
    pub audio: Option<Vec<u8>>,
    /// Utterance text; required in text mode.
    pub text: Option<String>,
    /// Language hint for transcription and calendar execution.
    pub locale: String,
}

/// Everything the run step produced, returned to the caller for the
/// confirmation round-trip.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunOutput {
    pub run_id: Uuid,
    pub transcript: String,
    pub extracted: Extraction,
    pub evidence: Vec<EvidenceSnippet>,
    pub reply_draft: ReplyDraft,
    pub actions_preview: Vec<Action>,
}

/// Drives a run through its stages, persisting after each one.
///
/// A stage failure marks the run as errored but keeps everything the
/// earlier stages already wrote.
pub struct PipelineRunner {
    runs: RunRepository,
    knowledge: Arc<KnowledgeService>,
    dispatch: Arc<DispatchEngine>,
    transcriber: Arc<dyn Transcriber>,
    extractor: Arc<dyn Extractor>,
    drafter: Arc<dyn Drafter>,
    slack: SlackConfig,
}

impl PipelineRunner {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        runs: RunRepository,
        knowledge: Arc<KnowledgeService>,
        dispatch: Arc<DispatchEngine>,
        transcriber: Arc<dyn Transcriber>,
        extractor: Arc<dyn Extractor>,
        drafter: Arc<dyn Drafter>,
        slack: SlackConfig,
    ) -> Self {
        Self {
            runs,
            knowledge,
            dispatch,
            transcriber,
            extractor,
            drafter,
            slack,
        }
    }

    /// Run step: transcribe, extract, retrieve, draft, and preview.
    pub async fn run(&self, request: RunRequest) -> Result<RunOutput> {
        let raw_input = match request.mode {
            InputType::Audio => {
                let audio = request.audio.as_deref().unwrap_or_default();
                if audio.is_empty() {
                    return Err(AutopilotError::Input(
                        "audio is required for audio mode".to_string(),
                    ));
                }
                format!("[audio input: {} bytes]", audio.len())
            }
            InputType::Text => match request.text.as_deref() {
                Some(text) if !text.is_empty() => text.to_string(),
                _ => {
                    return Err(AutopilotError::Input(
                        "text is required for text mode".to_string(),
                    ))
                }
            },
        };

        let run = Run::new(request.run_type, request.mode, &raw_input);
        self.runs.create(&run)?;
        info!(run_id = %run.run_id, run_type = %request.run_type, mode = %request.mode, "Run started");

        match self.execute_stages(run.run_id, &request).await {
            Ok(output) => Ok(output),
            Err(e) => {
                error!(run_id = %run.run_id, error = %e, "Run failed");
                if let Err(update_err) = self.runs.update(
                    run.run_id,
                    RunUpdate::default()
                        .status(RunStatus::Error)
                        .error(e.to_string()),
                ) {
                    error!(run_id = %run.run_id, error = %update_err, "Failed to record run error");
                }
                Err(e)
            }
        }
    }

    async fn execute_stages(&self, run_id: Uuid, request: &RunRequest) -> Result<RunOutput> {
        // Stage 1: transcription.
        let transcript = match request.mode {
            InputType::Audio => {
                let audio = request.audio.as_deref().unwrap_or_default();
                self.transcriber.transcribe(audio, &request.locale).await?
            }
            InputType::Text => request.text.as_deref().unwrap_or_default().trim().to_string(),
        };
        if transcript.is_empty() {
            return Err(AutopilotError::Input("Empty transcript".to_string()));
        }
        self.runs.update(
            run_id,
            RunUpdate::default()
                .transcript(transcript.clone())
                .status(RunStatus::Transcribed),
        )?;

        if request.run_type == RunType::VoiceSchedule {
            return self.voice_schedule_stages(run_id, &transcript).await;
        }

        // Stage 2: structured extraction.
        let extracted = self.extractor.extract(&transcript, run_id).await?;
        self.runs.update(
            run_id,
            RunUpdate::default()
                .extracted(extracted.clone())
                .status(RunStatus::Extracted),
        )?;

        // Stage 3: evidence retrieval.
        let query = build_query(&extracted);
        let evidence = self.knowledge.retrieve(&query).await?;
        self.runs
            .update(run_id, RunUpdate::default().evidence(evidence.clone()))?;

        // Stage 4: reply draft.
        let reply_draft = self.drafter.draft(&transcript, &extracted, &evidence).await?;
        self.runs.update(
            run_id,
            RunUpdate::default()
                .reply_draft(reply_draft.clone())
                .status(RunStatus::Drafted),
        )?;

        // Stage 5: enrich actions and attach dry-run previews.
        let mut actions_preview = enrich_actions(
            &extracted.next_best_actions,
            &extracted,
            Some(&reply_draft),
            &self.slack,
        );
        for action in &mut actions_preview {
            action.preview = Some(self.dispatch.preview_action(action).await);
        }
        self.runs.update(
            run_id,
            RunUpdate::default()
                .actions(actions_preview.clone())
                .status(RunStatus::Previewed),
        )?;

        info!(run_id = %run_id, actions = actions_preview.len(), "Run previewed");

        Ok(RunOutput {
            run_id,
            transcript,
            extracted,
            evidence,
            reply_draft,
            actions_preview,
        })
    }

    /// Voice-schedule variant: the utterance is a meeting request, so the
    /// run goes straight from transcript to a single calendar action. No
    /// knowledge retrieval; the draft is a spoken-back confirmation of the
    /// proposed slot.
    async fn voice_schedule_stages(&self, run_id: Uuid, transcript: &str) -> Result<RunOutput> {
        let extracted = Extraction {
            intent: Intent::SchedulingRequest,
            summary: truncate_chars(transcript, 200),
            next_best_actions: vec![Action {
                action_type: ActionType::CreateMeeting.to_string(),
                payload: serde_json::json!({}),
                requires_confirmation: true,
                confirmed: false,
                skip: false,
                confidence: 0.9,
                preview: None,
            }],
            ..Extraction::default()
        };
        self.runs.update(
            run_id,
            RunUpdate::default()
                .extracted(extracted.clone())
                .status(RunStatus::Extracted),
        )?;

        let mut actions_preview = enrich_actions(
            &extracted.next_best_actions,
            &extracted,
            None,
            &self.slack,
        );
        for action in &mut actions_preview {
            action.preview = Some(self.dispatch.preview_action(action).await);
        }

        let reply_text = actions_preview
            .first()
            .map(|a| {
                format!(
                    "{} from {} to {}: {}",
                    a.payload["date"].as_str().unwrap_or(""),
                    a.payload["start_time"].as_str().unwrap_or(""),
                    a.payload["end_time"].as_str().unwrap_or(""),
                    a.payload["title"].as_str().unwrap_or("Meeting"),
                )
            })
            .unwrap_or_else(|| "No meeting could be proposed.".to_string());
        let reply_draft = ReplyDraft {
            reply_text,
            citations: Vec::new(),
        };
        self.runs.update(
            run_id,
            RunUpdate::default()
                .reply_draft(reply_draft.clone())
                .status(RunStatus::Drafted),
        )?;

        self.runs.update(
            run_id,
            RunUpdate::default()
                .actions(actions_preview.clone())
                .status(RunStatus::Previewed),
        )?;
        info!(run_id = %run_id, "Voice-schedule run previewed");

        Ok(RunOutput {
            run_id,
            transcript: transcript.to_string(),
            extracted,
            evidence: Vec::new(),
            reply_draft,
            actions_preview,
        })
    }

    /// Confirm step: execute the user-confirmed actions of a previewed run.
    ///
    /// Each action produces an outcome independently; one failure never
    /// blocks the rest. A run can be confirmed at most once: an already
    /// executed or errored run is rejected before any action is dispatched,
    /// so a client retry cannot repeat side effects.
    pub async fn confirm(&self, run_id: Uuid, actions: &[Action]) -> Result<Vec<ActionOutcome>> {
        let run = self
            .runs
            .get(run_id)?
            .ok_or_else(|| AutopilotError::NotFound(format!("Run {} not found", run_id)))?;

        if run.status.is_terminal() {
            return Err(AutopilotError::Input(format!(
                "Run {} is already {} and cannot be confirmed again",
                run_id, run.status
            )));
        }

        let locale = run
            .extracted
            .as_ref()
            .map(|e| e.conversation_language.clone())
            .unwrap_or_else(|| "en".to_string());

        let mut outcomes = Vec::with_capacity(actions.len());
        for action in actions {
            if action.skip || action.kind() == Some(ActionType::None) {
                outcomes.push(ActionOutcome {
                    action_type: action.action_type.clone(),
                    status: OutcomeStatus::Skipped,
                    result: serde_json::json!({}),
                });
                continue;
            }
            if action.requires_confirmation && !action.confirmed {
                outcomes.push(ActionOutcome {
                    action_type: action.action_type.clone(),
                    status: OutcomeStatus::Skipped,
                    result: serde_json::json!({ "reason": "Not confirmed" }),
                });
                continue;
            }
            outcomes.push(self.dispatch.execute_action(action, &locale).await);
        }

        self.runs.update(
            run_id,
            RunUpdate::default()
                .outcomes(outcomes.clone())
                .status(RunStatus::Executed),
        )?;
        info!(run_id = %run_id, executed = outcomes.len(), "Run confirmed");

        Ok(outcomes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use autopilot_core::config::KnowledgeConfig;
    use autopilot_core::types::{Entities, Intent};
    use autopilot_dispatch::connectors::SlackConnector;
    use autopilot_dispatch::{
        ActionPreview, Connector, ConnectorRegistry, ConnectorReport, DispatchError,
        UnconfiguredCalendar,
    };
    use autopilot_knowledge::{EmbeddingClient, MockEmbedding, SourceDocument};
    use autopilot_store::Database;

    struct FixedExtractor {
        extraction: Extraction,
    }

    #[async_trait]
    impl Extractor for FixedExtractor {
        async fn extract(&self, _transcript: &str, _run_id: Uuid) -> Result<Extraction> {
            Ok(self.extraction.clone())
        }
    }

    struct FailingExtractor;

    #[async_trait]
    impl Extractor for FailingExtractor {
        async fn extract(&self, _transcript: &str, _run_id: Uuid) -> Result<Extraction> {
            Err(AutopilotError::Schema("missing required field: intent".to_string()))
        }
    }

    struct FixedDrafter;

    #[async_trait]
    impl Drafter for FixedDrafter {
        async fn draft(
            &self,
            _transcript: &str,
            _extraction: &Extraction,
            _evidence: &[EvidenceSnippet],
        ) -> Result<ReplyDraft> {
            Ok(ReplyDraft {
                reply_text: "Thanks for reaching out.".to_string(),
                citations: vec!["pricing.md".to_string()],
            })
        }
    }

    fn extraction_with_actions() -> Extraction {
        Extraction {
            intent: Intent::SalesLead,
            summary: "Acme asked for enterprise pricing".to_string(),
            entities: Entities {
                company: Some("Acme".to_string()),
                ..Entities::default()
            },
            next_best_actions: vec![
                Action {
                    action_type: "send_slack_summary".to_string(),
                    payload: serde_json::json!({}),
                    requires_confirmation: true,
                    confirmed: false,
                    skip: false,
                    confidence: 0.8,
                    preview: None,
                },
                Action {
                    action_type: "none".to_string(),
                    payload: serde_json::json!({}),
                    requires_confirmation: false,
                    confirmed: false,
                    skip: false,
                    confidence: 0.5,
                    preview: None,
                },
            ],
            ..Extraction::default()
        }
    }

    async fn make_runner(extractor: Arc<dyn Extractor>) -> (PipelineRunner, RunRepository) {
        let db = Arc::new(Database::in_memory().unwrap());
        let embedder: Arc<dyn EmbeddingClient> = Arc::new(MockEmbedding::new());
        let knowledge = Arc::new(KnowledgeService::new(
            Arc::clone(&db),
            embedder,
            KnowledgeConfig::default(),
        ));
        knowledge
            .ingest(&[SourceDocument {
                name: "pricing.md".to_string(),
                text: "Enterprise pricing is custom; starter is $29/mo.".to_string(),
            }])
            .await
            .unwrap();

        let mut registry = ConnectorRegistry::new();
        registry.register(Arc::new(SlackConnector::new(&SlackConfig::default())));
        let dispatch = Arc::new(DispatchEngine::new(registry, Arc::new(UnconfiguredCalendar)));

        let runner = PipelineRunner::new(
            RunRepository::new(Arc::clone(&db)),
            knowledge,
            dispatch,
            Arc::new(crate::collaborators::PassthroughTranscriber),
            extractor,
            Arc::new(FixedDrafter),
            SlackConfig::default(),
        );
        (runner, RunRepository::new(db))
    }

    fn text_request(text: &str) -> RunRequest {
        RunRequest {
            run_type: RunType::Autopilot,
            mode: InputType::Text,
            audio: None,
            text: Some(text.to_string()),
            locale: "en".to_string(),
        }
    }

    #[tokio::test]
    async fn test_text_run_reaches_previewed() {
        let (runner, repo) = make_runner(Arc::new(FixedExtractor {
            extraction: extraction_with_actions(),
        }))
        .await;

        let output = runner
            .run(text_request("We need enterprise pricing for Acme"))
            .await
            .unwrap();

        assert_eq!(output.transcript, "We need enterprise pricing for Acme");
        assert!(!output.evidence.is_empty());
        assert_eq!(output.actions_preview.len(), 2);
        assert!(output.actions_preview[0]
            .preview
            .as_deref()
            .unwrap()
            .starts_with("Slack → "));
        assert_eq!(output.actions_preview[1].preview.as_deref(), Some("No action needed."));

        let stored = repo.get(output.run_id).unwrap().unwrap();
        assert_eq!(stored.status, RunStatus::Previewed);
        assert!(stored.transcript.is_some());
        assert!(stored.extracted.is_some());
        assert!(stored.evidence.is_some());
        assert!(stored.reply_draft.is_some());
        assert_eq!(stored.actions.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_audio_run_through_passthrough() {
        let (runner, repo) = make_runner(Arc::new(FixedExtractor {
            extraction: extraction_with_actions(),
        }))
        .await;

        let request = RunRequest {
            run_type: RunType::Autopilot,
            mode: InputType::Audio,
            audio: Some(b"  spoken request about pricing  ".to_vec()),
            text: None,
            locale: "en".to_string(),
        };
        let output = runner.run(request).await.unwrap();
        assert_eq!(output.transcript, "spoken request about pricing");

        let stored = repo.get(output.run_id).unwrap().unwrap();
        assert!(stored.raw_input.starts_with("[audio input:"));
    }

    #[tokio::test]
    async fn test_missing_text_rejected_before_creating_run() {
        let (runner, repo) = make_runner(Arc::new(FixedExtractor {
            extraction: extraction_with_actions(),
        }))
        .await;

        let request = RunRequest {
            run_type: RunType::Autopilot,
            mode: InputType::Text,
            audio: None,
            text: None,
            locale: "en".to_string(),
        };
        let err = runner.run(request).await.unwrap_err();
        assert!(matches!(err, AutopilotError::Input(_)));
        assert!(repo.list(10, 0).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_blank_text_marks_run_error() {
        let (runner, repo) = make_runner(Arc::new(FixedExtractor {
            extraction: extraction_with_actions(),
        }))
        .await;

        let err = runner.run(text_request("   ")).await.unwrap_err();
        assert!(matches!(err, AutopilotError::Input(_)));

        let listed = repo.list(10, 0).unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].status, RunStatus::Error);
        assert_eq!(listed[0].error.as_deref(), Some("Empty transcript"));
    }

    #[tokio::test]
    async fn test_extractor_failure_retains_transcript() {
        let (runner, repo) = make_runner(Arc::new(FailingExtractor)).await;

        let err = runner.run(text_request("Hello there")).await.unwrap_err();
        assert!(matches!(err, AutopilotError::Schema(_)));

        let listed = repo.list(10, 0).unwrap();
        let stored = repo.get(listed[0].run_id).unwrap().unwrap();
        assert_eq!(stored.status, RunStatus::Error);
        assert_eq!(stored.transcript.as_deref(), Some("Hello there"));
        assert!(stored.error.unwrap().contains("missing required field"));
    }

    #[tokio::test]
    async fn test_confirm_unknown_run() {
        let (runner, _) = make_runner(Arc::new(FixedExtractor {
            extraction: extraction_with_actions(),
        }))
        .await;

        let err = runner.confirm(Uuid::new_v4(), &[]).await.unwrap_err();
        assert!(matches!(err, AutopilotError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_confirm_outcomes() {
        let (runner, repo) = make_runner(Arc::new(FixedExtractor {
            extraction: extraction_with_actions(),
        }))
        .await;

        let output = runner
            .run(text_request("We need enterprise pricing for Acme"))
            .await
            .unwrap();

        let mut actions = output.actions_preview.clone();
        actions[0].confirmed = true;
        actions.push(Action {
            action_type: "send_slack_summary".to_string(),
            payload: serde_json::json!({"message": "skipped one"}),
            requires_confirmation: true,
            confirmed: false,
            skip: false,
            confidence: 0.7,
            preview: None,
        });

        let outcomes = runner.confirm(output.run_id, &actions).await.unwrap();
        assert_eq!(outcomes.len(), 3);
        // Confirmed slack action runs (and fails: webhook unconfigured).
        assert_eq!(outcomes[0].status, OutcomeStatus::Failed);
        // "none" action is skipped.
        assert_eq!(outcomes[1].status, OutcomeStatus::Skipped);
        // Unconfirmed action is skipped with a reason.
        assert_eq!(outcomes[2].status, OutcomeStatus::Skipped);
        assert_eq!(outcomes[2].result["reason"], "Not confirmed");

        let stored = repo.get(output.run_id).unwrap().unwrap();
        assert_eq!(stored.status, RunStatus::Executed);
        assert_eq!(stored.outcomes.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_standup_text_previews_meeting() {
        let (runner, _) = make_runner(Arc::new(crate::collaborators::RuleBasedExtractor)).await;

        let output = runner
            .run(text_request(
                "We need a team standup tomorrow 10 to 10:30 with alice@example.com",
            ))
            .await
            .unwrap();

        assert_eq!(output.actions_preview.len(), 1);
        let action = &output.actions_preview[0];
        assert_eq!(action.action_type, "create_meeting");
        // Enrichment filled the scheduling fields before previewing.
        assert_eq!(action.payload["start_time"], "10:00");
        assert_eq!(action.payload["end_time"], "11:00");
        assert_eq!(action.payload["date"].as_str().unwrap().len(), 10);
        let preview = action.preview.as_deref().unwrap();
        assert!(preview.starts_with("Calendar: "));
        assert!(preview.contains("standup"));
    }

    #[tokio::test]
    async fn test_voice_schedule_run_skips_retrieval() {
        let (runner, repo) = make_runner(Arc::new(FailingExtractor)).await;

        let request = RunRequest {
            run_type: RunType::VoiceSchedule,
            mode: InputType::Audio,
            audio: Some(b"meeting with the CEO tomorrow morning".to_vec()),
            text: None,
            locale: "en".to_string(),
        };
        // The extractor would fail if consulted; the voice-schedule
        // variant never reaches it.
        let output = runner.run(request).await.unwrap();

        assert!(output.evidence.is_empty());
        assert_eq!(output.extracted.intent, Intent::SchedulingRequest);
        assert_eq!(output.actions_preview.len(), 1);
        let action = &output.actions_preview[0];
        assert_eq!(action.action_type, "create_meeting");
        assert_eq!(action.payload["start_time"], "10:00");
        assert!(output
            .reply_draft
            .reply_text
            .contains("from 10:00 to 11:00"));

        let stored = repo.get(output.run_id).unwrap().unwrap();
        assert_eq!(stored.run_type, RunType::VoiceSchedule);
        assert_eq!(stored.status, RunStatus::Previewed);
        assert!(stored.evidence.is_none());
    }

    #[tokio::test]
    async fn test_confirm_skip_flag() {
        let (runner, _) = make_runner(Arc::new(FixedExtractor {
            extraction: extraction_with_actions(),
        }))
        .await;

        let output = runner
            .run(text_request("We need enterprise pricing for Acme"))
            .await
            .unwrap();

        let mut actions = output.actions_preview.clone();
        actions[0].confirmed = true;
        actions[0].skip = true;

        let outcomes = runner.confirm(output.run_id, &actions).await.unwrap();
        assert_eq!(outcomes[0].status, OutcomeStatus::Skipped);
        assert_eq!(outcomes[0].result, serde_json::json!({}));
    }

    struct CountingConnector {
        executes: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Connector for CountingConnector {
        fn action_type(&self) -> ActionType {
            ActionType::SendSlackSummary
        }

        async fn preview(
            &self,
            _payload: &serde_json::Value,
        ) -> std::result::Result<ActionPreview, DispatchError> {
            Ok(ActionPreview {
                preview: "Slack → #general".to_string(),
                details: serde_json::json!({}),
            })
        }

        async fn execute(
            &self,
            _payload: &serde_json::Value,
        ) -> std::result::Result<ConnectorReport, DispatchError> {
            self.executes.fetch_add(1, Ordering::SeqCst);
            Ok(ConnectorReport::success(serde_json::json!({ "posted": true })))
        }
    }

    #[tokio::test]
    async fn test_confirm_twice_rejects_without_redispatch() {
        let db = Arc::new(Database::in_memory().unwrap());
        let embedder: Arc<dyn EmbeddingClient> = Arc::new(MockEmbedding::new());
        let knowledge = Arc::new(KnowledgeService::new(
            Arc::clone(&db),
            embedder,
            KnowledgeConfig::default(),
        ));

        let executes = Arc::new(AtomicUsize::new(0));
        let mut registry = ConnectorRegistry::new();
        registry.register(Arc::new(CountingConnector {
            executes: Arc::clone(&executes),
        }));
        let dispatch = Arc::new(DispatchEngine::new(registry, Arc::new(UnconfiguredCalendar)));

        let runner = PipelineRunner::new(
            RunRepository::new(Arc::clone(&db)),
            knowledge,
            dispatch,
            Arc::new(crate::collaborators::PassthroughTranscriber),
            Arc::new(FixedExtractor {
                extraction: extraction_with_actions(),
            }),
            Arc::new(FixedDrafter),
            SlackConfig::default(),
        );
        let repo = RunRepository::new(db);

        let output = runner
            .run(text_request("We need enterprise pricing for Acme"))
            .await
            .unwrap();

        let mut actions = output.actions_preview.clone();
        actions[0].confirmed = true;

        let outcomes = runner.confirm(output.run_id, &actions).await.unwrap();
        assert_eq!(outcomes[0].status, OutcomeStatus::Success);
        assert_eq!(executes.load(Ordering::SeqCst), 1);

        // A retried confirm is rejected before reaching any connector.
        let err = runner.confirm(output.run_id, &actions).await.unwrap_err();
        assert!(matches!(err, AutopilotError::Input(_)));
        assert_eq!(executes.load(Ordering::SeqCst), 1);

        // The stored outcomes are still the first confirmation's.
        let stored = repo.get(output.run_id).unwrap().unwrap();
        assert_eq!(stored.status, RunStatus::Executed);
        assert_eq!(stored.outcomes.unwrap().len(), 2);
    }
}
