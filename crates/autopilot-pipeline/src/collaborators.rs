//! Collaborator traits for the model-backed pipeline stages.
//!
//! Transcription, extraction, and drafting are external services; the
//! runner only sees these traits. Schema problems in collaborator output
//! surface as `AutopilotError::Schema`, transport problems as
//! `AutopilotError::Collaborator`.

use async_trait::async_trait;
use uuid::Uuid;

use autopilot_core::error::{AutopilotError, Result};
use autopilot_core::types::{Action, EvidenceSnippet, Extraction, Intent, ReplyDraft};

/// Speech-to-text backend.
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Turn raw audio bytes into a transcript.
    async fn transcribe(&self, audio: &[u8], language: &str) -> Result<String>;
}

/// Structured-intent extraction backend.
#[async_trait]
pub trait Extractor: Send + Sync {
    /// Extract structured intent from a transcript. `run_id` is passed
    /// through for request correlation in collaborator logs.
    async fn extract(&self, transcript: &str, run_id: Uuid) -> Result<Extraction>;
}

/// Reply drafting backend.
#[async_trait]
pub trait Drafter: Send + Sync {
    /// Draft a customer-facing reply grounded in the retrieved evidence.
    async fn draft(
        &self,
        transcript: &str,
        extraction: &Extraction,
        evidence: &[EvidenceSnippet],
    ) -> Result<ReplyDraft>;
}

/// Transcriber that treats the audio bytes as UTF-8 text.
///
/// Lets text-only deployments and tests run the audio path without a
/// speech service.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughTranscriber;

#[async_trait]
impl Transcriber for PassthroughTranscriber {
    async fn transcribe(&self, audio: &[u8], _language: &str) -> Result<String> {
        let text = std::str::from_utf8(audio)
            .map_err(|_| AutopilotError::Input("Audio payload is not valid UTF-8 text".to_string()))?;
        Ok(text.trim().to_string())
    }
}

/// Keyword-driven extractor for deployments without a model backend.
///
/// Classifies intent from surface keywords and proposes at most one
/// follow-up action. Deliberately conservative: every proposed action
/// requires confirmation.
#[derive(Debug, Clone, Copy, Default)]
pub struct RuleBasedExtractor;

impl RuleBasedExtractor {
    fn classify(transcript: &str) -> (Intent, Option<&'static str>) {
        let lower = transcript.to_lowercase();
        if ["schedule", "meeting", "standup", "calendar", "call with"]
            .iter()
            .any(|kw| lower.contains(kw))
        {
            (Intent::SchedulingRequest, Some("create_meeting"))
        } else if ["price", "pricing", "cost", "quote"]
            .iter()
            .any(|kw| lower.contains(kw))
        {
            (Intent::PricingQuestion, Some("send_email_followup"))
        } else if ["broken", "error", "not working", "bug", "issue"]
            .iter()
            .any(|kw| lower.contains(kw))
        {
            (Intent::SupportIssue, Some("create_ticket"))
        } else if ["buy", "purchase", "interested in", "demo"]
            .iter()
            .any(|kw| lower.contains(kw))
        {
            (Intent::SalesLead, Some("send_slack_summary"))
        } else {
            (Intent::GeneralInquiry, None)
        }
    }
}

#[async_trait]
impl Extractor for RuleBasedExtractor {
    async fn extract(&self, transcript: &str, _run_id: Uuid) -> Result<Extraction> {
        let (intent, action_type) = Self::classify(transcript);

        let summary: String = transcript.chars().take(200).collect();
        let next_best_actions = action_type
            .map(|t| {
                vec![Action {
                    action_type: t.to_string(),
                    payload: serde_json::json!({}),
                    requires_confirmation: true,
                    confirmed: false,
                    skip: false,
                    confidence: 0.5,
                    preview: None,
                }]
            })
            .unwrap_or_default();

        Ok(Extraction {
            intent,
            summary,
            next_best_actions,
            ..Extraction::default()
        })
    }
}

/// Drafter that assembles a reply from the extraction and evidence,
/// citing every snippet it quotes.
#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateDrafter;

#[async_trait]
impl Drafter for TemplateDrafter {
    async fn draft(
        &self,
        _transcript: &str,
        extraction: &Extraction,
        evidence: &[EvidenceSnippet],
    ) -> Result<ReplyDraft> {
        let mut reply = format!("Thanks for reaching out. {}", extraction.summary);
        let mut citations = Vec::new();

        if let Some(top) = evidence.first() {
            let excerpt: String = top.text.chars().take(240).collect();
            reply.push_str("\n\nFrom our documentation: ");
            reply.push_str(&excerpt);
            citations.push(top.document_name.clone());
        }

        Ok(ReplyDraft {
            reply_text: reply,
            citations,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_passthrough_trims() {
        let transcript = PassthroughTranscriber
            .transcribe(b"  hello there \n", "en")
            .await
            .unwrap();
        assert_eq!(transcript, "hello there");
    }

    #[tokio::test]
    async fn test_passthrough_rejects_binary() {
        let result = PassthroughTranscriber
            .transcribe(&[0xff, 0xfe, 0x00], "en")
            .await;
        assert!(matches!(result, Err(AutopilotError::Input(_))));
    }

    #[tokio::test]
    async fn test_rule_based_scheduling() {
        let extraction = RuleBasedExtractor
            .extract("Can we schedule a call with the team tomorrow?", Uuid::new_v4())
            .await
            .unwrap();
        assert_eq!(extraction.intent, Intent::SchedulingRequest);
        assert_eq!(extraction.next_best_actions.len(), 1);
        assert_eq!(extraction.next_best_actions[0].action_type, "create_meeting");
        assert!(extraction.next_best_actions[0].requires_confirmation);
    }

    #[tokio::test]
    async fn test_rule_based_general_inquiry_proposes_nothing() {
        let extraction = RuleBasedExtractor
            .extract("What are your office hours?", Uuid::new_v4())
            .await
            .unwrap();
        assert_eq!(extraction.intent, Intent::GeneralInquiry);
        assert!(extraction.next_best_actions.is_empty());
    }

    #[tokio::test]
    async fn test_template_drafter_cites_evidence() {
        let extraction = Extraction {
            summary: "Customer asked about pricing.".to_string(),
            ..Extraction::default()
        };
        let evidence = vec![EvidenceSnippet {
            document_name: "pricing.md".to_string(),
            chunk_index: 0,
            text: "The starter plan costs $49 per month.".to_string(),
            score: 0.9,
        }];
        let draft = TemplateDrafter
            .draft("how much?", &extraction, &evidence)
            .await
            .unwrap();
        assert!(draft.reply_text.contains("$49"));
        assert_eq!(draft.citations, vec!["pricing.md".to_string()]);
    }

    #[tokio::test]
    async fn test_template_drafter_without_evidence() {
        let extraction = Extraction::default();
        let draft = TemplateDrafter.draft("hi", &extraction, &[]).await.unwrap();
        assert!(!draft.reply_text.is_empty());
        assert!(draft.citations.is_empty());
    }
}
