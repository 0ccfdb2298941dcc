//! Action enrichment: fill missing payload fields from extracted data
//! before previewing.

use chrono::{Days, Local};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use autopilot_core::config::SlackConfig;
use autopilot_core::types::{truncate_chars, Action, ActionType, Extraction, ReplyDraft};

/// Meeting-creation payload.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MeetingPayload {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub start_time: String,
    #[serde(default)]
    pub end_time: String,
    #[serde(default)]
    pub attendees: Vec<String>,
}

/// Slack summary payload.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SlackPayload {
    #[serde(default)]
    pub channel: String,
    #[serde(default)]
    pub message: String,
}

/// Ticket-creation payload.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TicketPayload {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub priority: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team_id: Option<String>,
}

/// Email follow-up payload.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EmailPayload {
    #[serde(default)]
    pub to: String,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub body: String,
}

/// Fill in missing payload fields from extracted data and drop actions
/// with no viable data.
///
/// Unknown action types pass through untouched so dispatch can report
/// them. An email follow-up without a resolvable recipient (payload `to`
/// or an extracted email entity) is dropped entirely.
pub fn enrich_actions(
    actions: &[Action],
    extraction: &Extraction,
    draft: Option<&ReplyDraft>,
    slack: &SlackConfig,
) -> Vec<Action> {
    let summary = extraction.summary.trim();
    let slack_message = build_slack_message(extraction);

    let mut enriched = Vec::with_capacity(actions.len());
    for action in actions {
        let mut action = action.clone();
        match action.kind() {
            Some(ActionType::CreateMeeting) => {
                let mut payload = parse_payload::<MeetingPayload>(&action.payload);
                if payload.title.is_empty() {
                    payload.title = if summary.is_empty() {
                        "Meeting".to_string()
                    } else {
                        truncate_chars(summary, 80)
                    };
                }
                if payload.date.is_empty() {
                    let tomorrow = Local::now()
                        .date_naive()
                        .checked_add_days(Days::new(1))
                        .unwrap_or_else(|| Local::now().date_naive());
                    payload.date = tomorrow.format("%Y-%m-%d").to_string();
                }
                if payload.start_time.is_empty() {
                    payload.start_time = "10:00".to_string();
                }
                if payload.end_time.is_empty() {
                    payload.end_time = "11:00".to_string();
                }
                action.payload = to_payload_value(&payload);
            }
            Some(ActionType::SendSlackSummary) => {
                let mut payload = parse_payload::<SlackPayload>(&action.payload);
                if payload.message.is_empty() {
                    payload.message = slack_message.clone();
                }
                if payload.channel.is_empty() {
                    payload.channel = if slack.default_channel.is_empty() {
                        "#general".to_string()
                    } else {
                        slack.default_channel.clone()
                    };
                }
                action.payload = to_payload_value(&payload);
            }
            Some(ActionType::SendEmailFollowup) => {
                let mut payload = parse_payload::<EmailPayload>(&action.payload);
                if payload.to.is_empty() {
                    match extraction.entities.email.as_deref() {
                        Some(email) if !email.is_empty() => payload.to = email.to_string(),
                        _ => continue,
                    }
                }
                if payload.subject.is_empty() {
                    payload.subject = if summary.is_empty() {
                        "Follow-up".to_string()
                    } else {
                        let prefix = if extraction.conversation_language.starts_with("zh") {
                            "回复: "
                        } else {
                            "Re: "
                        };
                        format!("{}{}", prefix, truncate_chars(summary, 60))
                    };
                }
                if payload.body.is_empty() {
                    let reply_text = draft.map(|d| d.reply_text.trim()).unwrap_or("");
                    payload.body = if reply_text.is_empty() {
                        summary.to_string()
                    } else {
                        reply_text.to_string()
                    };
                }
                action.payload = to_payload_value(&payload);
            }
            Some(ActionType::CreateTicket) => {
                let mut payload = parse_payload::<TicketPayload>(&action.payload);
                if payload.title.is_empty() {
                    payload.title = if summary.is_empty() {
                        "New ticket".to_string()
                    } else {
                        truncate_chars(summary, 120)
                    };
                }
                if payload.description.is_empty() {
                    payload.description = summary.to_string();
                }
                if payload.priority.is_empty() {
                    payload.priority = extraction
                        .urgency
                        .map(|u| u.to_string())
                        .unwrap_or_else(|| "medium".to_string());
                }
                action.payload = to_payload_value(&payload);
            }
            // "none" and unrecognized types carry no payload to enrich.
            Some(ActionType::None) | None => {}
        }
        enriched.push(action);
    }

    enriched
}

/// Multi-line Slack digest of the extracted fields.
fn build_slack_message(extraction: &Extraction) -> String {
    let mut parts = vec![format!("Intent: {}", extraction.intent.label())];
    if let Some(urgency) = extraction.urgency {
        parts.push(format!("Urgency: {}", urgency));
    }
    if let Some(company) = extraction.entities.company.as_deref().filter(|c| !c.is_empty()) {
        parts.push(format!("Company: {}", company));
    }
    if let Some(contact) = extraction.entities.contact_name.as_deref().filter(|c| !c.is_empty()) {
        parts.push(format!("Contact: {}", contact));
    }
    let summary = extraction.summary.trim();
    if !summary.is_empty() {
        parts.push(format!("Summary: {}", summary));
    }
    parts.join("\n")
}

/// Lenient payload parse: malformed fields fall back to defaults rather
/// than dropping the action.
fn parse_payload<T: Default + serde::de::DeserializeOwned>(value: &Value) -> T {
    serde_json::from_value(value.clone()).unwrap_or_default()
}

fn to_payload_value<T: Serialize>(payload: &T) -> Value {
    serde_json::to_value(payload).unwrap_or_else(|_| serde_json::json!({}))
}

#[cfg(test)]
mod tests {
    use super::*;
    use autopilot_core::types::{Entities, Intent, Urgency};

    fn action(action_type: &str, payload: Value) -> Action {
        Action {
            action_type: action_type.to_string(),
            payload,
            requires_confirmation: true,
            confirmed: false,
            skip: false,
            confidence: 0.9,
            preview: None,
        }
    }

    fn extraction() -> Extraction {
        Extraction {
            intent: Intent::SalesLead,
            urgency: Some(Urgency::High),
            summary: "Acme wants a demo of the enterprise plan".to_string(),
            entities: Entities {
                company: Some("Acme".to_string()),
                contact_name: Some("Dana Reyes".to_string()),
                email: Some("dana@acme.test".to_string()),
                phone: None,
            },
            ..Extraction::default()
        }
    }

    #[test]
    fn test_meeting_defaults() {
        let actions = vec![action("create_meeting", serde_json::json!({}))];
        let enriched = enrich_actions(&actions, &extraction(), None, &SlackConfig::default());

        assert_eq!(enriched.len(), 1);
        let payload = &enriched[0].payload;
        assert_eq!(payload["title"], "Acme wants a demo of the enterprise plan");
        assert_eq!(payload["start_time"], "10:00");
        assert_eq!(payload["end_time"], "11:00");
        assert_eq!(payload["attendees"], serde_json::json!([]));
        // Defaulted date is a concrete day, not a placeholder.
        assert!(payload["date"].as_str().unwrap().len() == 10);
    }

    #[test]
    fn test_meeting_existing_fields_kept() {
        let actions = vec![action(
            "create_meeting",
            serde_json::json!({"title": "Kickoff", "date": "2026-09-03"}),
        )];
        let enriched = enrich_actions(&actions, &extraction(), None, &SlackConfig::default());
        assert_eq!(enriched[0].payload["title"], "Kickoff");
        assert_eq!(enriched[0].payload["date"], "2026-09-03");
    }

    #[test]
    fn test_slack_message_built_from_extraction() {
        let actions = vec![action("send_slack_summary", serde_json::json!({}))];
        let enriched = enrich_actions(&actions, &extraction(), None, &SlackConfig::default());

        let message = enriched[0].payload["message"].as_str().unwrap();
        assert!(message.contains("Intent: sales lead"));
        assert!(message.contains("Urgency: high"));
        assert!(message.contains("Company: Acme"));
        assert!(message.contains("Contact: Dana Reyes"));
        assert!(message.contains("Summary: Acme wants a demo"));
        assert_eq!(enriched[0].payload["channel"], "#general");
    }

    #[test]
    fn test_slack_channel_from_config() {
        let actions = vec![action("send_slack_summary", serde_json::json!({}))];
        let slack = SlackConfig {
            default_channel: "#sales".to_string(),
            ..SlackConfig::default()
        };
        let enriched = enrich_actions(&actions, &extraction(), None, &slack);
        assert_eq!(enriched[0].payload["channel"], "#sales");
    }

    #[test]
    fn test_email_recipient_from_entities() {
        let actions = vec![action("send_email_followup", serde_json::json!({}))];
        let draft = ReplyDraft {
            reply_text: "Thanks for reaching out, happy to set up a demo.".to_string(),
            citations: vec![],
        };
        let enriched = enrich_actions(&actions, &extraction(), Some(&draft), &SlackConfig::default());

        assert_eq!(enriched[0].payload["to"], "dana@acme.test");
        assert_eq!(
            enriched[0].payload["subject"],
            "Re: Acme wants a demo of the enterprise plan"
        );
        assert_eq!(
            enriched[0].payload["body"],
            "Thanks for reaching out, happy to set up a demo."
        );
    }

    #[test]
    fn test_email_dropped_without_recipient() {
        let actions = vec![
            action("send_email_followup", serde_json::json!({})),
            action("create_ticket", serde_json::json!({})),
        ];
        let mut extraction = extraction();
        extraction.entities.email = None;

        let enriched = enrich_actions(&actions, &extraction, None, &SlackConfig::default());
        assert_eq!(enriched.len(), 1);
        assert_eq!(enriched[0].action_type, "create_ticket");
    }

    #[test]
    fn test_email_chinese_subject_prefix() {
        let actions = vec![action("send_email_followup", serde_json::json!({}))];
        let mut extraction = extraction();
        extraction.conversation_language = "zh".to_string();
        extraction.summary = "客户想了解企业版价格".to_string();

        let enriched = enrich_actions(&actions, &extraction, None, &SlackConfig::default());
        assert!(enriched[0].payload["subject"]
            .as_str()
            .unwrap()
            .starts_with("回复: "));
    }

    #[test]
    fn test_email_body_falls_back_to_summary() {
        let actions = vec![action("send_email_followup", serde_json::json!({}))];
        let enriched = enrich_actions(&actions, &extraction(), None, &SlackConfig::default());
        assert_eq!(
            enriched[0].payload["body"],
            "Acme wants a demo of the enterprise plan"
        );
    }

    #[test]
    fn test_ticket_defaults() {
        let actions = vec![action("create_ticket", serde_json::json!({}))];
        let enriched = enrich_actions(&actions, &extraction(), None, &SlackConfig::default());

        assert_eq!(
            enriched[0].payload["title"],
            "Acme wants a demo of the enterprise plan"
        );
        assert_eq!(
            enriched[0].payload["description"],
            "Acme wants a demo of the enterprise plan"
        );
        assert_eq!(enriched[0].payload["priority"], "high");
    }

    #[test]
    fn test_ticket_priority_defaults_to_medium() {
        let actions = vec![action("create_ticket", serde_json::json!({}))];
        let mut extraction = extraction();
        extraction.urgency = None;

        let enriched = enrich_actions(&actions, &extraction, None, &SlackConfig::default());
        assert_eq!(enriched[0].payload["priority"], "medium");
    }

    #[test]
    fn test_unknown_and_none_pass_through() {
        let actions = vec![
            action("none", serde_json::json!({})),
            action("launch_rocket", serde_json::json!({"target": "moon"})),
        ];
        let enriched = enrich_actions(&actions, &extraction(), None, &SlackConfig::default());

        assert_eq!(enriched.len(), 2);
        assert_eq!(enriched[1].action_type, "launch_rocket");
        assert_eq!(enriched[1].payload["target"], "moon");
    }

    #[test]
    fn test_malformed_payload_falls_back_to_defaults() {
        let actions = vec![action(
            "create_meeting",
            serde_json::json!({"title": 42, "attendees": "not-a-list"}),
        )];
        let enriched = enrich_actions(&actions, &extraction(), None, &SlackConfig::default());
        assert_eq!(
            enriched[0].payload["title"],
            "Acme wants a demo of the enterprise plan"
        );
    }
}
