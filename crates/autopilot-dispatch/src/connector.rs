//! Connector trait and registry.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use autopilot_core::types::ActionType;

use crate::error::DispatchError;

/// Dry-run description of what an action would do.
#[derive(Debug, Clone)]
pub struct ActionPreview {
    /// One-line human-readable description shown for confirmation.
    pub preview: String,
    /// Structured fields backing the preview (channel, title, ...).
    pub details: Value,
}

/// What a connector reports back after executing.
#[derive(Debug, Clone)]
pub struct ConnectorReport {
    /// Outcome status as reported by the connector ("success", "failed",
    /// ...). The engine maps unrecognized values to failed.
    pub status: String,
    /// Connector-specific result payload (summary, error, issue URL, ...).
    pub result: Value,
}

impl ConnectorReport {
    pub fn success(result: Value) -> Self {
        Self {
            status: "success".to_string(),
            result,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            status: "failed".to_string(),
            result: serde_json::json!({ "error": error.into() }),
        }
    }
}

/// One external system an action can be dispatched to.
///
/// `preview` must be side-effect free; `execute` performs the real call.
/// Expected failures (unconfigured, remote rejection) come back as a
/// failed [`ConnectorReport`]; `Err` is for transport-level breakage.
#[async_trait]
pub trait Connector: Send + Sync {
    /// The action type this connector handles.
    fn action_type(&self) -> ActionType;

    /// Describe what executing this payload would do, without doing it.
    async fn preview(&self, payload: &Value) -> Result<ActionPreview, DispatchError>;

    /// Perform the side effect.
    async fn execute(&self, payload: &Value) -> Result<ConnectorReport, DispatchError>;
}

/// Maps action types to their connectors.
#[derive(Default)]
pub struct ConnectorRegistry {
    connectors: HashMap<ActionType, Arc<dyn Connector>>,
}

impl ConnectorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connector, replacing any previous one for the same type.
    pub fn register(&mut self, connector: Arc<dyn Connector>) {
        self.connectors.insert(connector.action_type(), connector);
    }

    pub fn get(&self, action_type: ActionType) -> Option<&Arc<dyn Connector>> {
        self.connectors.get(&action_type)
    }

    pub fn len(&self) -> usize {
        self.connectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connectors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FakeConnector;

    #[async_trait]
    impl Connector for FakeConnector {
        fn action_type(&self) -> ActionType {
            ActionType::SendSlackSummary
        }

        async fn preview(&self, _payload: &Value) -> Result<ActionPreview, DispatchError> {
            Ok(ActionPreview {
                preview: "fake".to_string(),
                details: serde_json::json!({}),
            })
        }

        async fn execute(&self, _payload: &Value) -> Result<ConnectorReport, DispatchError> {
            Ok(ConnectorReport::success(serde_json::json!({})))
        }
    }

    #[test]
    fn test_registry_register_and_get() {
        let mut registry = ConnectorRegistry::new();
        assert!(registry.is_empty());

        registry.register(Arc::new(FakeConnector));
        assert_eq!(registry.len(), 1);
        assert!(registry.get(ActionType::SendSlackSummary).is_some());
        assert!(registry.get(ActionType::CreateTicket).is_none());
    }

    #[test]
    fn test_registry_replaces_duplicate() {
        let mut registry = ConnectorRegistry::new();
        registry.register(Arc::new(FakeConnector));
        registry.register(Arc::new(FakeConnector));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_report_helpers() {
        let report = ConnectorReport::failed("boom");
        assert_eq!(report.status, "failed");
        assert_eq!(report.result["error"], "boom");
    }
}
