use thiserror::Error;

/// Top-level error type for the Autopilot system.
///
/// Variants follow the failure taxonomy of the pipeline: input errors are
/// surfaced immediately, schema errors come from extraction validation,
/// collaborator errors wrap any external call that raised, and not-found
/// errors are kept distinct so callers can map them to a 404. Subsystem
/// crates define their own error types and convert into this one so that
/// the `?` operator works across crate boundaries.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AutopilotError {
    #[error("Invalid input: {0}")]
    Input(String),

    #[error("Schema validation failed: {0}")]
    Schema(String),

    #[error("Collaborator call failed: {0}")]
    Collaborator(String),

    #[error("Run not found: {0}")]
    NotFound(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for AutopilotError {
    fn from(err: serde_json::Error) -> Self {
        AutopilotError::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for AutopilotError {
    fn from(err: toml::de::Error) -> Self {
        AutopilotError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for AutopilotError {
    fn from(err: toml::ser::Error) -> Self {
        AutopilotError::Config(err.to_string())
    }
}

/// A specialized `Result` type for Autopilot operations.
pub type Result<T> = std::result::Result<T, AutopilotError>;
