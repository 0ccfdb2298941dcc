//! Dispatch error type.

use thiserror::Error;

/// Errors raised inside connectors.
///
/// The dispatch engine converts these into per-action outcomes; they never
/// propagate past it.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The connector is missing required configuration (URL, API key).
    #[error("Not configured: {0}")]
    NotConfigured(String),

    /// The payload is missing a field the connector cannot default.
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    /// The request never produced a usable response.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The remote system answered with an error.
    #[error("API error: {0}")]
    Api(String),
}

impl From<reqwest::Error> for DispatchError {
    fn from(err: reqwest::Error) -> Self {
        DispatchError::Transport(err.to_string())
    }
}
