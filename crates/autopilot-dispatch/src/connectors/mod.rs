//! Wire connectors for external systems.

pub mod email;
pub mod slack;
pub mod ticket;

pub use email::EmailConnector;
pub use slack::SlackConnector;
pub use ticket::TicketConnector;

use std::time::Duration;

/// Per-request timeout shared by all connectors.
pub(crate) const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// First `max` characters with an ellipsis marker when truncated.
pub(crate) fn ellipsize(s: &str, max: usize) -> String {
    if s.chars().count() > max {
        let head: String = s.chars().take(max).collect();
        format!("{}…", head)
    } else {
        s.to_string()
    }
}
