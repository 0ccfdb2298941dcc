//! Action dispatch: previews and executes proposed side effects.
//!
//! Connectors wrap external systems (Slack, ticketing, email) behind one
//! trait; the engine routes actions to them and absorbs their failures
//! into per-action outcomes. Calendar actions go through a dedicated
//! client because conflict detection needs a richer result shape.

pub mod calendar;
pub mod connector;
pub mod connectors;
pub mod engine;
pub mod enrich;
pub mod error;

pub use calendar::{CalendarClient, CalendarReport, MeetingCommand, UnconfiguredCalendar};
pub use connector::{ActionPreview, Connector, ConnectorRegistry, ConnectorReport};
pub use engine::DispatchEngine;
pub use enrich::enrich_actions;
pub use error::DispatchError;
