//! HTTP surface for the Autopilot engine.
//!
//! Thin axum layer over the pipeline runner and knowledge service; all
//! domain behavior lives in the crates below.

pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

pub use routes::{create_router, start_server};
pub use state::AppState;
