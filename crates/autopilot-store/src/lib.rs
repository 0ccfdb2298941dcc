//! SQLite persistence for the Autopilot engine.
//!
//! One durable record per run, a TTL-based key/value cache, the
//! never-evicted embedding cache, and the knowledge-chunk store backing
//! the vector index.

pub mod cache;
pub mod db;
pub mod migrations;
pub mod runs;

pub use cache::{CacheRepository, ChunkStore, EmbeddingCacheRepository};
pub use db::Database;
pub use runs::{RunRepository, RunSummary, RunUpdate};
