//! Knowledge base pipeline: chunking, embedding, vector search.
//!
//! Documents are chunked on paragraph boundaries, embedded through a
//! content-hash cache, and served from an in-memory inner-product index
//! that is rebuilt wholesale on every ingestion.

pub mod chunker;
pub mod embedding;
pub mod index;
pub mod service;

pub use chunker::chunk_text;
pub use embedding::{EmbeddingClient, MockEmbedding};
pub use index::VectorIndex;
pub use service::{build_query, IngestSummary, KnowledgeService, SourceDocument};
