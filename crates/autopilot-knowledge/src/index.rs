//! In-memory vector index with brute-force inner-product search.
//!
//! Entries are unit-normalized before insertion, so the inner product is
//! the cosine similarity. O(n) per search, which is fine for a knowledge
//! base of hundreds of chunks.

use std::sync::{Arc, RwLock};

use autopilot_core::error::AutopilotError;
use autopilot_core::types::{EvidenceSnippet, KnowledgeChunk};

/// In-memory index of knowledge chunks and their embeddings.
///
/// Rebuilt wholesale on every ingestion via `replace_all`; there are no
/// incremental inserts or deletes. Thread-safe via interior RwLock.
#[derive(Debug, Clone)]
pub struct VectorIndex {
    entries: Arc<RwLock<Vec<(KnowledgeChunk, Vec<f32>)>>>,
}

impl VectorIndex {
    /// Create a new empty index.
    pub fn new() -> Self {
        Self {
            entries: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Atomically swap in a new set of entries.
    pub fn replace_all(
        &self,
        entries: Vec<(KnowledgeChunk, Vec<f32>)>,
    ) -> Result<(), AutopilotError> {
        let mut guard = self
            .entries
            .write()
            .map_err(|e| AutopilotError::Storage(format!("Lock poisoned: {}", e)))?;
        *guard = entries;
        Ok(())
    }

    /// Top-k entries by inner product against the query vector.
    ///
    /// Returns snippets sorted by descending score.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<EvidenceSnippet>, AutopilotError> {
        let entries = self
            .entries
            .read()
            .map_err(|e| AutopilotError::Storage(format!("Lock poisoned: {}", e)))?;

        let mut scored: Vec<EvidenceSnippet> = entries
            .iter()
            .map(|(chunk, embedding)| EvidenceSnippet {
                document_name: chunk.document_name.clone(),
                chunk_index: chunk.chunk_index,
                text: chunk.text.clone(),
                score: inner_product(query, embedding),
            })
            .collect();

        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);

        Ok(scored)
    }

    /// Number of indexed chunks.
    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    /// True if the index holds no chunks.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for VectorIndex {
    fn default() -> Self {
        Self::new()
    }
}

/// Inner product of two vectors; 0.0 on length mismatch.
fn inner_product(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() {
        return 0.0;
    }
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (*x as f64) * (*y as f64))
        .sum()
}
