//! Embedding client trait and the deterministic offline backend.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use autopilot_core::error::AutopilotError;

/// Client for turning text into fixed-dimensional vectors.
///
/// Used for both ingestion (indexing chunks) and retrieval (embedding the
/// query). Implementations batch internally however the backing service
/// requires; callers hand over one batch at a time.
#[async_trait]
pub trait EmbeddingClient: Send + Sync {
    /// Embed a batch of texts, preserving order.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, AutopilotError>;

    /// Dimensionality of the produced vectors.
    fn dimensions(&self) -> usize;
}

/// Deterministic hash-based embedding backend.
///
/// Identical inputs always produce identical 384-dimensional unit vectors,
/// so cache behavior and search ordering are testable without a network
/// service. Tracks how many batch calls were made, which lets tests verify
/// that cached content is never re-embedded.
#[derive(Debug, Default)]
pub struct MockEmbedding {
    calls: AtomicUsize,
}

impl MockEmbedding {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `embed_batch` calls made so far.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn hash_to_vector(text: &str) -> Vec<f32> {
        let mut result = Vec::with_capacity(384);
        for i in 0..384usize {
            let mut hasher = DefaultHasher::new();
            text.hash(&mut hasher);
            i.hash(&mut hasher);
            let h = hasher.finish();
            let val = ((h as f64) / (u64::MAX as f64)) * 2.0 - 1.0;
            result.push(val as f32);
        }

        // L2-normalize so inner product equals cosine similarity.
        let norm: f32 = result.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for val in &mut result {
                *val /= norm;
            }
        }

        result
    }
}

#[async_trait]
impl EmbeddingClient for MockEmbedding {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, AutopilotError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        texts
            .iter()
            .map(|text| {
                if text.is_empty() {
                    Err(AutopilotError::Input("Cannot embed empty text".to_string()))
                } else {
                    Ok(Self::hash_to_vector(text))
                }
            })
            .collect()
    }

    fn dimensions(&self) -> usize {
        384
    }
}
