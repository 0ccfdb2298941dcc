//! Knowledge service: ingestion, startup rehydration, and retrieval.

use std::collections::HashSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::info;

use autopilot_core::config::KnowledgeConfig;
use autopilot_core::error::{AutopilotError, Result};
use autopilot_core::types::{EvidenceSnippet, Extraction, KnowledgeChunk};
use autopilot_store::{ChunkStore, Database, EmbeddingCacheRepository};

use crate::chunker::chunk_text;
use crate::embedding::EmbeddingClient;
use crate::index::VectorIndex;

/// A document handed to ingestion: a name and its full text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceDocument {
    pub name: String,
    pub text: String,
}

/// What an ingestion call produced.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IngestSummary {
    pub documents: usize,
    pub chunks: usize,
}

/// Owns the vector index, the embedding cache, and the durable chunk store.
///
/// Ingestion rebuilds the index wholesale; retrieval serves top-k snippets
/// from the in-memory index. Both paths embed through the content-hash
/// cache so identical text is never embedded twice.
pub struct KnowledgeService {
    index: VectorIndex,
    embed_cache: EmbeddingCacheRepository,
    chunk_store: ChunkStore,
    embedder: Arc<dyn EmbeddingClient>,
    config: KnowledgeConfig,
}

impl KnowledgeService {
    pub fn new(
        db: Arc<Database>,
        embedder: Arc<dyn EmbeddingClient>,
        config: KnowledgeConfig,
    ) -> Self {
        Self {
            index: VectorIndex::new(),
            embed_cache: EmbeddingCacheRepository::new(Arc::clone(&db)),
            chunk_store: ChunkStore::new(db),
            embedder,
            config,
        }
    }

    /// Chunk, embed, and index the given documents, replacing any previous
    /// knowledge base.
    ///
    /// Embedding failures abort the whole call before the old index is
    /// touched; cache entries written for completed batches stay valid.
    pub async fn ingest(&self, documents: &[SourceDocument]) -> Result<IngestSummary> {
        if documents.is_empty() {
            return Ok(IngestSummary { documents: 0, chunks: 0 });
        }

        let mut chunks: Vec<KnowledgeChunk> = Vec::new();
        for doc in documents {
            for (i, text) in chunk_text(&doc.text, self.config.chunk_size, self.config.chunk_overlap)
                .into_iter()
                .enumerate()
            {
                chunks.push(KnowledgeChunk {
                    document_name: doc.name.clone(),
                    chunk_index: i,
                    text,
                });
            }
        }

        info!(
            documents = documents.len(),
            chunks = chunks.len(),
            "Ingesting knowledge base"
        );

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let embeddings = self.embed_cached(&texts).await?;

        let entries: Vec<(KnowledgeChunk, Vec<f32>)> =
            chunks.into_iter().zip(embeddings).collect();

        self.chunk_store.replace_all(&entries)?;
        self.index.replace_all(entries)?;

        Ok(IngestSummary {
            documents: documents.len(),
            chunks: self.index.len(),
        })
    }

    /// Rebuild the in-memory index from the durable chunk store.
    pub fn load(&self) -> Result<usize> {
        let entries = self.chunk_store.load_all()?;
        let count = entries.len();
        self.index.replace_all(entries)?;
        if count > 0 {
            info!(chunks = count, "Rehydrated vector index");
        }
        Ok(count)
    }

    /// Top-k evidence snippets for a free-text query.
    pub async fn retrieve(&self, query: &str) -> Result<Vec<EvidenceSnippet>> {
        if self.index.is_empty() {
            return Ok(Vec::new());
        }
        let embeddings = self.embed_cached(&[query.to_string()]).await?;
        let query_vec = embeddings
            .into_iter()
            .next()
            .ok_or_else(|| AutopilotError::Collaborator("Embedding client returned no vector".to_string()))?;
        self.index.search(&query_vec, self.config.top_k)
    }

    /// Number of chunks currently indexed.
    pub fn indexed_chunks(&self) -> usize {
        self.index.len()
    }

    /// Embed texts through the content-hash cache, batching misses.
    ///
    /// New cache entries are persisted before returning so a later failure
    /// cannot discard paid-for embeddings.
    async fn embed_cached(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let hashes: Vec<String> = texts.iter().map(|t| content_hash(t)).collect();
        let mut cached = self.embed_cache.get_many(&hashes)?;

        let mut miss_texts: Vec<String> = Vec::new();
        let mut miss_hashes: Vec<String> = Vec::new();
        let mut seen: HashSet<&str> = HashSet::new();
        for (text, hash) in texts.iter().zip(&hashes) {
            if !cached.contains_key(hash) && seen.insert(hash.as_str()) {
                miss_texts.push(text.clone());
                miss_hashes.push(hash.clone());
            }
        }

        if !miss_texts.is_empty() {
            info!(
                misses = miss_texts.len(),
                hits = texts.len() - miss_texts.len(),
                "Embedding uncached chunks"
            );
            let batch_size = self.config.embed_batch_size.max(1);
            let mut new_entries: Vec<(String, Vec<f32>)> = Vec::new();
            for (text_batch, hash_batch) in miss_texts
                .chunks(batch_size)
                .zip(miss_hashes.chunks(batch_size))
            {
                let vectors = self.embedder.embed_batch(text_batch).await?;
                if vectors.len() != text_batch.len() {
                    return Err(AutopilotError::Collaborator(format!(
                        "Embedding client returned {} vectors for {} texts",
                        vectors.len(),
                        text_batch.len()
                    )));
                }
                for (hash, vector) in hash_batch.iter().zip(vectors) {
                    new_entries.push((hash.clone(), normalize(vector)));
                }
            }
            self.embed_cache.put_many(&new_entries)?;
            for (hash, vector) in new_entries {
                cached.insert(hash, vector);
            }
        }

        hashes
            .iter()
            .map(|hash| {
                cached
                    .get(hash)
                    .cloned()
                    .ok_or_else(|| AutopilotError::Storage("Embedding cache lookup missed a just-written hash".to_string()))
            })
            .collect()
    }
}

/// Build a retrieval query from extracted fields.
pub fn build_query(extraction: &Extraction) -> String {
    let mut parts: Vec<String> = vec![extraction.intent.label()];

    if !extraction.product_interest.is_empty() {
        parts.push(extraction.product_interest.join(" "));
    }

    let summary = extraction.summary.trim();
    if !summary.is_empty() {
        parts.push(summary.to_string());
    }

    parts.retain(|p| !p.is_empty());
    if parts.is_empty() {
        "general inquiry".to_string()
    } else {
        parts.join(" ")
    }
}

/// Truncated sha256 hex digest used as the embedding-cache key.
fn content_hash(text: &str) -> String {
    let digest = Sha256::digest(text.as_bytes());
    hex::encode(digest)[..16].to_string()
}

/// Scale a vector to unit length; zero vectors pass through unchanged.
fn normalize(mut v: Vec<f32>) -> Vec<f32> {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in &mut v {
            *x /= norm;
        }
    }
    v
}
