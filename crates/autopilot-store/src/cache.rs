//! Durable caches: the TTL key/value cache, the embedding cache, and the
//! knowledge-chunk store.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use rusqlite::OptionalExtension;

use autopilot_core::error::AutopilotError;
use autopilot_core::types::KnowledgeChunk;

use crate::db::Database;

/// Key/value cache with per-entry TTL.
///
/// Expiry is evaluated at read time: an entry older than its TTL reads as
/// absent but is not proactively deleted.
pub struct CacheRepository {
    db: Arc<Database>,
}

impl CacheRepository {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Fetch a value, treating expired entries as absent.
    pub fn get(&self, key: &str) -> Result<Option<String>, AutopilotError> {
        self.db.with_conn(|conn| {
            let now = Utc::now().timestamp();
            conn.query_row(
                "SELECT value_json FROM cache
                 WHERE key = ?1 AND ?2 - created_at < ttl_seconds",
                rusqlite::params![key, now],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| AutopilotError::Storage(e.to_string()))
        })
    }

    /// Insert or replace a value with the given TTL in seconds.
    pub fn set(&self, key: &str, value: &str, ttl_seconds: u64) -> Result<(), AutopilotError> {
        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT OR REPLACE INTO cache (key, value_json, created_at, ttl_seconds)
                 VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![key, value, Utc::now().timestamp(), ttl_seconds],
            )
            .map_err(|e| AutopilotError::Storage(e.to_string()))?;
            Ok(())
        })
    }
}

/// Embedding cache keyed by content hash. Append-only, never evicted:
/// the cost of a stale row is storage, the cost of a miss is an API call.
pub struct EmbeddingCacheRepository {
    db: Arc<Database>,
}

impl EmbeddingCacheRepository {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Look up embeddings for a set of content hashes.
    pub fn get_many(
        &self,
        hashes: &[String],
    ) -> Result<HashMap<String, Vec<f32>>, AutopilotError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn
                .prepare("SELECT embedding_json FROM embed_cache WHERE content_hash = ?1")
                .map_err(|e| AutopilotError::Storage(e.to_string()))?;

            let mut found = HashMap::new();
            for hash in hashes {
                let json: Option<String> = stmt
                    .query_row(rusqlite::params![hash], |row| row.get(0))
                    .optional()
                    .map_err(|e| AutopilotError::Storage(e.to_string()))?;
                if let Some(json) = json {
                    let embedding: Vec<f32> = serde_json::from_str(&json)?;
                    found.insert(hash.clone(), embedding);
                }
            }
            Ok(found)
        })
    }

    /// Persist newly computed embeddings. Last writer wins on hash collisions
    /// between concurrent ingestion calls, which is harmless because the key
    /// is the content itself.
    pub fn put_many(&self, entries: &[(String, Vec<f32>)]) -> Result<(), AutopilotError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    "INSERT OR REPLACE INTO embed_cache (content_hash, embedding_json, created_at)
                     VALUES (?1, ?2, ?3)",
                )
                .map_err(|e| AutopilotError::Storage(e.to_string()))?;
            let now = Utc::now().timestamp();
            for (hash, embedding) in entries {
                stmt.execute(rusqlite::params![
                    hash,
                    serde_json::to_string(embedding)?,
                    now
                ])
                .map_err(|e| AutopilotError::Storage(e.to_string()))?;
            }
            Ok(())
        })
    }

    /// Number of cached embeddings.
    pub fn len(&self) -> Result<u64, AutopilotError> {
        self.db.with_conn(|conn| {
            let count: i64 = conn
                .query_row("SELECT COUNT(*) FROM embed_cache", [], |row| row.get(0))
                .map_err(|e| AutopilotError::Storage(e.to_string()))?;
            Ok(count as u64)
        })
    }

    pub fn is_empty(&self) -> Result<bool, AutopilotError> {
        Ok(self.len()? == 0)
    }
}

/// Durable store of knowledge chunks with their normalized embeddings.
///
/// The whole table is replaced on each ingestion; there are no incremental
/// chunk updates.
pub struct ChunkStore {
    db: Arc<Database>,
}

impl ChunkStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Replace all stored chunks in a single transaction.
    pub fn replace_all(
        &self,
        entries: &[(KnowledgeChunk, Vec<f32>)],
    ) -> Result<(), AutopilotError> {
        self.db.with_conn(|conn| {
            conn.execute_batch("BEGIN IMMEDIATE")
                .map_err(|e| AutopilotError::Storage(e.to_string()))?;

            let result = (|| -> Result<(), AutopilotError> {
                conn.execute("DELETE FROM kb_chunks", [])
                    .map_err(|e| AutopilotError::Storage(e.to_string()))?;
                let mut stmt = conn
                    .prepare(
                        "INSERT INTO kb_chunks (document_name, chunk_index, text, embedding_json)
                         VALUES (?1, ?2, ?3, ?4)",
                    )
                    .map_err(|e| AutopilotError::Storage(e.to_string()))?;
                for (chunk, embedding) in entries {
                    stmt.execute(rusqlite::params![
                        chunk.document_name,
                        chunk.chunk_index as i64,
                        chunk.text,
                        serde_json::to_string(embedding)?,
                    ])
                    .map_err(|e| AutopilotError::Storage(e.to_string()))?;
                }
                Ok(())
            })();

            match result {
                Ok(()) => conn
                    .execute_batch("COMMIT")
                    .map_err(|e| AutopilotError::Storage(e.to_string())),
                Err(e) => {
                    let _ = conn.execute_batch("ROLLBACK");
                    Err(e)
                }
            }
        })
    }

    /// Load all stored chunks in insertion order.
    pub fn load_all(&self) -> Result<Vec<(KnowledgeChunk, Vec<f32>)>, AutopilotError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT document_name, chunk_index, text, embedding_json
                     FROM kb_chunks ORDER BY id",
                )
                .map_err(|e| AutopilotError::Storage(e.to_string()))?;

            let rows = stmt
                .query_map([], |row| {
                    let document_name: String = row.get(0)?;
                    let chunk_index: i64 = row.get(1)?;
                    let text: String = row.get(2)?;
                    let embedding_json: String = row.get(3)?;
                    Ok((document_name, chunk_index, text, embedding_json))
                })
                .map_err(|e| AutopilotError::Storage(e.to_string()))?;

            let mut entries = Vec::new();
            for row in rows {
                let (document_name, chunk_index, text, embedding_json) =
                    row.map_err(|e| AutopilotError::Storage(e.to_string()))?;
                let embedding: Vec<f32> = serde_json::from_str(&embedding_json)?;
                entries.push((
                    KnowledgeChunk {
                        document_name,
                        chunk_index: chunk_index as usize,
                        text,
                    },
                    embedding,
                ));
            }
            Ok(entries)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_db() -> Arc<Database> {
        Arc::new(Database::in_memory().unwrap())
    }

    #[test]
    fn test_cache_set_get() {
        let cache = CacheRepository::new(make_db());
        cache.set("greeting", "\"hello\"", 3600).unwrap();
        assert_eq!(cache.get("greeting").unwrap().as_deref(), Some("\"hello\""));
        assert!(cache.get("missing").unwrap().is_none());
    }

    #[test]
    fn test_cache_expired_entry_reads_as_absent() {
        let db = make_db();
        let cache = CacheRepository::new(Arc::clone(&db));
        // Backdate an entry past its TTL; it must read as absent but stay
        // in the table (no proactive deletion).
        db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO cache (key, value_json, created_at, ttl_seconds)
                 VALUES ('old', '1', ?1, 60)",
                rusqlite::params![Utc::now().timestamp() - 120],
            )
            .map_err(|e| AutopilotError::Storage(e.to_string()))?;
            Ok(())
        })
        .unwrap();

        assert!(cache.get("old").unwrap().is_none());
        db.with_conn(|conn| {
            let count: i64 = conn
                .query_row("SELECT COUNT(*) FROM cache WHERE key = 'old'", [], |row| {
                    row.get(0)
                })
                .map_err(|e| AutopilotError::Storage(e.to_string()))?;
            assert_eq!(count, 1);
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_cache_replace() {
        let cache = CacheRepository::new(make_db());
        cache.set("k", "1", 3600).unwrap();
        cache.set("k", "2", 3600).unwrap();
        assert_eq!(cache.get("k").unwrap().as_deref(), Some("2"));
    }

    #[test]
    fn test_embed_cache_round_trip() {
        let cache = EmbeddingCacheRepository::new(make_db());
        assert!(cache.is_empty().unwrap());

        cache
            .put_many(&[
                ("hash_a".to_string(), vec![0.1, 0.2]),
                ("hash_b".to_string(), vec![0.3, 0.4]),
            ])
            .unwrap();

        let found = cache
            .get_many(&[
                "hash_a".to_string(),
                "hash_b".to_string(),
                "hash_c".to_string(),
            ])
            .unwrap();
        assert_eq!(found.len(), 2);
        assert_eq!(found["hash_a"], vec![0.1, 0.2]);
        assert!(!found.contains_key("hash_c"));
        assert_eq!(cache.len().unwrap(), 2);
    }

    #[test]
    fn test_chunk_store_replace_all() {
        let store = ChunkStore::new(make_db());

        let first = vec![(
            KnowledgeChunk {
                document_name: "pricing.md".to_string(),
                chunk_index: 0,
                text: "Starter at $29/mo.".to_string(),
            },
            vec![1.0, 0.0],
        )];
        store.replace_all(&first).unwrap();
        assert_eq!(store.load_all().unwrap().len(), 1);

        let second = vec![
            (
                KnowledgeChunk {
                    document_name: "faq.md".to_string(),
                    chunk_index: 0,
                    text: "How do I get started?".to_string(),
                },
                vec![0.0, 1.0],
            ),
            (
                KnowledgeChunk {
                    document_name: "faq.md".to_string(),
                    chunk_index: 1,
                    text: "Sign up on our website.".to_string(),
                },
                vec![0.5, 0.5],
            ),
        ];
        store.replace_all(&second).unwrap();

        let loaded = store.load_all().unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].0.document_name, "faq.md");
        assert_eq!(loaded[1].0.chunk_index, 1);
    }
}
