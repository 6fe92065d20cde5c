//! In-memory [`VectorStore`] implementation for tests.
//!
//! Uses `HashMap` and `Vec` behind `std::sync::RwLock` for thread safety.
//! Vector search is brute-force cosine similarity over all stored vectors,
//! matching the SQLite adapter's semantics record for record.

use std::collections::HashMap;
use std::sync::RwLock;

use anyhow::Result;
use async_trait::async_trait;

use crate::embedding::cosine_similarity;
use crate::models::{RecordMetadata, ScoredRecord, StoredRecord};

use super::{dims_mismatch_error, record_id, VectorStore};

struct StoredEntry {
    record: StoredRecord,
    vector: Vec<f32>,
}

#[derive(Default)]
struct MemCollection {
    dims: Option<usize>,
    entries: Vec<StoredEntry>,
}

/// In-memory store for tests.
#[derive(Default)]
pub struct InMemoryStore {
    collections: RwLock<HashMap<String, MemCollection>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VectorStore for InMemoryStore {
    async fn get_or_create_collection(&self, name: &str) -> Result<()> {
        let mut collections = self.collections.write().unwrap();
        collections.entry(name.to_string()).or_default();
        Ok(())
    }

    async fn add(
        &self,
        collection: &str,
        embeddings: &[Vec<f32>],
        metadatas: &[RecordMetadata],
    ) -> Result<usize> {
        if embeddings.len() != metadatas.len() {
            anyhow::bail!(
                "add: {} embeddings but {} metadata records",
                embeddings.len(),
                metadatas.len()
            );
        }
        if embeddings.is_empty() {
            return Ok(0);
        }

        let dims = embeddings[0].len();
        if embeddings.iter().any(|e| e.len() != dims) {
            anyhow::bail!("add: embeddings have differing lengths");
        }

        let mut collections = self.collections.write().unwrap();
        let coll = collections.entry(collection.to_string()).or_default();

        match coll.dims {
            Some(stored) if stored != dims => {
                return Err(dims_mismatch_error(collection, stored, dims));
            }
            Some(_) => {}
            None => coll.dims = Some(dims),
        }

        for (embedding, meta) in embeddings.iter().zip(metadatas.iter()) {
            let id = record_id(&meta.source, meta.chunk_index);
            coll.entries.push(StoredEntry {
                record: StoredRecord {
                    id,
                    text: meta.text.clone(),
                    metadata: meta.clone(),
                },
                vector: embedding.clone(),
            });
        }

        Ok(embeddings.len())
    }

    async fn query_by_vector(
        &self,
        collection: &str,
        vector: &[f32],
        k: usize,
    ) -> Result<Vec<ScoredRecord>> {
        let collections = self.collections.read().unwrap();
        let coll = match collections.get(collection) {
            Some(c) => c,
            None => return Ok(Vec::new()),
        };

        if let Some(stored) = coll.dims {
            if stored != vector.len() {
                return Err(dims_mismatch_error(collection, stored, vector.len()));
            }
        }

        let mut candidates: Vec<ScoredRecord> = coll
            .entries
            .iter()
            .map(|entry| ScoredRecord {
                record: entry.record.clone(),
                score: cosine_similarity(vector, &entry.vector),
            })
            .collect();

        candidates.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        candidates.truncate(k);

        Ok(candidates)
    }

    async fn full_scan(&self, collection: &str, limit: usize) -> Result<Vec<StoredRecord>> {
        let collections = self.collections.read().unwrap();
        let coll = match collections.get(collection) {
            Some(c) => c,
            None => return Ok(Vec::new()),
        };

        Ok(coll
            .entries
            .iter()
            .take(limit)
            .map(|e| e.record.clone())
            .collect())
    }

    async fn delete(&self, collection: &str, ids: &[String]) -> Result<u64> {
        let mut collections = self.collections.write().unwrap();
        let coll = match collections.get_mut(collection) {
            Some(c) => c,
            None => return Ok(0),
        };

        let before = coll.entries.len();
        coll.entries.retain(|e| !ids.contains(&e.record.id));
        Ok((before - coll.entries.len()) as u64)
    }

    async fn delete_by_source(&self, collection: &str, source: &str) -> Result<u64> {
        let mut collections = self.collections.write().unwrap();
        let coll = match collections.get_mut(collection) {
            Some(c) => c,
            None => return Ok(0),
        };

        let before = coll.entries.len();
        coll.entries.retain(|e| e.record.metadata.source != source);
        Ok((before - coll.entries.len()) as u64)
    }

    async fn delete_collection(&self, name: &str) -> Result<()> {
        let mut collections = self.collections.write().unwrap();
        collections.remove(name);
        Ok(())
    }
}
