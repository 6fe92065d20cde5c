//! Vector store abstraction.
//!
//! The [`VectorStore`] trait defines the storage operations the ingestion
//! and retrieval pipeline needs, enabling pluggable backends (SQLite,
//! in-memory for tests).
//!
//! The store owns record lifecycle: records are created only during
//! ingestion, deleted only by explicit per-source deletion or collection
//! reset, and never mutated in place. Each collection pins its embedding
//! dimensionality on first add; a later disagreement (add or query) is a
//! fatal store error whose remedy is an administrative collection reset.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;
pub mod sqlite;

use anyhow::Result;
use async_trait::async_trait;
use uuid::Uuid;

use crate::models::{RecordMetadata, ScoredRecord, StoredRecord};

/// Abstract vector store backend.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`get_or_create_collection`](VectorStore::get_or_create_collection) | Idempotent collection creation |
/// | [`add`](VectorStore::add) | Persist (embedding, metadata) pairs as immutable records |
/// | [`query_by_vector`](VectorStore::query_by_vector) | Top-k cosine similarity query |
/// | [`full_scan`](VectorStore::full_scan) | Unranked retrieval for fallback paths |
/// | [`delete`](VectorStore::delete) | Delete records by id |
/// | [`delete_by_source`](VectorStore::delete_by_source) | Delete all records of one source |
/// | [`delete_collection`](VectorStore::delete_collection) | Drop a collection entirely |
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Create the collection if it does not exist. Idempotent.
    async fn get_or_create_collection(&self, name: &str) -> Result<()>;

    /// Persist one record per (embedding, metadata) pair, generating a
    /// globally unique id for each. Returns the number of records written.
    async fn add(
        &self,
        collection: &str,
        embeddings: &[Vec<f32>],
        metadatas: &[RecordMetadata],
    ) -> Result<usize>;

    /// Return the `k` stored records nearest to `vector`, nearest first.
    async fn query_by_vector(
        &self,
        collection: &str,
        vector: &[f32],
        k: usize,
    ) -> Result<Vec<ScoredRecord>>;

    /// Return up to `limit` records in insertion order. Used only by
    /// fallback paths that need the whole corpus.
    async fn full_scan(&self, collection: &str, limit: usize) -> Result<Vec<StoredRecord>>;

    /// Delete records by id. Returns the number deleted.
    async fn delete(&self, collection: &str, ids: &[String]) -> Result<u64>;

    /// Delete every record whose metadata source equals `source`.
    /// Returns the number deleted.
    async fn delete_by_source(&self, collection: &str, source: &str) -> Result<u64>;

    /// Drop the collection and all of its records.
    async fn delete_collection(&self, name: &str) -> Result<()>;
}

/// Generates a record id from the source name, a random suffix, and the
/// chunk position. The random component keeps ids unique across repeated
/// ingests of the same filename.
pub fn record_id(source: &str, position: i64) -> String {
    let stem = source
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(source)
        .trim();
    let slug: String = stem
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' {
                c.to_ascii_lowercase()
            } else {
                '-'
            }
        })
        .collect();
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{}-{}-{}", slug, &suffix[..8], position)
}

/// The store-level error message for an embedding dimensionality conflict.
/// Recovery is an explicit collection reset, not automatic.
pub fn dims_mismatch_error(collection: &str, stored: usize, got: usize) -> anyhow::Error {
    anyhow::anyhow!(
        "Embedding dimension mismatch in collection '{}': stored records have {} dims, got {}. \
         Reset the collection to re-ingest with the current embedding model.",
        collection,
        stored,
        got
    )
}
