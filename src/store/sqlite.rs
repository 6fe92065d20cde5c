//! SQLite-backed [`VectorStore`] implementation.
//!
//! Records live in a single `records` table keyed by generated id, with the
//! embedding stored as a little-endian f32 BLOB. Similarity queries fetch
//! the collection's vectors and rank by cosine similarity in Rust; corpora
//! here are small enough that a brute-force scan stays well under query
//! budgets and keeps the schema portable.

use anyhow::Result;
use async_trait::async_trait;
use sqlx::{Row, SqlitePool};

use crate::embedding::{blob_to_vec, cosine_similarity, vec_to_blob};
use crate::models::{RecordMetadata, ScoredRecord, StoredRecord};

use super::{dims_mismatch_error, record_id, VectorStore};

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn collection_dims(&self, name: &str) -> Result<Option<i64>> {
        let dims: Option<Option<i64>> =
            sqlx::query_scalar("SELECT dims FROM collections WHERE name = ?")
                .bind(name)
                .fetch_optional(&self.pool)
                .await?;
        Ok(dims.flatten())
    }
}

fn row_to_record(row: &sqlx::sqlite::SqliteRow) -> StoredRecord {
    let text: String = row.get("text");
    StoredRecord {
        id: row.get("id"),
        text: text.clone(),
        metadata: RecordMetadata {
            source: row.get("source"),
            chunk_index: row.get("chunk_index"),
            text,
            timestamp: row.get("timestamp"),
        },
    }
}

#[async_trait]
impl VectorStore for SqliteStore {
    async fn get_or_create_collection(&self, name: &str) -> Result<()> {
        let now = chrono::Utc::now().timestamp();
        sqlx::query(
            r#"
            INSERT INTO collections (name, dims, created_at) VALUES (?, NULL, ?)
            ON CONFLICT(name) DO NOTHING
            "#,
        )
        .bind(name)
        .bind(now)
        .execute(&self.pool)
        .await?;
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

        self.get_or_create_collection(collection).await?;

        match self.collection_dims(collection).await? {
            Some(stored) if stored as usize != dims => {
                return Err(dims_mismatch_error(collection, stored as usize, dims));
            }
            Some(_) => {}
            None => {
                sqlx::query("UPDATE collections SET dims = ? WHERE name = ?")
                    .bind(dims as i64)
                    .bind(collection)
                    .execute(&self.pool)
                    .await?;
            }
        }

        let mut tx = self.pool.begin().await?;
        for (embedding, meta) in embeddings.iter().zip(metadatas.iter()) {
            let id = record_id(&meta.source, meta.chunk_index);
            sqlx::query(
                r#"
                INSERT INTO records (id, collection, source, chunk_index, text, timestamp, embedding)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&id)
            .bind(collection)
            .bind(&meta.source)
            .bind(meta.chunk_index)
            .bind(&meta.text)
            .bind(&meta.timestamp)
            .bind(vec_to_blob(embedding))
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        Ok(embeddings.len())
    }

    async fn query_by_vector(
        &self,
        collection: &str,
        vector: &[f32],
        k: usize,
    ) -> Result<Vec<ScoredRecord>> {
        if let Some(stored) = self.collection_dims(collection).await? {
            if stored as usize != vector.len() {
                return Err(dims_mismatch_error(collection, stored as usize, vector.len()));
            }
        }

        let rows = sqlx::query(
            r#"
            SELECT id, source, chunk_index, text, timestamp, embedding
            FROM records
            WHERE collection = ?
            "#,
        )
        .bind(collection)
        .fetch_all(&self.pool)
        .await?;

        let mut candidates: Vec<ScoredRecord> = rows
            .iter()
            .map(|row| {
                let blob: Vec<u8> = row.get("embedding");
                let stored_vec = blob_to_vec(&blob);
                ScoredRecord {
                    record: row_to_record(row),
                    score: cosine_similarity(vector, &stored_vec),
                }
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
        let rows = sqlx::query(
            r#"
            SELECT id, source, chunk_index, text, timestamp
            FROM records
            WHERE collection = ?
            ORDER BY rowid
            LIMIT ?
            "#,
        )
        .bind(collection)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(row_to_record).collect())
    }

    async fn delete(&self, collection: &str, ids: &[String]) -> Result<u64> {
        let mut deleted = 0u64;
        let mut tx = self.pool.begin().await?;
        for id in ids {
            let result = sqlx::query("DELETE FROM records WHERE collection = ? AND id = ?")
                .bind(collection)
                .bind(id)
                .execute(&mut *tx)
                .await?;
            deleted += result.rows_affected();
        }
        tx.commit().await?;
        Ok(deleted)
    }

    async fn delete_by_source(&self, collection: &str, source: &str) -> Result<u64> {
        let result = sqlx::query("DELETE FROM records WHERE collection = ? AND source = ?")
            .bind(collection)
            .bind(source)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn delete_collection(&self, name: &str) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM records WHERE collection = ?")
            .bind(name)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM collections WHERE name = ?")
            .bind(name)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }
}
