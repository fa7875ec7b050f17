//! SQLite [`DocumentStore`] implementation.
//!
//! One row per document; the embedding vector is stored as a little-endian
//! `f32` BLOB. The insert is a single statement, so a record is either
//! fully present or absent; SQLite's write serialization gives insert and
//! delete for the same id linearizable ordering. Vector search is a
//! brute-force cosine scan over the scoped rows, computed in Rust.

use async_trait::async_trait;
use sqlx::{Row, SqlitePool};

use crate::embedding::{blob_to_vec, cosine_similarity, vec_to_blob};
use crate::models::{DocumentRecord, ScoredDocument};

use super::{rank, DocumentStore, SearchScope, StoreError};

pub struct SqliteStore {
    pool: SqlitePool,
    dims: usize,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool, dims: usize) -> Self {
        Self { pool, dims }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn record_from_row(row: &sqlx::sqlite::SqliteRow) -> DocumentRecord {
    let blob: Vec<u8> = row.get("embedding");
    DocumentRecord {
        id: row.get("id"),
        owner_id: row.get("owner_id"),
        name: row.get("name"),
        media_type: row.get("media_type"),
        size_bytes: row.get("size_bytes"),
        content: row.get("content"),
        summary: row.get("summary"),
        embedding: blob_to_vec(&blob),
        fingerprint: row.get("fingerprint"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

const SELECT_COLUMNS: &str = "id, owner_id, name, media_type, size_bytes, content, summary, embedding, fingerprint, created_at, updated_at";

#[async_trait]
impl DocumentStore for SqliteStore {
    fn dims(&self) -> usize {
        self.dims
    }

    async fn insert(&self, record: &DocumentRecord) -> Result<(), StoreError> {
        if record.embedding.len() != self.dims {
            return Err(StoreError::DimensionMismatch {
                expected: self.dims,
                got: record.embedding.len(),
            });
        }

        let blob = vec_to_blob(&record.embedding);
        sqlx::query(
            r#"
            INSERT INTO documents (id, owner_id, name, media_type, size_bytes, content, summary, embedding, fingerprint, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.id)
        .bind(&record.owner_id)
        .bind(&record.name)
        .bind(&record.media_type)
        .bind(record.size_bytes)
        .bind(&record.content)
        .bind(&record.summary)
        .bind(&blob)
        .bind(&record.fingerprint)
        .bind(record.created_at)
        .bind(record.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn fetch(&self, id: &str, owner_id: &str) -> Result<DocumentRecord, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM documents WHERE id = ? AND owner_id = ?",
            SELECT_COLUMNS
        ))
        .bind(id)
        .bind(owner_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| record_from_row(&r)).ok_or(StoreError::NotFound)
    }

    async fn delete(&self, id: &str, owner_id: &str) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM documents WHERE id = ? AND owner_id = ?")
            .bind(id)
            .bind(owner_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn find_by_fingerprint(
        &self,
        owner_id: &str,
        fingerprint: &str,
    ) -> Result<Option<DocumentRecord>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM documents WHERE owner_id = ? AND fingerprint = ? ORDER BY created_at DESC, id ASC LIMIT 1",
            SELECT_COLUMNS
        ))
        .bind(owner_id)
        .bind(fingerprint)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| record_from_row(&r)))
    }

    async fn list(&self, owner_id: &str) -> Result<Vec<DocumentRecord>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM documents WHERE owner_id = ? ORDER BY created_at DESC, id ASC",
            SELECT_COLUMNS
        ))
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(record_from_row).collect())
    }

    async fn nearest_neighbors(
        &self,
        query: &[f32],
        scope: &SearchScope,
        k: usize,
        min_similarity: f32,
    ) -> Result<Vec<ScoredDocument>, StoreError> {
        if query.len() != self.dims {
            return Err(StoreError::DimensionMismatch {
                expected: self.dims,
                got: query.len(),
            });
        }

        let rows = match scope {
            SearchScope::Document(id) => {
                sqlx::query(&format!(
                    "SELECT {} FROM documents WHERE id = ?",
                    SELECT_COLUMNS
                ))
                .bind(id)
                .fetch_all(&self.pool)
                .await?
            }
            SearchScope::Corpus(owner_id) => {
                sqlx::query(&format!(
                    "SELECT {} FROM documents WHERE owner_id = ?",
                    SELECT_COLUMNS
                ))
                .bind(owner_id)
                .fetch_all(&self.pool)
                .await?
            }
        };

        let mut results: Vec<ScoredDocument> = rows
            .iter()
            .map(|row| {
                let record = record_from_row(row);
                ScoredDocument {
                    score: cosine_similarity(query, &record.embedding),
                    record,
                }
            })
            .collect();

        rank(&mut results, k, min_similarity);
        Ok(results)
    }
}
