//! Storage abstraction for document records.
//!
//! The [`DocumentStore`] trait defines the durable-storage contract the
//! ingestion pipeline and retrieval engine rely on, enabling pluggable
//! backends (SQLite for deployments, in-memory for tests).
//!
//! Contract highlights:
//! - `insert` persists a fully-populated record atomically and rejects any
//!   embedding whose length differs from the deployment dimension.
//! - `fetch`/`delete` are owner-scoped; an absent record and a record owned
//!   by someone else are indistinguishable (`NotFound`), so callers cannot
//!   probe for existence.
//! - `nearest_neighbors` ranks by cosine similarity with deterministic
//!   tie-breaking (newest `created_at` first, then `id`), filters results
//!   below the similarity threshold, and returns at most `k` records.
//! - `insert`/`delete` for the same id are linearizable with respect to
//!   each other; cross-id operations need no coordination.

pub mod memory;
pub mod sqlite;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{DocumentRecord, ScoredDocument};

/// Scope of a nearest-neighbor query.
#[derive(Debug, Clone)]
pub enum SearchScope {
    /// Rank a single document against the query.
    Document(String),
    /// Rank every document in a principal's corpus.
    Corpus(String),
}

/// Storage errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The supplied vector does not match the deployment dimension. This is
    /// a configuration or programming error, never coerced.
    #[error("embedding dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },
    /// Absent record or non-matching owner; deliberately indistinguishable.
    #[error("document not found")]
    NotFound,
    #[error("store backend error: {0}")]
    Backend(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        StoreError::Backend(err.to_string())
    }
}

/// Durable, keyed storage of fully-ingested document records.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Deployment-wide embedding dimension enforced on every insert.
    fn dims(&self) -> usize;

    /// Atomically persist a fully-populated record. Rejects mismatched
    /// embedding dimensions; a partial record is never observable.
    async fn insert(&self, record: &DocumentRecord) -> Result<(), StoreError>;

    /// Fetch a record iff it exists and belongs to `owner_id`.
    async fn fetch(&self, id: &str, owner_id: &str) -> Result<DocumentRecord, StoreError>;

    /// Delete a record owned by `owner_id`. Idempotent: deleting a
    /// nonexistent id succeeds.
    async fn delete(&self, id: &str, owner_id: &str) -> Result<(), StoreError>;

    /// Look up a record by the content fingerprint forwarded at ingestion.
    /// Supports the external duplicate-upload check.
    async fn find_by_fingerprint(
        &self,
        owner_id: &str,
        fingerprint: &str,
    ) -> Result<Option<DocumentRecord>, StoreError>;

    /// List a principal's documents, newest first.
    async fn list(&self, owner_id: &str) -> Result<Vec<DocumentRecord>, StoreError>;

    /// Return up to `k` records in `scope` ranked by cosine similarity to
    /// `query`, excluding results below `min_similarity`. Ordering is
    /// deterministic: score desc, then `created_at` desc, then `id` asc.
    async fn nearest_neighbors(
        &self,
        query: &[f32],
        scope: &SearchScope,
        k: usize,
        min_similarity: f32,
    ) -> Result<Vec<ScoredDocument>, StoreError>;
}

/// Sort scored documents into the deterministic ranking order shared by
/// both backends: score desc, `created_at` desc, `id` asc.
pub(crate) fn rank(results: &mut Vec<ScoredDocument>, k: usize, min_similarity: f32) {
    results.retain(|s| s.score >= min_similarity);
    results.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(b.record.created_at.cmp(&a.record.created_at))
            .then(a.record.id.cmp(&b.record.id))
    });
    results.truncate(k);
}
