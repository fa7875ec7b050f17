//! Core data models for askdoc.
//!
//! These types represent the files, document records, and per-file outcomes
//! that flow through the ingestion pipeline and the retrieval engine.

use sha2::{Digest, Sha256};

use crate::extract::ExtractError;
use crate::store::StoreError;
use crate::upstream::UpstreamError;

/// A raw uploaded file handed to the ingestion pipeline by the intake layer.
///
/// The intake layer (UI, HTTP handler, or the CLI) is responsible for any
/// user-facing validation; the pipeline takes the bytes and declared media
/// type at face value and fails per-file when they turn out to be bad.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    /// Original filename, kept on the stored record.
    pub name: String,
    /// Declared MIME type (e.g. `text/plain`, `application/pdf`).
    pub media_type: String,
    /// Raw payload.
    pub bytes: Vec<u8>,
    /// Content fingerprint supplied by the intake layer for duplicate
    /// detection. Forwarded onto the stored record verbatim; the dedup
    /// check itself is a collaborator concern.
    pub fingerprint: Option<String>,
}

impl UploadedFile {
    /// Canonical content fingerprint: hex SHA-256 of the raw bytes.
    pub fn fingerprint_bytes(bytes: &[u8]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        format!("{:x}", hasher.finalize())
    }
}

/// A fully-populated document record as persisted by the store.
///
/// Records are written exactly once, at the end of a successful ingestion;
/// `content`, `summary`, and `embedding` are never mutated afterward.
/// Reprocessing is modeled as delete + insert.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentRecord {
    pub id: String,
    pub owner_id: String,
    pub name: String,
    pub media_type: String,
    pub size_bytes: i64,
    /// Full extracted plain text.
    pub content: String,
    /// Short synopsis, or the sentinel value when summarization failed.
    pub summary: String,
    /// Embedding vector; length always equals the deployment dimension.
    pub embedding: Vec<f32>,
    pub fingerprint: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Stage of the per-file ingestion state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestStage {
    Received,
    Extracting,
    Summarizing,
    Embedding,
    Storing,
}

impl std::fmt::Display for IngestStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            IngestStage::Received => "received",
            IngestStage::Extracting => "extracting",
            IngestStage::Summarizing => "summarizing",
            IngestStage::Embedding => "embedding",
            IngestStage::Storing => "storing",
        };
        f.write_str(s)
    }
}

/// Error that failed a single file's ingestion, tagged by origin.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error(transparent)]
    Extract(#[from] ExtractError),
    #[error(transparent)]
    Upstream(#[from] UpstreamError),
    #[error(transparent)]
    Store(#[from] StoreError),
    /// The worker task died before producing an outcome.
    #[error("ingestion task failed: {0}")]
    Task(String),
}

/// Per-file result of a batch ingestion. A batch always yields one outcome
/// per submitted file; sibling failures never roll a completed file back.
#[derive(Debug)]
pub enum IngestOutcome {
    Completed(DocumentRecord),
    Failed {
        file_name: String,
        stage: IngestStage,
        error: IngestError,
    },
}

impl IngestOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, IngestOutcome::Completed(_))
    }

    pub fn record(&self) -> Option<&DocumentRecord> {
        match self {
            IngestOutcome::Completed(record) => Some(record),
            IngestOutcome::Failed { .. } => None,
        }
    }
}

/// A stored record paired with its similarity score, as returned by
/// [`DocumentStore::nearest_neighbors`](crate::store::DocumentStore::nearest_neighbors).
#[derive(Debug, Clone)]
pub struct ScoredDocument {
    pub record: DocumentRecord,
    /// Cosine similarity to the query vector, in `[-1.0, 1.0]`.
    pub score: f32,
}
