//! Ingestion pipeline orchestration.
//!
//! Each uploaded file runs an independent state machine:
//! `Received → Extracting → Summarizing → Embedding → Storing → Completed`,
//! with any stage able to fail that one file. A batch returns one outcome
//! per file; sibling files are never aborted or rolled back. All
//! intermediate values stay in memory; the only durable write is the single
//! atomic insert at the `Storing` stage, so a record is never visible to
//! retrieval until it is fully populated.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Result};
use chrono::Utc;
use tokio::sync::Semaphore;
use uuid::Uuid;

use crate::config::Config;
use crate::db;
use crate::embedding::{self, Embedder};
use crate::extract;
use crate::models::{DocumentRecord, IngestError, IngestOutcome, IngestStage, UploadedFile};
use crate::store::sqlite::SqliteStore;
use crate::store::{DocumentStore, StoreError};
use crate::summarize::{self, Summarizer, SUMMARY_UNAVAILABLE};

/// Orchestrates extraction, summarization, embedding, and storage for
/// batches of uploaded files. All collaborators are injected capabilities,
/// so tests run the full pipeline against fakes.
#[derive(Clone)]
pub struct IngestPipeline {
    summarizer: Arc<dyn Summarizer>,
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn DocumentStore>,
    max_concurrent: usize,
}

impl IngestPipeline {
    pub fn new(
        summarizer: Arc<dyn Summarizer>,
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn DocumentStore>,
        max_concurrent: usize,
    ) -> Self {
        Self {
            summarizer,
            embedder,
            store,
            max_concurrent: max_concurrent.max(1),
        }
    }

    /// Ingest a batch of files for one owner. Files are processed
    /// concurrently under a bounded worker pool; outcomes are returned in
    /// submission order, one per file.
    pub async fn ingest_batch(
        &self,
        owner_id: &str,
        files: Vec<UploadedFile>,
    ) -> Vec<IngestOutcome> {
        let semaphore = Arc::new(Semaphore::new(self.max_concurrent));
        let mut handles = Vec::with_capacity(files.len());

        for file in files {
            let pipeline = self.clone();
            let owner = owner_id.to_string();
            let semaphore = Arc::clone(&semaphore);
            handles.push(tokio::spawn(async move {
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => {
                        return IngestOutcome::Failed {
                            file_name: file.name,
                            stage: IngestStage::Received,
                            error: IngestError::Task("worker pool closed".to_string()),
                        }
                    }
                };
                pipeline.ingest_file(&owner, file).await
            }));
        }

        let mut outcomes = Vec::with_capacity(handles.len());
        for handle in handles {
            outcomes.push(handle.await.unwrap_or_else(|e| IngestOutcome::Failed {
                file_name: String::new(),
                stage: IngestStage::Received,
                error: IngestError::Task(e.to_string()),
            }));
        }
        outcomes
    }

    /// Run one file through the state machine.
    async fn ingest_file(&self, owner_id: &str, file: UploadedFile) -> IngestOutcome {
        // Extracting: rejects unsupported media types before any LLM work.
        let content = match extract::extract_text(&file.bytes, &file.media_type) {
            Ok(text) => text,
            Err(err) => {
                return IngestOutcome::Failed {
                    file_name: file.name,
                    stage: IngestStage::Extracting,
                    error: err.into(),
                }
            }
        };

        // Summarizing: degrades to the sentinel, never fails the file.
        let summary = match self.summarizer.summarize(&content).await {
            Ok(summary) => summary,
            Err(err) => {
                tracing::warn!(file = %file.name, error = %err, "summarization failed, storing sentinel");
                SUMMARY_UNAVAILABLE.to_string()
            }
        };

        // Embedding: a record without a vector is useless to retrieval,
        // so this failure fails the file.
        let embedding = match self.embedder.embed(&content).await {
            Ok(vector) => vector,
            Err(err) => {
                return IngestOutcome::Failed {
                    file_name: file.name,
                    stage: IngestStage::Embedding,
                    error: err.into(),
                }
            }
        };

        // Storing: the one durable write, atomic in the store.
        let now = Utc::now().timestamp();
        let record = DocumentRecord {
            id: Uuid::new_v4().to_string(),
            owner_id: owner_id.to_string(),
            name: file.name,
            media_type: file.media_type,
            size_bytes: file.bytes.len() as i64,
            content,
            summary,
            embedding,
            fingerprint: file.fingerprint,
            created_at: now,
            updated_at: now,
        };

        match self.store.insert(&record).await {
            Ok(()) => IngestOutcome::Completed(record),
            Err(err) => {
                if matches!(err, StoreError::DimensionMismatch { .. }) {
                    tracing::error!(
                        file = %record.name,
                        error = %err,
                        "embedding dimension mismatch: model changed without store migration?"
                    );
                }
                IngestOutcome::Failed {
                    file_name: record.name,
                    stage: IngestStage::Storing,
                    error: err.into(),
                }
            }
        }
    }
}

/// CLI entry point: read files from disk, infer media types, fingerprint
/// the bytes, and run the batch. Plays the file-intake collaborator role.
pub async fn run_ingest(config: &Config, owner: &str, paths: &[PathBuf]) -> Result<()> {
    if !config.embedding.is_enabled() {
        bail!("Embedding provider is disabled. Set [embedding] provider in config.");
    }
    let dims = config
        .embedding
        .dims
        .ok_or_else(|| anyhow::anyhow!("embedding.dims required"))?;

    let mut files = Vec::with_capacity(paths.len());
    for path in paths {
        let media_type = extract::media_type_for_path(path)
            .unwrap_or("application/octet-stream")
            .to_string();
        let bytes = std::fs::read(path)?;
        let fingerprint = UploadedFile::fingerprint_bytes(&bytes);
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        files.push(UploadedFile {
            name,
            media_type,
            bytes,
            fingerprint: Some(fingerprint),
        });
    }

    let pool = db::connect(config).await?;
    let store = Arc::new(SqliteStore::new(pool.clone(), dims));
    let pipeline = IngestPipeline::new(
        summarize::create_summarizer(&config.summary)?,
        embedding::create_embedder(&config.embedding)?,
        store,
        config.ingest.max_concurrent,
    );

    let outcomes = pipeline.ingest_batch(owner, files).await;

    let completed = outcomes.iter().filter(|o| o.is_completed()).count();
    println!("ingest ({} files, owner: {})", outcomes.len(), owner);
    for outcome in &outcomes {
        match outcome {
            IngestOutcome::Completed(record) => {
                println!("  + {} id={}", record.name, record.id);
            }
            IngestOutcome::Failed {
                file_name,
                stage,
                error,
            } => {
                println!("  ! {} failed at {}: {}", file_name, stage, error);
            }
        }
    }
    println!("  completed: {}", completed);
    println!("  failed: {}", outcomes.len() - completed);
    println!("ok");

    pool.close().await;
    Ok(())
}
