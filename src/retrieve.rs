//! Semantic retrieval over ingested documents.
//!
//! Given a question and a target document (or a whole corpus), embeds the
//! query and asks the store for the most similar records above a similarity
//! threshold. An empty result set is a legitimate outcome ("no grounding
//! found"), not an error; every other failure propagates, since silently
//! returning wrong context would corrupt downstream answers.

use std::sync::Arc;

use anyhow::Result;
use thiserror::Error;

use crate::config::Config;
use crate::db;
use crate::embedding::{self, Embedder};
use crate::models::DocumentRecord;
use crate::store::sqlite::SqliteStore;
use crate::store::{DocumentStore, SearchScope, StoreError};
use crate::upstream::UpstreamError;

/// Width of the content excerpt attached to each hit.
const SNIPPET_CHARS: usize = 240;

#[derive(Debug, Error)]
pub enum RetrieveError {
    /// Target document absent or owned by someone else; the two cases are
    /// deliberately indistinguishable.
    #[error("document not found")]
    NotFound,
    #[error(transparent)]
    Upstream(#[from] UpstreamError),
    #[error("store backend error: {0}")]
    Store(String),
}

impl From<StoreError> for RetrieveError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => RetrieveError::NotFound,
            other => RetrieveError::Store(other.to_string()),
        }
    }
}

/// A ranked retrieval result.
#[derive(Debug, Clone)]
pub struct RetrievalHit {
    pub document: DocumentRecord,
    /// Cosine similarity of the document to the query, in `[-1.0, 1.0]`.
    pub score: f32,
    /// Leading excerpt of the document content for display.
    pub snippet: String,
}

/// Embeds queries and ranks stored documents against them.
pub struct RetrievalEngine {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn DocumentStore>,
}

impl RetrievalEngine {
    pub fn new(embedder: Arc<dyn Embedder>, store: Arc<dyn DocumentStore>) -> Self {
        Self { embedder, store }
    }

    /// Retrieve up to `k` documents relevant to `query`, scoped to a single
    /// document when `document_id` is given, otherwise to the owner's whole
    /// corpus. Results are ordered by descending score and exclude anything
    /// below `min_similarity`.
    pub async fn retrieve(
        &self,
        query: &str,
        document_id: Option<&str>,
        owner_id: &str,
        k: usize,
        min_similarity: f32,
    ) -> Result<Vec<RetrievalHit>, RetrieveError> {
        // Ownership and existence are checked before any embedding work, so
        // an unauthorized or stale target never costs an upstream call.
        let scope = match document_id {
            Some(id) => {
                self.store.fetch(id, owner_id).await?;
                SearchScope::Document(id.to_string())
            }
            None => SearchScope::Corpus(owner_id.to_string()),
        };

        let query_vec = self.embedder.embed(query).await?;
        let scored = self
            .store
            .nearest_neighbors(&query_vec, &scope, k, min_similarity)
            .await?;

        Ok(scored
            .into_iter()
            .map(|s| RetrievalHit {
                snippet: excerpt(&s.record.content, SNIPPET_CHARS),
                document: s.record,
                score: s.score,
            })
            .collect())
    }
}

/// Assemble the grounding context handed to the chat-completion
/// collaborator: for each hit, the document name, its synopsis, and the
/// full extracted content, in rank order.
pub fn grounding_context(hits: &[RetrievalHit]) -> String {
    let mut out = String::new();
    for hit in hits {
        if !out.is_empty() {
            out.push_str("\n\n");
        }
        out.push_str(&format!("Document: {}\n", hit.document.name));
        out.push_str(&format!("Summary: {}\n", hit.document.summary));
        out.push_str(&format!("Content: {}", hit.document.content));
    }
    out
}

fn excerpt(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

/// CLI entry point: runs a retrieval and prints ranked results.
pub async fn run_retrieve(
    config: &Config,
    query: &str,
    document_id: Option<&str>,
    owner: &str,
    k: Option<usize>,
    min_similarity: Option<f32>,
) -> Result<()> {
    if query.trim().is_empty() {
        println!("No results.");
        return Ok(());
    }
    if !config.embedding.is_enabled() {
        anyhow::bail!("Embedding provider is disabled. Set [embedding] provider in config.");
    }
    let dims = config
        .embedding
        .dims
        .ok_or_else(|| anyhow::anyhow!("embedding.dims required"))?;

    let pool = db::connect(config).await?;
    let store = Arc::new(SqliteStore::new(pool.clone(), dims));
    let engine = RetrievalEngine::new(embedding::create_embedder(&config.embedding)?, store);

    let k = k.unwrap_or(config.retrieval.top_k);
    let min_similarity = min_similarity.unwrap_or(config.retrieval.min_similarity);

    let hits = match engine
        .retrieve(query, document_id, owner, k, min_similarity)
        .await
    {
        Ok(hits) => hits,
        Err(RetrieveError::NotFound) => {
            eprintln!("Error: document not found");
            pool.close().await;
            std::process::exit(1);
        }
        Err(e) => {
            pool.close().await;
            return Err(e.into());
        }
    };

    if hits.is_empty() {
        println!("No results.");
        pool.close().await;
        return Ok(());
    }

    for (i, hit) in hits.iter().enumerate() {
        println!("{}. [{:.2}] {}", i + 1, hit.score, hit.document.name);
        println!("    summary: {}", hit.document.summary);
        println!("    excerpt: \"{}\"", hit.snippet.replace('\n', " ").trim());
        println!("    id: {}", hit.document.id);
        println!();
    }

    pool.close().await;
    Ok(())
}
