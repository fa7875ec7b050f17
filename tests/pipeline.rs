//! End-to-end pipeline and retrieval tests against fake capabilities.
//!
//! The summarizer, embedder, and store are injected, so the full state
//! machine runs deterministically with no network: batch isolation,
//! sentinel summaries, visibility, fingerprint forwarding, bounded
//! concurrency, and the retrieval path on top of ingested records.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use askdoc::embedding::Embedder;
use askdoc::extract::{MEDIA_MARKDOWN, MEDIA_TEXT};
use askdoc::ingest::IngestPipeline;
use askdoc::models::{IngestError, IngestOutcome, IngestStage, UploadedFile};
use askdoc::retrieve::{grounding_context, RetrievalEngine, RetrieveError};
use askdoc::store::memory::InMemoryStore;
use askdoc::store::DocumentStore;
use askdoc::summarize::{Summarizer, SUMMARY_UNAVAILABLE};
use askdoc::upstream::UpstreamError;

const DIMS: usize = 8;

/// Marker that makes the stub embedder fail for a specific document.
const POISON: &str = "UNEMBEDDABLE";

struct StubSummarizer {
    fail: bool,
    calls: AtomicUsize,
}

impl StubSummarizer {
    fn ok() -> Arc<Self> {
        Arc::new(Self {
            fail: false,
            calls: AtomicUsize::new(0),
        })
    }

    fn failing() -> Arc<Self> {
        Arc::new(Self {
            fail: true,
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl Summarizer for StubSummarizer {
    async fn summarize(&self, text: &str) -> Result<String, UpstreamError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(UpstreamError::Exhausted {
                attempts: 3,
                last: "HTTP 429: rate limited".to_string(),
            });
        }
        Ok(format!("Synopsis: {}", text.chars().take(40).collect::<String>()))
    }
}

struct StubEmbedder {
    dims: usize,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    delay: Duration,
}

impl StubEmbedder {
    fn new() -> Arc<Self> {
        Self::with_delay(Duration::ZERO)
    }

    fn with_delay(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            dims: DIMS,
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            delay,
        })
    }

    /// Deterministic text-to-vector mapping. A dominant shared component
    /// keeps any two texts similar (> 0.9), which is what the threshold
    /// tests rely on; per-byte contributions make distinct texts distinct.
    fn vector_for(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0.0f32; self.dims];
        v[0] = 1.0;
        for (i, b) in text.bytes().enumerate() {
            v[1 + (i % (self.dims - 1))] += (b as f32) / 2550.0;
        }
        v
    }
}

#[async_trait]
impl Embedder for StubEmbedder {
    fn model_name(&self) -> &str {
        "stub-embedder"
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, UpstreamError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if text.contains(POISON) {
            return Err(UpstreamError::Exhausted {
                attempts: 3,
                last: "HTTP 503: service unavailable".to_string(),
            });
        }
        Ok(self.vector_for(text))
    }
}

fn file(name: &str, media_type: &str, content: &str) -> UploadedFile {
    UploadedFile {
        name: name.to_string(),
        media_type: media_type.to_string(),
        bytes: content.as_bytes().to_vec(),
        fingerprint: Some(UploadedFile::fingerprint_bytes(content.as_bytes())),
    }
}

fn pipeline(
    summarizer: Arc<StubSummarizer>,
    embedder: Arc<StubEmbedder>,
    store: Arc<InMemoryStore>,
    max_concurrent: usize,
) -> IngestPipeline {
    IngestPipeline::new(summarizer, embedder, store, max_concurrent)
}

#[tokio::test]
async fn happy_path_produces_fully_populated_record() {
    let store = Arc::new(InMemoryStore::new(DIMS));
    let pipe = pipeline(StubSummarizer::ok(), StubEmbedder::new(), store.clone(), 4);

    let outcomes = pipe
        .ingest_batch(
            "alice",
            vec![file("notes.md", MEDIA_MARKDOWN, "# Notes\n\nSome notes.")],
        )
        .await;

    assert_eq!(outcomes.len(), 1);
    let record = outcomes[0].record().expect("should complete");
    assert_eq!(record.owner_id, "alice");
    assert_eq!(record.name, "notes.md");
    assert_eq!(record.content, "# Notes\n\nSome notes.");
    assert!(record.summary.starts_with("Synopsis:"));
    assert_eq!(record.embedding.len(), DIMS);
    assert!(record.created_at > 0);

    // And it is visible in the store, fully populated.
    let stored = store.fetch(&record.id, "alice").await.unwrap();
    assert_eq!(&stored, record);
}

#[tokio::test]
async fn one_bad_file_does_not_abort_siblings() {
    let store = Arc::new(InMemoryStore::new(DIMS));
    let pipe = pipeline(StubSummarizer::ok(), StubEmbedder::new(), store.clone(), 4);

    let outcomes = pipe
        .ingest_batch(
            "alice",
            vec![
                file("good-1.txt", MEDIA_TEXT, "First good file."),
                file("bad.bin", "application/octet-stream", "whatever"),
                file("good-2.txt", MEDIA_TEXT, "Second good file."),
            ],
        )
        .await;

    assert_eq!(outcomes.len(), 3);
    assert!(outcomes[0].is_completed());
    assert!(outcomes[2].is_completed());

    match &outcomes[1] {
        IngestOutcome::Failed {
            file_name,
            stage,
            error,
        } => {
            assert_eq!(file_name, "bad.bin");
            assert_eq!(*stage, IngestStage::Extracting);
            assert!(matches!(error, IngestError::Extract(_)));
        }
        other => panic!("expected failure, got {:?}", other),
    }

    assert_eq!(store.list("alice").await.unwrap().len(), 2);
}

#[tokio::test]
async fn unsupported_media_type_never_reaches_llm_calls() {
    let store = Arc::new(InMemoryStore::new(DIMS));
    let summarizer = StubSummarizer::ok();
    let embedder = StubEmbedder::new();
    let pipe = pipeline(summarizer.clone(), embedder.clone(), store, 4);

    let outcomes = pipe
        .ingest_batch(
            "alice",
            vec![file("image.png", "image/png", "not really a png")],
        )
        .await;

    assert!(!outcomes[0].is_completed());
    assert_eq!(summarizer.calls.load(Ordering::SeqCst), 0);
    assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn embedding_failure_fails_file_with_nothing_persisted() {
    let store = Arc::new(InMemoryStore::new(DIMS));
    let pipe = pipeline(StubSummarizer::ok(), StubEmbedder::new(), store.clone(), 4);

    let outcomes = pipe
        .ingest_batch(
            "alice",
            vec![file(
                "doomed.txt",
                MEDIA_TEXT,
                "Content marked UNEMBEDDABLE for this test.",
            )],
        )
        .await;

    match &outcomes[0] {
        IngestOutcome::Failed { stage, error, .. } => {
            assert_eq!(*stage, IngestStage::Embedding);
            assert!(matches!(
                error,
                IngestError::Upstream(UpstreamError::Exhausted { .. })
            ));
        }
        other => panic!("expected failure, got {:?}", other),
    }

    // Extraction and summarization ran, but nothing became visible.
    assert!(store.list("alice").await.unwrap().is_empty());
}

#[tokio::test]
async fn summarizer_failure_degrades_to_sentinel() {
    let store = Arc::new(InMemoryStore::new(DIMS));
    let pipe = pipeline(
        StubSummarizer::failing(),
        StubEmbedder::new(),
        store.clone(),
        4,
    );

    let outcomes = pipe
        .ingest_batch(
            "alice",
            vec![file("report.txt", MEDIA_TEXT, "Quarterly results inside.")],
        )
        .await;

    let record = outcomes[0].record().expect("summary failure must not fail the file");
    assert_eq!(record.summary, SUMMARY_UNAVAILABLE);
    assert_eq!(record.embedding.len(), DIMS);
}

#[tokio::test]
async fn fingerprint_is_forwarded_to_the_stored_record() {
    let store = Arc::new(InMemoryStore::new(DIMS));
    let pipe = pipeline(StubSummarizer::ok(), StubEmbedder::new(), store.clone(), 4);

    let mut upload = file("notes.txt", MEDIA_TEXT, "some bytes");
    upload.fingerprint = Some("intake-supplied-fingerprint".to_string());

    let outcomes = pipe.ingest_batch("alice", vec![upload]).await;
    let record = outcomes[0].record().unwrap();
    assert_eq!(
        record.fingerprint.as_deref(),
        Some("intake-supplied-fingerprint")
    );

    let found = store
        .find_by_fingerprint("alice", "intake-supplied-fingerprint")
        .await
        .unwrap();
    assert_eq!(found.unwrap().id, record.id);
}

#[tokio::test]
async fn batch_respects_the_concurrency_bound() {
    let store = Arc::new(InMemoryStore::new(DIMS));
    let embedder = StubEmbedder::with_delay(Duration::from_millis(20));
    let pipe = pipeline(StubSummarizer::ok(), embedder.clone(), store, 2);

    let files: Vec<UploadedFile> = (0..6)
        .map(|i| file(&format!("f{}.txt", i), MEDIA_TEXT, "concurrent content"))
        .collect();

    let outcomes = pipe.ingest_batch("alice", files).await;
    assert_eq!(outcomes.iter().filter(|o| o.is_completed()).count(), 6);
    assert!(
        embedder.max_in_flight.load(Ordering::SeqCst) <= 2,
        "worker pool exceeded its bound: {}",
        embedder.max_in_flight.load(Ordering::SeqCst)
    );
}

#[tokio::test]
async fn q3_report_scenario_sentinel_summary_then_retrieval() {
    let store = Arc::new(InMemoryStore::new(DIMS));
    let embedder = StubEmbedder::new();
    let pipe = pipeline(
        StubSummarizer::failing(),
        embedder.clone(),
        store.clone(),
        4,
    );

    let outcomes = pipe
        .ingest_batch(
            "alice",
            vec![file("Q3 report", MEDIA_TEXT, "Revenue grew 12%.")],
        )
        .await;

    let record = outcomes[0].record().expect("must complete");
    assert_eq!(record.summary, SUMMARY_UNAVAILABLE);
    assert_eq!(record.embedding.len(), DIMS);

    let engine = RetrievalEngine::new(embedder, store);
    let hits = engine
        .retrieve(
            "How did revenue change?",
            Some(&record.id),
            "alice",
            3,
            0.3,
        )
        .await
        .unwrap();

    assert!(!hits.is_empty());
    assert_eq!(hits[0].document.id, record.id);
    assert!(hits[0].score >= 0.3);
    assert!(hits[0].snippet.contains("Revenue grew 12%."));

    let context = grounding_context(&hits);
    assert!(context.contains("Revenue grew 12%."));
}

#[tokio::test]
async fn retrieval_checks_ownership_before_spending_an_embedding_call() {
    let store = Arc::new(InMemoryStore::new(DIMS));
    let embedder = StubEmbedder::new();
    let pipe = pipeline(StubSummarizer::ok(), embedder.clone(), store.clone(), 4);

    let outcomes = pipe
        .ingest_batch("alice", vec![file("private.txt", MEDIA_TEXT, "secrets")])
        .await;
    let doc_id = outcomes[0].record().unwrap().id.clone();
    let calls_after_ingest = embedder.calls.load(Ordering::SeqCst);

    let engine = RetrievalEngine::new(embedder.clone(), store);
    let err = engine
        .retrieve("what secrets?", Some(&doc_id), "mallory", 5, 0.0)
        .await
        .unwrap_err();

    assert!(matches!(err, RetrieveError::NotFound));
    assert_eq!(
        embedder.calls.load(Ordering::SeqCst),
        calls_after_ingest,
        "no embedding call should be made for an unauthorized target"
    );
}

#[tokio::test]
async fn corpus_retrieval_ranks_across_documents_and_truncates_to_k() {
    let store = Arc::new(InMemoryStore::new(DIMS));
    let embedder = StubEmbedder::new();
    let pipe = pipeline(StubSummarizer::ok(), embedder.clone(), store.clone(), 4);

    pipe.ingest_batch(
        "alice",
        vec![
            file("a.txt", MEDIA_TEXT, "Alpha contents."),
            file("b.txt", MEDIA_TEXT, "Beta contents."),
            file("c.txt", MEDIA_TEXT, "Gamma contents."),
        ],
    )
    .await;

    let engine = RetrievalEngine::new(embedder, store);
    let hits = engine
        .retrieve("anything relevant?", None, "alice", 2, 0.0)
        .await
        .unwrap();

    assert_eq!(hits.len(), 2);
    assert!(hits[0].score >= hits[1].score);
}

#[tokio::test]
async fn retrieval_below_threshold_is_empty_not_error() {
    let store = Arc::new(InMemoryStore::new(DIMS));
    let embedder = StubEmbedder::new();
    let pipe = pipeline(StubSummarizer::ok(), embedder.clone(), store.clone(), 4);

    pipe.ingest_batch("alice", vec![file("a.txt", MEDIA_TEXT, "Alpha contents.")])
        .await;

    // Stub vectors for distinct texts are similar but never identical, so
    // an impossibly strict threshold filters everything out.
    let engine = RetrievalEngine::new(embedder, store);
    let hits = engine
        .retrieve("completely different question", None, "alice", 5, 0.999999)
        .await
        .unwrap();
    assert!(hits.is_empty());
}
