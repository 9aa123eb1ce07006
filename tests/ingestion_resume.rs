//! Integration tests for the resumable ingestion pipeline.
//!
//! Everything runs against a real temporary SQLite store with deterministic
//! mock embeddings, so runs are reproducible and CI-friendly.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tempfile::TempDir;

use specsage::config::ChunkingConfig;
use specsage::document::source::{Page, PagedTextDocument, TocEntry};
use specsage::embeddings::{EmbeddingProvider, MockEmbeddingProvider};
use specsage::ingestion::pipeline::IngestionPipeline;
use specsage::ingestion::progress::ProgressLog;
use specsage::stores::sqlite::SqliteChunkStore;
use specsage::stores::{StoredChunk, VectorBackend};
use specsage::types::RagError;

fn spec_pages() -> Vec<Page> {
    (0u32..10)
        .map(|number| Page {
            number,
            text: format!("page {number} body text for the specification"),
        })
        .collect()
}

fn spec_toc() -> Vec<TocEntry> {
    vec![
        TocEntry {
            level: 1,
            title: "Intro".into(),
            page: 0,
        },
        TocEntry {
            level: 1,
            title: "Specs".into(),
            page: 5,
        },
    ]
}

async fn make_pipeline(
    dir: &TempDir,
    embedder: Arc<dyn EmbeddingProvider>,
) -> (IngestionPipeline, Arc<SqliteChunkStore>, ProgressLog) {
    let store = Arc::new(
        SqliteChunkStore::open(dir.path().join("index.sqlite"))
            .await
            .unwrap(),
    );
    let progress = ProgressLog::new(dir.path().join("progress.json"));
    let pipeline = IngestionPipeline::new(
        embedder,
        store.clone(),
        progress.clone(),
        ChunkingConfig::default(),
    )
    .unwrap();
    (pipeline, store, progress)
}

fn content_set(chunks: &[StoredChunk]) -> Vec<(String, usize, String)> {
    let mut set: Vec<_> = chunks
        .iter()
        .map(|c| (c.metadata.chapter.clone(), c.chunk_index, c.content.clone()))
        .collect();
    set.sort();
    set
}

#[tokio::test]
async fn chapters_carry_their_page_spans() {
    let dir = TempDir::new().unwrap();
    let embedder = Arc::new(MockEmbeddingProvider::new());
    let (pipeline, store, _) = make_pipeline(&dir, embedder).await;

    let doc = PagedTextDocument::from_pages("matter.txt", spec_pages(), Some(spec_toc()));
    let report = pipeline.ingest(&doc).await.unwrap();

    assert_eq!(report.units_processed, 2);
    assert_eq!(report.units_skipped, 0);

    let chunks = store.chunks_for_source("matter.txt").await.unwrap();
    assert_eq!(report.chunks_written, chunks.len());

    let intro: Vec<_> = chunks
        .iter()
        .filter(|c| c.metadata.chapter == "Intro")
        .collect();
    let specs: Vec<_> = chunks
        .iter()
        .filter(|c| c.metadata.chapter == "Specs")
        .collect();
    assert!(!intro.is_empty() && !specs.is_empty());

    for chunk in &intro {
        assert_eq!(chunk.metadata.start_page, 0);
        assert_eq!(chunk.metadata.end_page, 4);
        assert!(chunk.metadata.chunk_start_page <= chunk.metadata.chunk_end_page);
        assert!(chunk.metadata.chunk_end_page <= 4);
    }
    for chunk in &specs {
        assert_eq!(chunk.metadata.start_page, 5);
        assert_eq!(chunk.metadata.end_page, 9);
        assert!(chunk.metadata.chunk_start_page >= 5 && chunk.metadata.chunk_end_page <= 9);
    }
}

#[tokio::test]
async fn rerunning_a_complete_ingestion_embeds_nothing() {
    let dir = TempDir::new().unwrap();
    let embedder = Arc::new(MockEmbeddingProvider::new());
    let (pipeline, store, _) = make_pipeline(&dir, embedder.clone()).await;

    let doc = PagedTextDocument::from_pages("matter.txt", spec_pages(), Some(spec_toc()));
    pipeline.ingest(&doc).await.unwrap();

    let calls_after_first = embedder.calls();
    let count_after_first = store.count().await.unwrap();

    let report = pipeline.ingest(&doc).await.unwrap();

    assert_eq!(embedder.calls(), calls_after_first, "no embedding calls");
    assert_eq!(store.count().await.unwrap(), count_after_first);
    assert_eq!(report.units_processed, 0);
    assert_eq!(report.units_skipped, 2);
    assert_eq!(report.chunks_written, 0);
}

/// Embedder that fails every call after the first `allow` calls.
struct FlakyEmbedder {
    inner: MockEmbeddingProvider,
    allow: usize,
    calls: AtomicUsize,
}

impl FlakyEmbedder {
    fn new(allow: usize) -> Self {
        Self {
            inner: MockEmbeddingProvider::new(),
            allow,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl EmbeddingProvider for FlakyEmbedder {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RagError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call >= self.allow {
            return Err(RagError::Embedding("capability unavailable".into()));
        }
        self.inner.embed_batch(texts).await
    }
}

#[tokio::test]
async fn interrupted_runs_resume_to_the_same_index_content() {
    // Reference: one uninterrupted run.
    let reference_dir = TempDir::new().unwrap();
    let (reference_pipeline, reference_store, _) =
        make_pipeline(&reference_dir, Arc::new(MockEmbeddingProvider::new())).await;
    let doc = PagedTextDocument::from_pages("matter.txt", spec_pages(), Some(spec_toc()));
    reference_pipeline.ingest(&doc).await.unwrap();
    let expected = content_set(&reference_store.chunks_for_source("matter.txt").await.unwrap());

    // Interrupted run: the embedder dies on the second unit.
    let dir = TempDir::new().unwrap();
    let (flaky_pipeline, store, progress) =
        make_pipeline(&dir, Arc::new(FlakyEmbedder::new(1))).await;
    let err = flaky_pipeline.ingest(&doc).await.unwrap_err();
    assert!(matches!(err, RagError::Embedding(_)));

    // The failed unit was not marked done, so the next run retries it.
    assert!(progress.is_done("matter.txt", "Intro").await);
    assert!(!progress.is_done("matter.txt", "Specs").await);

    // Resume with a healthy embedder over the same store and progress log.
    let resume_pipeline = IngestionPipeline::new(
        Arc::new(MockEmbeddingProvider::new()),
        store.clone(),
        progress.clone(),
        ChunkingConfig::default(),
    )
    .unwrap();
    let report = resume_pipeline.ingest(&doc).await.unwrap();
    assert_eq!(report.units_skipped, 1);
    assert_eq!(report.units_processed, 1);

    let resumed = content_set(&store.chunks_for_source("matter.txt").await.unwrap());
    assert_eq!(resumed, expected);
}

#[tokio::test]
async fn documents_without_a_toc_ingest_page_by_page() {
    let dir = TempDir::new().unwrap();
    let (pipeline, store, _) = make_pipeline(&dir, Arc::new(MockEmbeddingProvider::new())).await;

    let pages: Vec<Page> = (0u32..3)
        .map(|number| Page {
            number,
            text: format!("plain content of page {number}"),
        })
        .collect();
    let doc = PagedTextDocument::from_pages("notes.txt", pages, None);

    let report = pipeline.ingest(&doc).await.unwrap();
    assert_eq!(report.units_processed, 3);

    let chunks = store.chunks_for_source("notes.txt").await.unwrap();
    assert_eq!(chunks.len(), 3);

    for (page, chunk) in chunks.iter().enumerate() {
        let page = page as u32;
        assert_eq!(chunk.metadata.chapter, format!("第{page}页"));
        assert_eq!(chunk.metadata.start_page, page);
        assert_eq!(chunk.metadata.end_page, page);
        assert_eq!(chunk.metadata.chunk_start_page, page);
        assert_eq!(chunk.metadata.chunk_end_page, page);
        assert!(chunk.content.contains(&format!("plain content of page {page}")));
    }

    // The tail of each page rides along with its successor for context.
    assert!(chunks[1].content.contains("plain content of page 0"));
}

#[tokio::test]
async fn progress_file_lands_next_to_the_index() {
    let dir = TempDir::new().unwrap();
    let (pipeline, _, progress) =
        make_pipeline(&dir, Arc::new(MockEmbeddingProvider::new())).await;

    let doc = PagedTextDocument::from_text("spec.txt", "# Only\nshort body");
    pipeline.ingest(&doc).await.unwrap();

    assert!(progress.path().exists());
    assert!(progress.is_done("spec.txt", "Only").await);
}
