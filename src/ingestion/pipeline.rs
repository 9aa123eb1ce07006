//! The sequential ingestion loop: segment, chunk, embed, store, mark done.

use std::sync::Arc;

use uuid::Uuid;

use crate::config::ChunkingConfig;
use crate::document::chunker::{TextChunker, tail};
use crate::document::page_map::estimate_page_ranges;
use crate::document::segmenter::{Chapter, segment_chapters};
use crate::document::source::{DocumentSource, Page};
use crate::embeddings::EmbeddingProvider;
use crate::ingestion::progress::ProgressLog;
use crate::stores::{ChunkMetadata, EmbeddedChunk, StoredChunk, VectorBackend};
use crate::types::RagError;

/// Counters for one ingestion run.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct IngestReport {
    /// Units embedded and stored during this run.
    pub units_processed: usize,
    /// Units skipped because the progress log already records them.
    pub units_skipped: usize,
    /// Chunks written to the vector store during this run.
    pub chunks_written: usize,
}

/// Drives a document through segmentation, chunking, embedding, and storage,
/// one unit at a time.
///
/// A unit is a chapter when the document has a ToC, or a single page when it
/// does not. For every unit the store insert commits before the progress log
/// records the unit, so interrupting the run at any point loses no data: the
/// next run resumes at the first undone unit, re-embedding at most the unit
/// that was in flight.
pub struct IngestionPipeline {
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorBackend>,
    progress: ProgressLog,
    config: ChunkingConfig,
    chunker: TextChunker,
}

impl IngestionPipeline {
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn VectorBackend>,
        progress: ProgressLog,
        config: ChunkingConfig,
    ) -> Result<Self, RagError> {
        let chunker = TextChunker::from_config(&config)?;
        Ok(Self {
            embedder,
            store,
            progress,
            config,
            chunker,
        })
    }

    /// Ingests `document`, resuming from the progress log.
    ///
    /// Units are processed strictly in document order on every run, so
    /// resumption always continues from the first not-yet-done unit. An
    /// embedding or storage failure aborts the run before the current unit is
    /// marked done; rerunning retries exactly that unit.
    pub async fn ingest(&self, document: &dyn DocumentSource) -> Result<IngestReport, RagError> {
        self.progress.load().await?;

        let pages = document.pages();
        let source = document.source_id();
        let mut report = IngestReport::default();

        if pages.is_empty() {
            tracing::warn!(source, "document has no pages; nothing to ingest");
            return Ok(report);
        }
        let max_page = pages[pages.len() - 1].number;

        let chapters = document
            .toc()
            .map(|entries| segment_chapters(entries, max_page))
            .unwrap_or_default();

        if chapters.is_empty() {
            tracing::info!(source, pages = pages.len(), "no ToC; ingesting per page");
            self.ingest_pages(source, pages, &mut report).await?;
        } else {
            tracing::info!(
                source,
                chapters = chapters.len(),
                "ingesting chapter by chapter"
            );
            for chapter in &chapters {
                self.ingest_chapter(source, chapter, pages, &mut report)
                    .await?;
            }
        }

        tracing::info!(
            source,
            processed = report.units_processed,
            skipped = report.units_skipped,
            chunks = report.chunks_written,
            "ingestion run complete"
        );
        Ok(report)
    }

    async fn ingest_chapter(
        &self,
        source: &str,
        chapter: &Chapter,
        pages: &[Page],
        report: &mut IngestReport,
    ) -> Result<(), RagError> {
        if self.progress.is_done(source, &chapter.title).await {
            tracing::debug!(source, chapter = %chapter.title, "already ingested; skipping");
            report.units_skipped += 1;
            return Ok(());
        }

        let text: String = pages
            .iter()
            .filter(|page| page.number >= chapter.start_page && page.number <= chapter.end_page)
            .map(|page| page.text.as_str())
            .collect::<Vec<_>>()
            .join("\n");

        let contents = self.split_unit(&text);
        if contents.is_empty() {
            // Nothing to embed; record the unit so reruns skip it outright.
            self.progress.mark_done(source, &chapter.title).await?;
            report.units_processed += 1;
            return Ok(());
        }

        let lens: Vec<usize> = contents.iter().map(|c| c.chars().count()).collect();
        let ranges = estimate_page_ranges(&lens, chapter.start_page, chapter.end_page);

        let chunks = self
            .embed_unit(source, &chapter.title, chapter, contents, &ranges)
            .await?;
        let written = chunks.len();
        self.store.insert_chunks(chunks).await?;
        self.progress.mark_done(source, &chapter.title).await?;

        tracing::info!(source, chapter = %chapter.title, chunks = written, "chapter stored");
        report.units_processed += 1;
        report.chunks_written += written;
        Ok(())
    }

    /// No-ToC fallback: every page is its own unit, with the tail of the
    /// previous page carried in front of it for context.
    async fn ingest_pages(
        &self,
        source: &str,
        pages: &[Page],
        report: &mut IngestReport,
    ) -> Result<(), RagError> {
        let mut prev_tail = String::new();

        for page in pages {
            let unit = page_label(page.number);

            if self.progress.is_done(source, &unit).await {
                tracing::debug!(source, page = page.number, "already ingested; skipping");
                report.units_skipped += 1;
                prev_tail = tail(&page.text, self.config.tail_overlap).to_string();
                continue;
            }

            let combined = if prev_tail.is_empty() {
                page.text.clone()
            } else {
                format!("{prev_tail}\n{}", page.text)
            };

            let contents = self.split_unit(&combined);
            if !contents.is_empty() {
                let chapter = Chapter::new(unit.clone(), page.number, page.number);
                let ranges = vec![(page.number, page.number); contents.len()];
                let chunks = self
                    .embed_unit(source, &unit, &chapter, contents, &ranges)
                    .await?;
                let written = chunks.len();
                self.store.insert_chunks(chunks).await?;
                report.chunks_written += written;
                tracing::info!(source, page = page.number, chunks = written, "page stored");
            }
            self.progress.mark_done(source, &unit).await?;
            report.units_processed += 1;

            prev_tail = tail(&combined, self.config.tail_overlap).to_string();
        }
        Ok(())
    }

    /// Whole text below the inline threshold embeds as one chunk; anything
    /// larger is split by size. Blank units produce nothing.
    fn split_unit(&self, text: &str) -> Vec<String> {
        if text.trim().is_empty() {
            return Vec::new();
        }
        if text.chars().count() <= self.config.inline_threshold {
            vec![text.to_string()]
        } else {
            self.chunker.split(text)
        }
    }

    async fn embed_unit(
        &self,
        source: &str,
        unit: &str,
        chapter: &Chapter,
        contents: Vec<String>,
        ranges: &[(u32, u32)],
    ) -> Result<Vec<EmbeddedChunk>, RagError> {
        let vectors = self.embedder.embed_batch(&contents).await?;
        if vectors.len() != contents.len() {
            return Err(RagError::Embedding(format!(
                "unit '{unit}': expected {} vectors, got {}",
                contents.len(),
                vectors.len()
            )));
        }

        Ok(contents
            .into_iter()
            .zip(vectors)
            .enumerate()
            .map(|(index, (content, embedding))| EmbeddedChunk {
                chunk: StoredChunk {
                    id: Uuid::new_v4().to_string(),
                    chunk_index: index,
                    content,
                    metadata: ChunkMetadata {
                        source: source.to_string(),
                        chapter: chapter.title.clone(),
                        start_page: chapter.start_page,
                        end_page: chapter.end_page,
                        chunk_start_page: ranges[index].0,
                        chunk_end_page: ranges[index].1,
                    },
                },
                embedding,
            })
            .collect())
    }
}

/// Label used both as unit id and chapter name in the per-page fallback.
pub fn page_label(page: u32) -> String {
    format!("第{page}页")
}
