//! Document structure: page extraction, chapter segmentation, chunking, and
//! page-range estimation.
//!
//! * [`source`] — page extraction and optional table-of-contents discovery.
//! * [`segmenter`] — ToC entries to contiguous, non-overlapping chapters.
//! * [`chunker`] — size-driven overlapping text windows.
//! * [`page_map`] — heuristic chunk-to-page attribution within a chapter.

pub mod chunker;
pub mod page_map;
pub mod segmenter;
pub mod source;

pub use chunker::TextChunker;
pub use page_map::estimate_page_ranges;
pub use segmenter::{Chapter, segment_chapters};
pub use source::{DocumentSource, Page, PagedTextDocument, TocEntry};
