//! Page extraction and table-of-contents discovery for source documents.

use std::path::Path;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::types::RagError;

/// One page of a source document. Pages are numbered from 0 contiguously and
/// never change after extraction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub number: u32,
    pub text: String,
}

/// A flat table-of-contents entry in document order.
///
/// `level` records heading depth for display purposes only; chapter
/// segmentation uses entry order, never depth.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TocEntry {
    pub level: u32,
    pub title: String,
    pub page: u32,
}

/// A document the pipeline can ingest: an identifier for provenance, the
/// extracted pages, and an optional ToC.
///
/// Concrete page extraction lives behind this trait so unsupported formats
/// stay a caller-side concern. A PDF-backed source would implement the same
/// three methods.
pub trait DocumentSource: Send + Sync {
    /// Stable identifier used for provenance and progress tracking,
    /// conventionally the file path.
    fn source_id(&self) -> &str;

    fn pages(&self) -> &[Page];

    /// `None` when the document has no usable ToC; the pipeline then falls
    /// back to per-page units.
    fn toc(&self) -> Option<&[TocEntry]>;
}

/// A plain-text document whose pages are separated by form-feed (`\x0c`) and
/// whose ToC is discovered from markdown-style `#` headings.
#[derive(Clone, Debug)]
pub struct PagedTextDocument {
    source_id: String,
    pages: Vec<Page>,
    toc: Option<Vec<TocEntry>>,
}

impl PagedTextDocument {
    /// Reads and paginates the file at `path`.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, RagError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .await
            .map_err(|err| RagError::Source(format!("{}: {err}", path.display())))?;
        Ok(Self::from_text(path.to_string_lossy(), &raw))
    }

    /// Builds a document from raw text, splitting pages on form-feed.
    pub fn from_text(source_id: impl Into<String>, raw: &str) -> Self {
        let pages: Vec<Page> = raw
            .split('\x0c')
            .enumerate()
            .map(|(number, text)| Page {
                number: number as u32,
                text: text.to_string(),
            })
            .collect();
        let toc = extract_toc(&pages);
        Self {
            source_id: source_id.into(),
            pages,
            toc,
        }
    }

    /// Builds a document from already-extracted pages and an explicit ToC.
    ///
    /// Used by callers that run their own extraction (and by tests).
    pub fn from_pages(
        source_id: impl Into<String>,
        pages: Vec<Page>,
        toc: Option<Vec<TocEntry>>,
    ) -> Self {
        Self {
            source_id: source_id.into(),
            pages,
            toc: toc.filter(|entries| !entries.is_empty()),
        }
    }
}

impl DocumentSource for PagedTextDocument {
    fn source_id(&self) -> &str {
        &self.source_id
    }

    fn pages(&self) -> &[Page] {
        &self.pages
    }

    fn toc(&self) -> Option<&[TocEntry]> {
        self.toc.as_deref()
    }
}

/// Scans pages for markdown headings and returns them in document order.
///
/// Any failure to discover headings degrades to `None` — the caller treats a
/// missing ToC as "use per-page units", never as an error.
fn extract_toc(pages: &[Page]) -> Option<Vec<TocEntry>> {
    let heading = match Regex::new(r"(?m)^(#{1,6})[ \t]+(.+?)[ \t#]*$") {
        Ok(re) => re,
        Err(err) => {
            tracing::warn!(error = %err, "toc heading pattern failed to compile");
            return None;
        }
    };

    let mut entries = Vec::new();
    for page in pages {
        for captures in heading.captures_iter(&page.text) {
            let level = captures[1].len() as u32;
            let title = captures[2].trim().to_string();
            if title.is_empty() {
                continue;
            }
            entries.push(TocEntry {
                level,
                title,
                page: page.number,
            });
        }
    }

    if entries.is_empty() { None } else { Some(entries) }
}
