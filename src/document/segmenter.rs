//! Chapter segmentation: turning a flat ToC into contiguous page ranges.

use serde::{Deserialize, Serialize};

use crate::document::source::TocEntry;

/// Title shown for pages that precede the first ToC entry.
const FRONT_MATTER_TITLE: &str = "Front matter";

/// A contiguous run of pages owned by one ToC entry.
///
/// Chapters produced by [`segment_chapters`] partition `[0, max_page]`:
/// every page belongs to exactly one chapter.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chapter {
    pub title: String,
    pub start_page: u32,
    pub end_page: u32,
}

impl Chapter {
    pub fn new(title: impl Into<String>, start_page: u32, end_page: u32) -> Self {
        debug_assert!(start_page <= end_page);
        Self {
            title: title.into(),
            start_page,
            end_page,
        }
    }
}

/// Pairs each ToC entry's page with the next entry's page minus one; the last
/// chapter runs to `max_page`.
///
/// Entry order is the only splitting criterion — heading depth is ignored and
/// nested sections are never merged. A monotone cursor clamps duplicate or
/// out-of-order entry pages so the output always partitions `[0, max_page]`;
/// entries starting past the end of the document are dropped. When the first
/// entry starts after page 0, a synthetic front-matter chapter covers the
/// leading pages.
///
/// An empty ToC yields no chapters; callers fall back to per-page units.
pub fn segment_chapters(entries: &[TocEntry], max_page: u32) -> Vec<Chapter> {
    if entries.is_empty() {
        return Vec::new();
    }

    let mut starts: Vec<(&str, u32)> = Vec::with_capacity(entries.len() + 1);
    let first_start = entries[0].page.min(max_page);
    if first_start > 0 {
        starts.push((FRONT_MATTER_TITLE, 0));
    }

    let mut cursor = first_start;
    for entry in entries {
        let start = entry.page.max(cursor);
        if start > max_page {
            break;
        }
        starts.push((entry.title.as_str(), start));
        cursor = start + 1;
    }

    let mut chapters = Vec::with_capacity(starts.len());
    for (idx, &(title, start)) in starts.iter().enumerate() {
        let end = match starts.get(idx + 1) {
            Some(&(_, next_start)) => next_start - 1,
            None => max_page,
        };
        chapters.push(Chapter::new(title, start, end));
    }
    chapters
}
