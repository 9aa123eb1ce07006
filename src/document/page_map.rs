//! Heuristic attribution of chunks to page ranges within one chapter.

/// Estimates a `(start_page, end_page)` pair for each chunk of a chapter.
///
/// Character counts accumulate across chunks; each chunk's cumulative ratio is
/// mapped linearly onto the chapter's page span, and a floating cursor keeps
/// successive ranges non-decreasing and clamped to the chapter's final page.
///
/// This is an estimate, not exact attribution — a chunk boundary rarely
/// coincides with a page boundary. The only guaranteed properties are
/// monotonic non-decrease in chunk order and containment in
/// `[start_page, end_page]`.
pub fn estimate_page_ranges(
    chunk_lens: &[usize],
    start_page: u32,
    end_page: u32,
) -> Vec<(u32, u32)> {
    debug_assert!(start_page <= end_page);
    let total: usize = chunk_lens.iter().sum();
    if total == 0 {
        return vec![(start_page, start_page); chunk_lens.len()];
    }

    let span = f64::from(end_page - start_page);
    let mut ranges = Vec::with_capacity(chunk_lens.len());
    let mut cumulative = 0usize;
    let mut cursor = f64::from(start_page);

    for &len in chunk_lens {
        cumulative += len;
        let ratio = cumulative as f64 / total as f64;
        let target = f64::from(start_page) + ratio * span;

        let chunk_start = (cursor.floor() as u32).min(end_page);
        let chunk_end = (target.floor() as u32).clamp(chunk_start, end_page);
        ranges.push((chunk_start, chunk_end));

        cursor = cursor.max(target);
    }
    ranges
}
