//! Splitting large exports across several documents

use std::ops::Range;

use log::info;

use crate::constants::EXPORT_TIMESTAMP_FORMAT;
use crate::types::DocumentKind;

/// Split `total` items into files of `per_file` items.
///
/// Pages hold `per_page` items. A trailing file with fewer than
/// `min_last_pages` pages is folded into the previous file; a single file
/// is never merged.
pub fn plan_files(
    total: usize,
    per_file: usize,
    per_page: usize,
    min_last_pages: usize,
) -> Vec<Range<usize>> {
    if total == 0 {
        return Vec::new();
    }
    let per_file = per_file.max(1);
    let per_page = per_page.max(1);

    let mut ranges: Vec<Range<usize>> = (0..total)
        .step_by(per_file)
        .map(|start| start..(start + per_file).min(total))
        .collect();

    if ranges.len() > 1 {
        let last_pages = ranges[ranges.len() - 1].len().div_ceil(per_page);
        if last_pages < min_last_pages {
            info!(
                "Last document would only have {} pages, merging it into the previous one",
                last_pages
            );
            ranges.pop();
            if let Some(previous) = ranges.last_mut() {
                previous.end = total;
            }
        }
    }
    ranges
}

/// Timestamp shared by all documents of one export
pub fn export_timestamp() -> String {
    chrono::Local::now()
        .format(EXPORT_TIMESTAMP_FORMAT)
        .to_string()
}

/// `{ts}_{kind}_Zeichen_{start}_bis_{end}_Datei_{file}_von_{total}.pdf`
///
/// `start` and `end` are 1-based artifact positions.
pub fn document_file_name(
    timestamp: &str,
    kind: DocumentKind,
    start: usize,
    end: usize,
    file_index: usize,
    total_files: usize,
) -> String {
    format!(
        "{}_{}_Zeichen_{}_bis_{}_Datei_{}_von_{}.pdf",
        timestamp,
        kind.name(),
        start,
        end,
        file_index,
        total_files
    )
}
