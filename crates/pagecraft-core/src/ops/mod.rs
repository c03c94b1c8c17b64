//! Page operations.
//!
//! Every operation takes PDF bytes, loads fresh documents, and returns
//! newly saved bytes. Page numbers are 1-based.

mod range;
mod watermark;

pub use range::{parse_page_list, parse_page_range, validate_page_numbers, MAX_PAGE_LIST_LEN};
pub use watermark::{watermark, WatermarkOptions};

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::document::{PagedDocument, Result};
use crate::error::DocumentError;

/// How `reorder` treats page lists that are not a full permutation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReorderPolicy {
    /// Subsets and duplicates allowed; unlisted pages are dropped.
    #[default]
    Lenient,
    /// The list must name every page exactly once.
    Permutation,
}

/// Where a document is cut by `split`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SplitMode {
    /// A part ends after each listed page.
    AfterPages(Vec<u32>),
    /// A part every `n` pages.
    Every(u32),
}

/// Options applied when saving operation output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SaveOptions {
    pub compress: bool,
}

fn finish(doc: PagedDocument, options: SaveOptions) -> Result<Vec<u8>> {
    doc.with_compression(options.compress).save()
}

/// Keep the 1-based page numbers that exist, as 0-based indices.
fn valid_indices(pages: &[u32], page_count: usize) -> Vec<usize> {
    pages
        .iter()
        .map(|&page| page as usize)
        .filter(|&page| page >= 1 && page <= page_count)
        .map(|page| page - 1)
        .collect()
}

/// Build a new document from `source` pages at the given 0-based indices.
fn assemble(source: &PagedDocument, indices: &[usize], options: SaveOptions) -> Result<Vec<u8>> {
    let mut output = PagedDocument::new();
    for page in output.copy_pages(source, indices)? {
        output.add_page(page)?;
    }
    finish(output, options)
}

/// Concatenate documents in list order.
///
/// `progress` receives a percentage after each input has been copied.
pub fn merge(
    documents: &[Vec<u8>],
    options: SaveOptions,
    mut progress: impl FnMut(f32),
) -> Result<Vec<u8>> {
    let mut output = PagedDocument::new();
    let total = documents.len();

    for (i, data) in documents.iter().enumerate() {
        let source = PagedDocument::load(data)?;
        let indices: Vec<usize> = (0..source.page_count()).collect();
        for page in output.copy_pages(&source, &indices)? {
            output.add_page(page)?;
        }
        debug!("Merged input {}/{} ({} pages)", i + 1, total, indices.len());
        progress((i + 1) as f32 / total as f32 * 100.0);
    }

    finish(output, options)
}

/// Copy the listed pages, in the given order, into a new document.
///
/// Page numbers outside the document are skipped; duplicates are kept.
pub fn extract(document: &[u8], pages: &[u32], options: SaveOptions) -> Result<Vec<u8>> {
    let source = PagedDocument::load(document)?;
    let indices = valid_indices(pages, source.page_count());
    if indices.len() < pages.len() {
        warn!(
            "Skipping {} page numbers outside 1..={}",
            pages.len() - indices.len(),
            source.page_count()
        );
    }
    assemble(&source, &indices, options)
}

/// Rebuild the document with its pages in `order`.
pub fn reorder(document: &[u8], order: &[u32], policy: ReorderPolicy, options: SaveOptions) -> Result<Vec<u8>> {
    let source = PagedDocument::load(document)?;
    let page_count = source.page_count();

    if policy == ReorderPolicy::Permutation {
        let mut sorted = order.to_vec();
        sorted.sort_unstable();
        if !sorted.iter().copied().eq(1..=page_count as u32) {
            return Err(DocumentError::InvalidOrder(format!(
                "expected each of pages 1..={} exactly once",
                page_count
            )));
        }
    }

    if let Some(&page) = order.iter().find(|&&page| page == 0 || page as usize > page_count) {
        return Err(DocumentError::Index {
            page: page as usize,
            page_count,
        });
    }

    let indices: Vec<usize> = order.iter().map(|&page| page as usize - 1).collect();
    assemble(&source, &indices, options)
}

/// Remove the listed pages. Unknown page numbers are ignored.
pub fn delete(document: &[u8], pages: &[u32], options: SaveOptions) -> Result<Vec<u8>> {
    let mut doc = PagedDocument::load(document)?;
    let doomed: BTreeSet<usize> = valid_indices(pages, doc.page_count()).into_iter().collect();

    for &index in doomed.iter().rev() {
        doc.remove_page(index)?;
    }
    debug!("Deleted {} pages, {} remain", doomed.len(), doc.page_count());
    finish(doc, options)
}

/// Add `degrees` to the rotation of each listed page.
pub fn rotate(document: &[u8], pages: &[u32], degrees: i32, options: SaveOptions) -> Result<Vec<u8>> {
    if degrees % 90 != 0 {
        return Err(DocumentError::InvalidRotation(degrees));
    }
    let mut doc = PagedDocument::load(document)?;
    let targets: BTreeSet<usize> = valid_indices(pages, doc.page_count()).into_iter().collect();

    for index in targets {
        let current = doc.rotation(index)?;
        doc.set_rotation(index, (current + degrees).rem_euclid(360))?;
    }
    finish(doc, options)
}

/// Page ranges `[start, end)` (0-based) produced by a split.
fn split_ranges(page_count: usize, mode: &SplitMode) -> Result<Vec<(usize, usize)>> {
    let points: BTreeSet<usize> = match mode {
        SplitMode::AfterPages(points) => points
            .iter()
            .map(|&p| p as usize)
            .filter(|&p| p > 0 && p < page_count)
            .collect(),
        SplitMode::Every(0) => {
            return Err(DocumentError::InvalidSplit("part size must be at least 1".to_string()));
        }
        SplitMode::Every(n) => (*n as usize..page_count).step_by(*n as usize).collect(),
    };

    let mut bounds = points;
    bounds.insert(0);
    bounds.insert(page_count);
    let bounds: Vec<usize> = bounds.into_iter().collect();
    Ok(bounds.windows(2).map(|w| (w[0], w[1])).collect())
}

/// Cut the document into consecutive parts.
pub fn split(document: &[u8], mode: &SplitMode, options: SaveOptions) -> Result<Vec<Vec<u8>>> {
    let source = PagedDocument::load(document)?;
    let ranges = split_ranges(source.page_count(), mode)?;
    debug!("Splitting {} pages into {} parts", source.page_count(), ranges.len());

    ranges
        .into_iter()
        .map(|(start, end)| assemble(&source, &(start..end).collect::<Vec<_>>(), options))
        .collect()
}

/// Number of pages in a document.
pub fn page_count(document: &[u8]) -> Result<usize> {
    Ok(PagedDocument::load(document)?.page_count())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{page_labels, page_rotations, sample_pdf};
    use pretty_assertions::assert_eq;

    const OPTS: SaveOptions = SaveOptions { compress: false };

    #[test]
    fn test_merge_concatenates_in_order() {
        let inputs = vec![sample_pdf("a", 2), sample_pdf("b", 1), sample_pdf("c", 2)];
        let mut seen = Vec::new();
        let merged = merge(&inputs, OPTS, |p| seen.push(p.round() as u32)).unwrap();

        assert_eq!(
            page_labels(&merged),
            vec!["a p1", "a p2", "b p1", "c p1", "c p2"]
        );
        assert_eq!(seen, vec![33, 67, 100]);
    }

    #[test]
    fn test_merge_fails_on_bad_input() {
        let inputs = vec![sample_pdf("a", 1), b"garbage".to_vec()];
        let err = merge(&inputs, OPTS, |_| {}).unwrap_err();
        assert!(matches!(err, DocumentError::Parse(_)));
    }

    #[test]
    fn test_extract_filters_out_of_range() {
        let data = sample_pdf("x", 4);
        let out = extract(&data, &[4, 0, 2, 9, 2], OPTS).unwrap();
        assert_eq!(page_labels(&out), vec!["x p4", "x p2", "x p2"]);
    }

    #[test]
    fn test_extract_nothing_valid_gives_empty_document() {
        let out = extract(&sample_pdf("x", 2), &[5, 6], OPTS).unwrap();
        assert_eq!(page_count(&out).unwrap(), 0);
    }

    #[test]
    fn test_reorder_lenient() {
        let data = sample_pdf("r", 3);
        let out = reorder(&data, &[3, 1, 3], ReorderPolicy::Lenient, OPTS).unwrap();
        assert_eq!(page_labels(&out), vec!["r p3", "r p1", "r p3"]);

        let err = reorder(&data, &[1, 4], ReorderPolicy::Lenient, OPTS).unwrap_err();
        assert!(matches!(err, DocumentError::Index { page: 4, page_count: 3 }));
    }

    #[test]
    fn test_reorder_permutation() {
        let data = sample_pdf("r", 3);
        let out = reorder(&data, &[2, 3, 1], ReorderPolicy::Permutation, OPTS).unwrap();
        assert_eq!(page_labels(&out), vec!["r p2", "r p3", "r p1"]);

        for order in [&[1, 2][..], &[1, 1, 2], &[1, 2, 3, 3]] {
            let err = reorder(&data, order, ReorderPolicy::Permutation, OPTS).unwrap_err();
            assert!(matches!(err, DocumentError::InvalidOrder(_)));
        }
    }

    #[test]
    fn test_delete_keeps_remaining_order() {
        let data = sample_pdf("d", 5);
        let out = delete(&data, &[2, 4, 2, 7], OPTS).unwrap();
        assert_eq!(page_labels(&out), vec!["d p1", "d p3", "d p5"]);

        let reversed = delete(&data, &[4, 2], OPTS).unwrap();
        assert_eq!(page_labels(&reversed), vec!["d p1", "d p3", "d p5"]);
    }

    #[test]
    fn test_delete_all_pages() {
        let out = delete(&sample_pdf("d", 2), &[1, 2], OPTS).unwrap();
        assert_eq!(page_count(&out).unwrap(), 0);
    }

    #[test]
    fn test_rotate_adds_to_current() {
        let data = sample_pdf("t", 3);
        let once = rotate(&data, &[1, 3, 8], 90, OPTS).unwrap();
        assert_eq!(page_rotations(&once), vec![90, 0, 90]);

        let twice = rotate(&once, &[1, 2], -180, OPTS).unwrap();
        assert_eq!(page_rotations(&twice), vec![270, 180, 90]);
        assert_eq!(page_labels(&twice), vec!["t p1", "t p2", "t p3"]);
    }

    #[test]
    fn test_rotate_rejects_odd_angles() {
        let err = rotate(&sample_pdf("t", 1), &[1], 45, OPTS).unwrap_err();
        assert!(matches!(err, DocumentError::InvalidRotation(45)));
    }

    #[test]
    fn test_split_ranges() {
        let after = SplitMode::AfterPages(vec![5, 2, 0, 2, 7]);
        assert_eq!(split_ranges(7, &after).unwrap(), vec![(0, 2), (2, 5), (5, 7)]);
        assert_eq!(split_ranges(7, &SplitMode::Every(3)).unwrap(), vec![(0, 3), (3, 6), (6, 7)]);
        assert_eq!(split_ranges(6, &SplitMode::Every(3)).unwrap(), vec![(0, 3), (3, 6)]);
        assert_eq!(split_ranges(4, &SplitMode::AfterPages(vec![])).unwrap(), vec![(0, 4)]);
        assert_eq!(split_ranges(0, &SplitMode::Every(2)).unwrap(), vec![]);
        assert!(matches!(
            split_ranges(4, &SplitMode::Every(0)),
            Err(DocumentError::InvalidSplit(_))
        ));
    }

    #[test]
    fn test_split_documents() {
        let parts = split(&sample_pdf("s", 4), &SplitMode::AfterPages(vec![1, 3]), OPTS).unwrap();
        let labels: Vec<Vec<String>> = parts.iter().map(|p| page_labels(p)).collect();
        assert_eq!(
            labels,
            vec![
                vec!["s p1".to_string()],
                vec!["s p2".to_string(), "s p3".to_string()],
                vec!["s p4".to_string()],
            ]
        );
    }

    #[test]
    fn test_compressed_output_still_loads() {
        let out = extract(&sample_pdf("z", 2), &[2], SaveOptions { compress: true }).unwrap();
        assert_eq!(page_labels(&out), vec!["z p2"]);
    }
}
