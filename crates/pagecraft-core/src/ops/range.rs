//! Page number parsing and validation.

use std::collections::BTreeSet;

use crate::document::Result;
use crate::error::DocumentError;

/// Parse a range expression such as `"1,3-5,7"`.
///
/// Returns sorted, unique page numbers clamped to `1..=max_pages`.
/// Pieces that do not parse are skipped.
pub fn parse_page_range(text: &str, max_pages: u32) -> Vec<u32> {
    let mut pages = BTreeSet::new();

    for part in text.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        if let Some((start, end)) = part.split_once('-') {
            let (Ok(start), Ok(end)) = (start.trim().parse::<u32>(), end.trim().parse::<u32>()) else {
                continue;
            };
            pages.extend(start.max(1)..=end.min(max_pages));
        } else if let Ok(page) = part.parse::<u32>() {
            if (1..=max_pages).contains(&page) {
                pages.insert(page);
            }
        }
    }

    pages.into_iter().collect()
}

/// Longest list [`parse_page_list`] will expand.
pub const MAX_PAGE_LIST_LEN: usize = 100_000;

/// Parse an ordered page list such as `"3,1-2,3"` into `[3, 1, 2, 3]`.
///
/// Order and duplicates are kept; `"4-1"` expands to `[4, 3, 2, 1]`. Unlike
/// [`parse_page_range`] nothing is clamped and malformed pieces are errors,
/// as is a list longer than [`MAX_PAGE_LIST_LEN`].
pub fn parse_page_list(text: &str) -> Result<Vec<u32>> {
    let invalid = |part: &str| DocumentError::InvalidOrder(format!("cannot parse '{}'", part));
    let mut pages = Vec::new();

    for part in text.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let (start, end) = match part.split_once('-') {
            Some((start, end)) => (
                start.trim().parse::<u32>().map_err(|_| invalid(part))?,
                end.trim().parse::<u32>().map_err(|_| invalid(part))?,
            ),
            None => {
                let page = part.parse::<u32>().map_err(|_| invalid(part))?;
                (page, page)
            }
        };

        let span = usize::try_from(start.abs_diff(end)).unwrap_or(usize::MAX);
        if span >= MAX_PAGE_LIST_LEN - pages.len().min(MAX_PAGE_LIST_LEN) {
            return Err(DocumentError::InvalidOrder(format!(
                "page list longer than {} entries",
                MAX_PAGE_LIST_LEN
            )));
        }

        if start <= end {
            pages.extend(start..=end);
        } else {
            pages.extend((end..=start).rev());
        }
    }

    Ok(pages)
}

/// Whether every page number lies in `1..=max_pages`.
pub fn validate_page_numbers(pages: &[u32], max_pages: u32) -> bool {
    pages.iter().all(|page| (1..=max_pages).contains(page))
}
