//! Page range expressions such as `1-3, 5, 8-10`

use regex::Regex;
use std::sync::LazyLock;
use thiserror::Error;

static ALLOWED_CHARS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[\d,\-\s]+$").unwrap());
static SINGLE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d+$").unwrap());
static RANGE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(\d+)-(\d+)$").unwrap());

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PageRangeError {
    #[error("Invalid page range '{0}'")]
    Malformed(String),

    #[error("The page range selects no pages of the document")]
    Empty,
}

/// Numbers too large for `usize` saturate, which puts them out of range
fn parse_number(digits: &str) -> usize {
    digits.parse::<u64>().map_or(usize::MAX, |n| usize::try_from(n).unwrap_or(usize::MAX))
}

/// Resolve `text` against a document of `page_count` pages.
///
/// Tokens are comma separated, each `N` or `A-B`; whitespace is ignored.
/// Single pages outside `1..=page_count` are dropped and ranges are clamped.
/// Any malformed token rejects the whole expression. The result is sorted
/// and free of duplicates.
pub fn parse_page_range(text: &str, page_count: usize) -> Result<Vec<usize>, PageRangeError> {
    if !ALLOWED_CHARS.is_match(text) {
        return Err(PageRangeError::Malformed(text.to_string()));
    }

    let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    let mut pages = Vec::new();

    for token in compact.split(',').filter(|t| !t.is_empty()) {
        if SINGLE.is_match(token) {
            let page = parse_number(token);
            if (1..=page_count).contains(&page) {
                pages.push(page);
            }
        } else if let Some(caps) = RANGE.captures(token) {
            let start = parse_number(&caps[1]).max(1);
            let end = parse_number(&caps[2]).min(page_count);
            pages.extend(start..=end);
        } else {
            return Err(PageRangeError::Malformed(text.to_string()));
        }
    }

    pages.sort_unstable();
    pages.dedup();

    if pages.is_empty() {
        return Err(PageRangeError::Empty);
    }
    Ok(pages)
}
