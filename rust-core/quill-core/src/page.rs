//! Pagination math for list pages and JSON listings.

use serde::Serialize;

/// Default number of items per page
pub const DEFAULT_PAGE_SIZE: i64 = 10;

/// Offset/limit window derived from an item count and a requested page
///
/// An empty result set, or a page index past the last page, yields an empty
/// window (`offset == 0`, `limit == 0`) at page 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Page {
    /// Total number of items
    pub item_count: i64,
    /// Current page, starting at 1
    pub page_index: i64,
    /// Items per page
    pub page_size: i64,
    /// Number of pages
    pub page_count: i64,
    /// Rows to skip
    pub offset: i64,
    /// Rows to fetch
    pub limit: i64,
    /// Whether a later page exists
    pub has_next: bool,
    /// Whether an earlier page exists
    pub has_previous: bool,
}

impl Page {
    /// Page with the default size
    #[must_use]
    pub fn new(item_count: i64, page_index: i64) -> Self {
        Self::with_size(item_count, page_index, DEFAULT_PAGE_SIZE)
    }

    /// Page with an explicit size
    #[must_use]
    pub fn with_size(item_count: i64, page_index: i64, page_size: i64) -> Self {
        let page_size = page_size.max(1);
        let item_count = item_count.max(0);
        let page_count = item_count / page_size + i64::from(item_count % page_size > 0);

        let (page_index, offset, limit) = if item_count == 0 || page_index > page_count {
            (1, 0, 0)
        } else {
            let index = page_index.max(1);
            (index, page_size * (index - 1), page_size)
        };

        Self {
            item_count,
            page_index,
            page_size,
            page_count,
            offset,
            limit,
            has_next: page_index < page_count,
            has_previous: page_index > 1,
        }
    }

    /// True when the window selects nothing
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.limit == 0
    }
}

/// Parse a `page` query value; anything unparsable or below 1 is page 1
#[must_use]
pub fn page_index(raw: &str) -> i64 {
    raw.trim().parse::<i64>().map_or(1, |p| p.max(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_count_is_empty_for_any_index() {
        for index in [1, 2, 50] {
            let page = Page::new(0, index);
            assert!(page.is_empty());
            assert_eq!(page.offset, 0);
            assert_eq!(page.page_index, 1);
            assert_eq!(page.page_count, 0);
            assert!(!page.has_next);
            assert!(!page.has_previous);
        }
    }

    #[test]
    fn test_second_page_of_fifteen() {
        let page = Page::new(15, 2);
        assert_eq!(page.page_count, 2);
        assert_eq!(page.offset, 10);
        assert_eq!(page.limit, 10);
        assert!(!page.has_next);
        assert!(page.has_previous);
    }

    #[test]
    fn test_first_page_has_next() {
        let page = Page::new(15, 1);
        assert_eq!(page.offset, 0);
        assert!(page.has_next);
        assert!(!page.has_previous);
    }

    #[test]
    fn test_index_past_end() {
        let page = Page::new(15, 9);
        assert!(page.is_empty());
        assert_eq!(page.page_index, 1);
    }

    #[test]
    fn test_page_index_parsing() {
        assert_eq!(page_index("3"), 3);
        assert_eq!(page_index("abc"), 1);
        assert_eq!(page_index("-2"), 1);
        assert_eq!(page_index(""), 1);
    }

    #[test]
    fn test_page_json_shape() {
        let json = serde_json::to_value(Page::with_size(5, 1, 2)).unwrap();
        assert_eq!(json["page_count"], 3);
        assert_eq!(json["has_next"], true);
    }
}
