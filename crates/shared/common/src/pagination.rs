//! Pagination types for list operations.

use serde::{Deserialize, Serialize};

use crate::config::PaginationConfig;

/// Page request, 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct PageRequest {
    #[serde(default = "default_page")]
    pub page: u64,
    /// Zero means "use the configured default"
    #[serde(default)]
    pub page_size: u64,
}

fn default_page() -> u64 {
    1
}

impl PageRequest {
    pub fn new(page: u64, page_size: u64) -> Self {
        Self { page, page_size }
    }

    /// Apply defaults: page at least 1, size defaulted and capped.
    pub fn normalize(self, limits: &PaginationConfig) -> Self {
        let page_size = match self.page_size {
            0 => limits.default_page_size,
            n => n.min(limits.max_page_size),
        };
        Self {
            page: self.page.max(1),
            page_size,
        }
    }

    /// Calculate offset for the store query
    pub fn offset(&self) -> u64 {
        self.page.saturating_sub(1) * self.page_size
    }

    pub fn limit(&self) -> u64 {
        self.page_size
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: 0,
        }
    }
}

/// One page of results
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u64,
    pub page_size: u64,
    pub total: u64,
    pub total_pages: u64,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, request: PageRequest, total: u64) -> Self {
        let total_pages = if request.page_size > 0 {
            total.div_ceil(request.page_size)
        } else {
            0
        };

        Self {
            items,
            page: request.page,
            page_size: request.page_size,
            total,
            total_pages,
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            page: self.page,
            page_size: self.page_size,
            total: self.total,
            total_pages: self.total_pages,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_defaults_and_caps() {
        let limits = PaginationConfig::default();

        let req = PageRequest::new(0, 0).normalize(&limits);
        assert_eq!(req, PageRequest::new(1, 20));

        let req = PageRequest::new(3, 1_000).normalize(&limits);
        assert_eq!(req.page_size, 100);
        assert_eq!(req.offset(), 200);
    }

    #[test]
    fn test_total_pages() {
        let page = Page::new(vec![1, 2], PageRequest::new(1, 2), 5);
        assert_eq!(page.total_pages, 3);
        assert_eq!(page.map(|n| n * 10).items, vec![10, 20]);
    }
}
