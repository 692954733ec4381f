//! FILENAME: core/pivot-engine/src/pagination.rs
//! Page bookkeeping for the rendered table.

use std::ops::Range;

use serde::{Deserialize, Serialize};

/// 1-based page position over the displayed items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginationConfig {
    pub current_page: usize,
    pub page_size: usize,
    pub total_pages: usize,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        PaginationConfig::new(Self::DEFAULT_PAGE_SIZE)
    }
}

impl PaginationConfig {
    pub const DEFAULT_PAGE_SIZE: usize = 10;

    pub fn new(page_size: usize) -> Self {
        PaginationConfig {
            current_page: 1,
            page_size: page_size.max(1),
            total_pages: 1,
        }
    }

    /// `max(1, ceil(item_count / page_size))`.
    pub fn total_pages_for(item_count: usize, page_size: usize) -> usize {
        item_count.div_ceil(page_size.max(1)).max(1)
    }

    /// Recomputes the page count and clamps the current page into range.
    pub fn recompute(&mut self, item_count: usize) {
        self.page_size = self.page_size.max(1);
        self.total_pages = Self::total_pages_for(item_count, self.page_size);
        self.current_page = self.current_page.clamp(1, self.total_pages);
    }

    /// Item indices shown on the current page.
    pub fn page_range(&self, item_count: usize) -> Range<usize> {
        let size = self.page_size.max(1);
        let start = (self.current_page.max(1) - 1)
            .saturating_mul(size)
            .min(item_count);
        let end = start.saturating_add(size).min(item_count);
        start..end
    }
}
