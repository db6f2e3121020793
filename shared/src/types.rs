//! Common types used across the selector

use serde::{Deserialize, Serialize};

/// Identifier of a physical lot (`stock.lot`)
pub type LotId = i64;

/// Identifier of any server-side record
pub type RecordId = i64;

/// Default number of candidates requested per page
pub const DEFAULT_PAGE_SIZE: u32 = 35;

/// Pagination cursor (zero-based page)
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Pagination {
    pub page: u32,
    pub page_size: u32,
}

impl Pagination {
    pub fn new(page: u32, page_size: u32) -> Self {
        Self { page, page_size }
    }

    pub fn first(page_size: u32) -> Self {
        Self { page: 0, page_size }
    }

    pub fn next(&self) -> Self {
        Self {
            page: self.page + 1,
            page_size: self.page_size,
        }
    }

    /// Index of the first item on this page
    pub fn offset(&self) -> usize {
        self.page as usize * self.page_size as usize
    }

    /// Slice a fully fetched list down to this page
    pub fn slice<T: Clone>(&self, items: &[T]) -> Vec<T> {
        items
            .iter()
            .skip(self.offset())
            .take(self.page_size as usize)
            .cloned()
            .collect()
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self::first(DEFAULT_PAGE_SIZE)
    }
}

/// One page of results with the server-reported total
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
}

impl<T> Page<T> {
    pub fn empty() -> Self {
        Self {
            items: Vec::new(),
            total: 0,
        }
    }
}

/// Whether more items can be fetched after `loaded` of `total`
pub fn has_more(loaded: u64, total: u64) -> bool {
    loaded < total
}
