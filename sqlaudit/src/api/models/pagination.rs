//! Shared pagination types for paged list endpoints.
//!
//! The backend pages with 1-based `page` and `pageSize` query parameters. The client only checks
//! that both are positive; any upper cap is the backend's business.

use crate::errors::{Error, Result};
use serde::{Deserialize, Serialize};

/// Default page size used by the CLI when none is given.
pub const DEFAULT_PAGE_SIZE: u32 = 10;

/// Page request parameters, only obtainable through [`PageRequest::new`] or `Default`.
///
/// ```compile_fail
/// let unchecked = sqlaudit::PageRequest { page: 0, page_size: 0 };
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageRequest {
    page: u32,
    page_size: u32,
}

impl PageRequest {
    /// Validated constructor: both values must be at least 1.
    pub fn new(page: u32, page_size: u32) -> Result<Self> {
        if page == 0 {
            return Err(Error::invalid_input("page must be a positive integer"));
        }
        if page_size == 0 {
            return Err(Error::invalid_input("pageSize must be a positive integer"));
        }
        Ok(Self { page, page_size })
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Query pairs in wire order.
    pub(crate) fn query(&self) -> [(&'static str, u32); 2] {
        [("page", self.page), ("pageSize", self.page_size)]
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

/// One page of results.
///
/// The record list is accepted under `records`, `list` or `items`; missing counters default to 0.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    #[serde(alias = "list", alias = "items", default = "Vec::new")]
    pub records: Vec<T>,
    #[serde(default)]
    pub total: u64,
    #[serde(default, alias = "current")]
    pub page: u32,
    #[serde(default, alias = "size")]
    pub page_size: u32,
}

impl<T> Page<T> {
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
