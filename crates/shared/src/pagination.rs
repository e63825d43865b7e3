//! Page/size pagination utilities.
//!
//! List endpoints accept `page` (zero based) and `size` query parameters and
//! answer with a [`Page`] envelope.

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const MAX_PAGE_SIZE: u32 = 100;

/// Error type for pagination parameters.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PaginationError {
    #[error("Page size must be between 1 and {MAX_PAGE_SIZE}")]
    InvalidSize,
    #[error("Page index is too large")]
    PageOutOfRange,
}

/// Requested page, as read from the query string.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
pub struct PageRequest {
    #[serde(default)]
    pub page: u32,
    #[serde(default = "default_size")]
    pub size: u32,
}

fn default_size() -> u32 {
    DEFAULT_PAGE_SIZE
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 0,
            size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl PageRequest {
    pub fn new(page: u32, size: u32) -> Result<Self, PaginationError> {
        Self { page, size }.validated()
    }

    /// Checks the bounds and returns the request unchanged.
    pub fn validated(self) -> Result<Self, PaginationError> {
        if self.size == 0 || self.size > MAX_PAGE_SIZE {
            return Err(PaginationError::InvalidSize);
        }
        if (self.page as u64) * (self.size as u64) > i64::MAX as u64 {
            return Err(PaginationError::PageOutOfRange);
        }
        Ok(self)
    }

    /// SQL `LIMIT` value.
    pub fn limit(&self) -> i64 {
        self.size as i64
    }

    /// SQL `OFFSET` value.
    pub fn offset(&self) -> i64 {
        self.page as i64 * self.size as i64
    }
}

/// A page of results plus totals.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub content: Vec<T>,
    pub page: u32,
    pub size: u32,
    pub total_elements: i64,
    pub total_pages: i64,
}

impl<T> Page<T> {
    pub fn new(content: Vec<T>, request: PageRequest, total_elements: i64) -> Self {
        let size = request.size.max(1) as i64;
        let total_pages = if total_elements <= 0 {
            0
        } else {
            (total_elements + size - 1) / size
        };
        Self {
            content,
            page: request.page,
            size: request.size,
            total_elements,
            total_pages,
        }
    }

    /// Converts the content while keeping the page metadata.
    pub fn map<U, F: FnMut(T) -> U>(self, f: F) -> Page<U> {
        Page {
            content: self.content.into_iter().map(f).collect(),
            page: self.page,
            size: self.size,
            total_elements: self.total_elements,
            total_pages: self.total_pages,
        }
    }

    pub fn has_next(&self) -> bool {
        (self.page as i64 + 1) < self.total_pages
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_request() {
        let req = PageRequest::default();
        assert_eq!(req.page, 0);
        assert_eq!(req.size, DEFAULT_PAGE_SIZE);
        assert_eq!(req.offset(), 0);
        assert_eq!(req.limit(), 20);
    }

    #[test]
    fn test_offset_calculation() {
        let req = PageRequest::new(3, 25).unwrap();
        assert_eq!(req.offset(), 75);
        assert_eq!(req.limit(), 25);
    }

    #[test]
    fn test_size_bounds() {
        assert_eq!(PageRequest::new(0, 0), Err(PaginationError::InvalidSize));
        assert_eq!(PageRequest::new(0, 101), Err(PaginationError::InvalidSize));
        assert!(PageRequest::new(0, 100).is_ok());
    }

    #[test]
    fn test_query_defaults_when_missing() {
        let req: PageRequest = serde_json::from_str("{}").unwrap();
        assert_eq!(req, PageRequest::default());

        let req: PageRequest = serde_json::from_str(r#"{"page": 2}"#).unwrap();
        assert_eq!(req.page, 2);
        assert_eq!(req.size, DEFAULT_PAGE_SIZE);
    }

    #[test]
    fn test_total_pages() {
        let req = PageRequest::new(0, 10).unwrap();
        assert_eq!(Page::<i32>::new(vec![], req, 0).total_pages, 0);
        assert_eq!(Page::<i32>::new(vec![], req, 10).total_pages, 1);
        assert_eq!(Page::<i32>::new(vec![], req, 11).total_pages, 2);
    }

    #[test]
    fn test_map_preserves_metadata() {
        let req = PageRequest::new(1, 2).unwrap();
        let page = Page::new(vec![1, 2], req, 5).map(|n| n * 10);

        assert_eq!(page.content, vec![10, 20]);
        assert_eq!(page.page, 1);
        assert_eq!(page.total_elements, 5);
        assert_eq!(page.total_pages, 3);
        assert!(page.has_next());
    }

    #[test]
    fn test_serializes_camel_case() {
        let page = Page::new(vec!["a"], PageRequest::default(), 1);
        let json = serde_json::to_value(&page).unwrap();
        assert_eq!(json["totalElements"], 1);
        assert_eq!(json["totalPages"], 1);
    }
}
