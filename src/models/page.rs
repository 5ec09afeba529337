use serde::{Deserialize, Serialize};

use crate::error::{AppError, FieldError};

pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const MAX_PAGE_SIZE: u32 = 100;

/// Raw `?page=&size=` query parameters.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<u32>,
    pub size: Option<u32>,
}

/// A validated, 0-based page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PageRequest {
    pub page: u32,
    pub size: u32,
}

impl PageRequest {
    pub fn new(page: u32, size: u32) -> Result<Self, AppError> {
        if size == 0 || size > MAX_PAGE_SIZE {
            return Err(AppError::ValidationFailed(vec![FieldError::new(
                "size",
                format!("Page size must be between 1 and {MAX_PAGE_SIZE}"),
            )]));
        }
        Ok(Self { page, size })
    }

    pub fn offset(&self) -> i64 {
        i64::from(self.page) * i64::from(self.size)
    }

    pub fn limit(&self) -> i64 {
        i64::from(self.size)
    }

    pub fn cache_key(&self) -> String {
        format!("{}-{}", self.page, self.size)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 0,
            size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl TryFrom<PageQuery> for PageRequest {
    type Error = AppError;

    fn try_from(q: PageQuery) -> Result<Self, Self::Error> {
        PageRequest::new(q.page.unwrap_or(0), q.size.unwrap_or(DEFAULT_PAGE_SIZE))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub content: Vec<T>,
    pub page: u32,
    pub size: u32,
    pub total_elements: u64,
    pub total_pages: u32,
}

impl<T> Page<T> {
    pub fn new(content: Vec<T>, request: PageRequest, total_elements: u64) -> Self {
        let size = u64::from(request.size);
        let total_pages = total_elements.div_ceil(size) as u32;
        Self {
            content,
            page: request.page,
            size: request.size,
            total_elements,
            total_pages,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_counts_partial_last_page() {
        let page = Page::new(vec![1, 2], PageRequest::new(1, 3).unwrap(), 5);
        assert_eq!(page.total_pages, 2);
        assert_eq!(page.total_elements, 5);
    }

    #[test]
    fn rejects_oversized_page() {
        assert!(matches!(
            PageRequest::new(0, MAX_PAGE_SIZE + 1),
            Err(AppError::ValidationFailed(_))
        ));
        assert!(PageRequest::new(0, 0).is_err());
    }

    #[test]
    fn offset_is_page_times_size() {
        assert_eq!(PageRequest::new(3, 20).unwrap().offset(), 60);
    }
}
