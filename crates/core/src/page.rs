//! Offset pagination shared by list endpoints.

use serde::{Deserialize, Serialize};

/// Requested page (1-based) and page size.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    pub page: u32,
    pub limit: u32,
}

impl PageRequest {
    pub const DEFAULT_LIMIT: u32 = 20;
    pub const MAX_LIMIT: u32 = 100;

    /// Clamp raw query values into a usable request.
    pub fn new(page: Option<u32>, limit: Option<u32>) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            limit: limit.unwrap_or(Self::DEFAULT_LIMIT).clamp(1, Self::MAX_LIMIT),
        }
    }

    pub fn offset(&self) -> usize {
        (self.page as usize - 1) * self.limit as usize
    }

    /// Cut one page out of an already filtered and sorted list.
    pub fn slice<T>(&self, items: Vec<T>) -> Page<T> {
        let total = items.len() as u64;
        let items = items.into_iter().skip(self.offset()).take(self.limit as usize).collect();
        Page::new(items, total, *self)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(None, None)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u32,
    pub limit: u32,
    pub total_pages: u32,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total: u64, request: PageRequest) -> Self {
        let total_pages = total.div_ceil(request.limit as u64) as u32;
        Self {
            items,
            total,
            page: request.page,
            limit: request.limit,
            total_pages,
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            limit: self.limit,
            total_pages: self.total_pages,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamps_raw_values() {
        let r = PageRequest::new(Some(0), Some(10_000));
        assert_eq!(r.page, 1);
        assert_eq!(r.limit, PageRequest::MAX_LIMIT);
    }

    #[test]
    fn slices_the_requested_window() {
        let page = PageRequest::new(Some(2), Some(3)).slice((1..=8).collect::<Vec<_>>());
        assert_eq!(page.items, vec![4, 5, 6]);
        assert_eq!(page.total, 8);
        assert_eq!(page.total_pages, 3);
    }

    #[test]
    fn past_the_end_is_empty() {
        let page = PageRequest::new(Some(9), Some(5)).slice(vec![1, 2]);
        assert!(page.items.is_empty());
        assert_eq!(page.total_pages, 1);
    }
}
