//! Client-side pagination for listings.

use serde::Serialize;

/// Projects shown per page on listing pages.
pub const DEFAULT_PAGE_SIZE: usize = 6;

/// One page of a listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// 1-based page number actually shown.
    pub page: usize,
    pub total_pages: usize,
    pub total_items: usize,
}

/// Slice `items` into the requested 1-based page.
///
/// Out-of-range pages are clamped to the nearest valid one; an empty list
/// is a single empty page.
pub fn paginate<T: Clone>(items: &[T], page: usize, per_page: usize) -> Page<T> {
    let per_page = per_page.max(1);
    let total_pages = items.len().div_ceil(per_page);
    let page = page.clamp(1, total_pages.max(1));

    let start = (page - 1) * per_page;
    let end = (start + per_page).min(items.len());

    Page {
        items: items.get(start..end).unwrap_or_default().to_vec(),
        page,
        total_pages,
        total_items: items.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paginate_pages() {
        let items: Vec<u32> = (1..=14).collect();

        let first = paginate(&items, 1, 6);
        assert_eq!(first.items, vec![1, 2, 3, 4, 5, 6]);
        assert_eq!(first.total_pages, 3);

        let last = paginate(&items, 3, 6);
        assert_eq!(last.items, vec![13, 14]);
        assert_eq!(last.total_items, 14);
    }

    #[test]
    fn test_paginate_clamps_page() {
        let items: Vec<u32> = (1..=7).collect();

        assert_eq!(paginate(&items, 0, 6).page, 1);
        let beyond = paginate(&items, 9, 6);
        assert_eq!(beyond.page, 2);
        assert_eq!(beyond.items, vec![7]);
    }

    #[test]
    fn test_paginate_empty_and_zero_size() {
        let empty: Vec<u32> = Vec::new();
        let page = paginate(&empty, 2, 6);
        assert_eq!(page.page, 1);
        assert_eq!(page.total_pages, 0);
        assert!(page.items.is_empty());

        let items = vec![1, 2, 3];
        assert_eq!(paginate(&items, 2, 0).items, vec![2]);
    }
}
