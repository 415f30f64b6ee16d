//! LRU cache for store pages.
//!
//! Pages are only loaded from disk when first accessed; the cache keeps the
//! hot set in memory and tracks dirty pages for write-back on eviction or
//! flush.

use std::collections::HashMap;
use std::collections::VecDeque;

use crate::store::page::{Page, PageId};

/// A cached page with its data and dirty flag
pub struct CachedPage {
    pub page: Page,
    pub dirty: bool,
}

/// LRU cache for store pages
pub struct PageCache {
    /// Page data storage - only contains pages that have been accessed
    pub pages: HashMap<PageId, CachedPage>,
    /// LRU order (front = oldest, back = newest)
    lru_order: VecDeque<PageId>,
    /// Maximum number of pages to cache
    max_pages: usize,
}

impl PageCache {
    /// Create a new page cache with specified maximum size
    pub fn new(max_pages: usize) -> Self {
        Self {
            pages: HashMap::new(),
            lru_order: VecDeque::new(),
            max_pages,
        }
    }

    /// Get a page from cache, updating LRU order.
    /// Returns None if the page is not cached (must be loaded from disk).
    pub fn get(&mut self, page_id: PageId) -> Option<&Page> {
        if self.pages.contains_key(&page_id) {
            self.lru_order.retain(|&id| id != page_id);
            self.lru_order.push_back(page_id);
            self.pages.get(&page_id).map(|cached| &cached.page)
        } else {
            None
        }
    }

    /// Insert a page into cache (after loading from disk or creating new)
    pub fn insert(&mut self, page_id: PageId, page: Page, dirty: bool) {
        if self.pages.contains_key(&page_id) {
            self.lru_order.retain(|&id| id != page_id);
        }
        self.lru_order.push_back(page_id);
        self.pages.insert(page_id, CachedPage { page, dirty });
    }

    /// Drop a page from the cache without write-back.
    pub fn remove(&mut self, page_id: PageId) {
        self.lru_order.retain(|&id| id != page_id);
        self.pages.remove(&page_id);
    }

    /// Check if we need to evict pages
    pub fn needs_eviction(&self) -> bool {
        self.pages.len() >= self.max_pages
    }

    /// Get the oldest page to evict (returns page_id, page, dirty flag)
    pub fn evict_oldest(&mut self) -> Option<(PageId, Page, bool)> {
        while let Some(page_id) = self.lru_order.pop_front() {
            if let Some(cached) = self.pages.remove(&page_id) {
                return Some((page_id, cached.page, cached.dirty));
            }
        }
        None
    }

    /// Get all dirty page ids for flushing
    pub fn dirty_pages(&self) -> Vec<PageId> {
        self.pages
            .iter()
            .filter(|(_, cached)| cached.dirty)
            .map(|(id, _)| *id)
            .collect()
    }

    /// Mark a page clean after a successful flush
    pub fn mark_clean(&mut self, page_id: PageId) {
        if let Some(cached) = self.pages.get_mut(&page_id) {
            cached.dirty = false;
        }
    }

    /// Number of cached pages
    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    /// Clear the cache, returning everything it held
    pub fn clear(&mut self) -> Vec<(PageId, Page, bool)> {
        self.lru_order.clear();
        self.pages
            .drain()
            .map(|(id, cached)| (id, cached.page, cached.dirty))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::page::StoredNode;

    fn node_page() -> Page {
        Page::Node(StoredNode::new())
    }

    #[test]
    fn test_insert_and_get() {
        let mut cache = PageCache::new(4);
        assert!(cache.get(1).is_none());

        cache.insert(1, node_page(), false);
        assert!(cache.get(1).is_some());
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_lru_eviction_order() {
        let mut cache = PageCache::new(2);
        cache.insert(1, node_page(), false);
        cache.insert(2, node_page(), false);

        // touching page 1 makes page 2 the oldest
        cache.get(1);
        assert!(cache.needs_eviction());
        let (evicted, _, _) = cache.evict_oldest().unwrap();
        assert_eq!(evicted, 2);
    }

    #[test]
    fn test_dirty_tracking() {
        let mut cache = PageCache::new(4);
        cache.insert(1, node_page(), true);
        cache.insert(2, node_page(), false);

        assert_eq!(cache.dirty_pages(), vec![1]);
        cache.mark_clean(1);
        assert!(cache.dirty_pages().is_empty());
    }

    #[test]
    fn test_clear_returns_contents() {
        let mut cache = PageCache::new(4);
        cache.insert(1, node_page(), true);
        cache.insert(2, node_page(), false);

        let drained = cache.clear();
        assert_eq!(drained.len(), 2);
        assert!(cache.is_empty());
    }
}
