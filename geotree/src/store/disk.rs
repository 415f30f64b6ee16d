//! Page-file backed node store.
//!
//! Pages are read one at a time on demand; nothing is preloaded when a file
//! is opened beyond the header. Handles map directly onto page ids, freed
//! pages are chained through an on-disk free list and reused, and an LRU
//! cache keeps the hot set in memory with dirty write-back on eviction.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;

use crate::envelope::Envelope;
use crate::error::{SpatialError, SpatialResult};
use crate::store::cache::PageCache;
use crate::store::page::{
    FileHeader, FreePage, Page, PageId, PageWithChecksum, StoredNode, StoredRecord,
    DEFAULT_CACHE_PAGES, PAGE_SIZE,
};
use crate::store::{NodeId, NodeStore, RecordId, TreeMetadata};

/// Handles reading/writing individual pages to disk.
///
/// Each read_page call results in exactly one seek and read; there is no
/// bulk loading.
struct Storage {
    file: RwLock<File>,
    #[allow(dead_code)]
    path: PathBuf,
    page_size: usize,
}

impl Storage {
    fn create(path: &Path) -> SpatialResult<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;

        Ok(Self {
            file: RwLock::new(file),
            path: path.to_path_buf(),
            page_size: PAGE_SIZE,
        })
    }

    fn open(path: &Path) -> SpatialResult<Self> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;

        Ok(Self {
            file: RwLock::new(file),
            path: path.to_path_buf(),
            page_size: PAGE_SIZE,
        })
    }

    fn read_header(&self) -> SpatialResult<FileHeader> {
        let mut file = self.file.write();
        file.seek(SeekFrom::Start(0))?;
        let mut buffer = vec![0u8; self.page_size];
        file.read_exact(&mut buffer)?;
        bincode::serde::decode_from_slice(&buffer, bincode::config::legacy())
            .map(|(header, _)| header)
            .map_err(|e| SpatialError::Serialization(e.to_string()))
    }

    fn write_header(&self, header: &FileHeader) -> SpatialResult<()> {
        let bytes = bincode::serde::encode_to_vec(header, bincode::config::legacy())
            .map_err(|e| SpatialError::Serialization(e.to_string()))?;
        let mut padded = bytes;
        padded.resize(self.page_size, 0);

        let mut file = self.file.write();
        file.seek(SeekFrom::Start(0))?;
        file.write_all(&padded)?;
        Ok(())
    }

    /// Read a single page from disk, verifying its checksum.
    fn read_page(&self, page_id: PageId) -> SpatialResult<Page> {
        if page_id == 0 {
            return Err(SpatialError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "Cannot read page 0 (reserved for header)",
            )));
        }

        let offset = (page_id as usize) * self.page_size;
        let mut file = self.file.write();
        file.seek(SeekFrom::Start(offset as u64))?;
        let mut buffer = vec![0u8; self.page_size];
        file.read_exact(&mut buffer)?;

        let page_with_checksum: PageWithChecksum =
            bincode::serde::decode_from_slice(&buffer, bincode::config::legacy())
                .map(|(page, _)| page)
                .map_err(|e| SpatialError::Serialization(e.to_string()))?;

        page_with_checksum.into_page()
    }

    /// Write a single page to disk with checksum and padding.
    fn write_page(&self, page_id: PageId, page: &Page) -> SpatialResult<()> {
        if page_id == 0 {
            return Err(SpatialError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "Cannot write to page 0 (reserved for header)",
            )));
        }

        let page_with_checksum = PageWithChecksum::new(page.clone());
        let bytes = bincode::serde::encode_to_vec(&page_with_checksum, bincode::config::legacy())
            .map_err(|e| SpatialError::Serialization(e.to_string()))?;

        if bytes.len() > self.page_size {
            return Err(SpatialError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!(
                    "Page too large: {} bytes (max {})",
                    bytes.len(),
                    self.page_size
                ),
            )));
        }

        let mut padded = bytes;
        padded.resize(self.page_size, 0);

        let offset = (page_id as usize) * self.page_size;
        let mut file = self.file.write();
        file.seek(SeekFrom::Start(offset as u64))?;
        file.write_all(&padded)?;
        Ok(())
    }

    fn sync(&self) -> SpatialResult<()> {
        self.file.write().sync_all()?;
        Ok(())
    }

    fn truncate(&self) -> SpatialResult<()> {
        let file = self.file.write();
        file.set_len(0)?;
        Ok(())
    }
}

/// I/O and cache counters for a store instance
#[derive(Debug, Clone, Default)]
pub struct StoreStats {
    pub cached_pages: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub disk_reads: u64,
    pub disk_writes: u64,
}

struct Counters {
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    disk_reads: AtomicU64,
    disk_writes: AtomicU64,
}

impl Counters {
    fn new() -> Self {
        Self {
            cache_hits: AtomicU64::new(0),
            cache_misses: AtomicU64::new(0),
            disk_reads: AtomicU64::new(0),
            disk_writes: AtomicU64::new(0),
        }
    }
}

/// A [`NodeStore`] persisted in a single page file.
///
/// Node and record handles are page ids; freeing an entity writes a free-list
/// page in its place so stale handles are detected rather than resurrected.
/// Creating a store truncates the target file; opening reads and validates
/// only the header, leaving all pages on disk until accessed.
pub struct DiskNodeStore {
    storage: Storage,
    cache: RwLock<PageCache>,
    header: RwLock<FileHeader>,
    counters: Counters,
    closed: RwLock<bool>,
}

impl DiskNodeStore {
    /// Create a new store file at the given path. Truncates anything there.
    pub fn create(path: impl AsRef<Path>) -> SpatialResult<Self> {
        Self::create_with_cache_size(path, DEFAULT_CACHE_PAGES)
    }

    /// Create with custom cache size (number of pages)
    pub fn create_with_cache_size(
        path: impl AsRef<Path>,
        cache_pages: usize,
    ) -> SpatialResult<Self> {
        log::debug!("creating node store at {:?}", path.as_ref());
        let storage = Storage::create(path.as_ref())?;
        let header = FileHeader::new();
        storage.write_header(&header)?;
        storage.sync()?;

        Ok(Self {
            storage,
            cache: RwLock::new(PageCache::new(cache_pages)),
            header: RwLock::new(header),
            counters: Counters::new(),
            closed: RwLock::new(false),
        })
    }

    /// Open an existing store file. Only the header is read; tree pages stay
    /// on disk until accessed.
    pub fn open(path: impl AsRef<Path>) -> SpatialResult<Self> {
        Self::open_with_cache_size(path, DEFAULT_CACHE_PAGES)
    }

    /// Open with custom cache size
    pub fn open_with_cache_size(
        path: impl AsRef<Path>,
        cache_pages: usize,
    ) -> SpatialResult<Self> {
        log::debug!("opening node store at {:?}", path.as_ref());
        let storage = Storage::open(path.as_ref())?;
        let header = storage.read_header()?;
        header.validate()?;

        Ok(Self {
            storage,
            cache: RwLock::new(PageCache::new(cache_pages)),
            header: RwLock::new(header),
            counters: Counters::new(),
            closed: RwLock::new(false),
        })
    }

    fn check_closed(&self) -> SpatialResult<()> {
        if *self.closed.read() {
            Err(SpatialError::Closed)
        } else {
            Ok(())
        }
    }

    /// I/O and cache counters
    pub fn stats(&self) -> StoreStats {
        StoreStats {
            cached_pages: self.cache.read().len() as u64,
            cache_hits: self.counters.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.counters.cache_misses.load(Ordering::Relaxed),
            disk_reads: self.counters.disk_reads.load(Ordering::Relaxed),
            disk_writes: self.counters.disk_writes.load(Ordering::Relaxed),
        }
    }

    /// Write all dirty pages and the header to disk, then sync.
    pub fn flush(&self) -> SpatialResult<()> {
        let dirty_pages = self.cache.read().dirty_pages();

        for page_id in dirty_pages {
            let mut cache = self.cache.write();
            if let Some(cached) = cache.pages.get(&page_id) {
                if cached.dirty {
                    self.storage.write_page(page_id, &cached.page)?;
                    self.counters.disk_writes.fetch_add(1, Ordering::Relaxed);
                    cache.mark_clean(page_id);
                }
            }
        }

        self.storage.write_header(&self.header.read())?;
        self.storage.sync()?;
        Ok(())
    }

    /// Flush and mark the store closed; further operations fail.
    pub fn close(&self) -> SpatialResult<()> {
        let mut closed = self.closed.write();
        if *closed {
            return Ok(());
        }
        self.flush()?;
        *closed = true;
        Ok(())
    }

    /// Drop all data, truncating the backing file.
    pub fn drop_store(&self) -> SpatialResult<()> {
        let mut closed = self.closed.write();
        self.cache.write().clear();
        self.storage.truncate()?;
        *closed = true;
        Ok(())
    }

    /// Allocate a page, reusing the free-list chain when possible.
    fn allocate_page(&self) -> SpatialResult<PageId> {
        let mut header = self.header.write();
        if header.free_list_head != 0 {
            let page_id = header.free_list_head;
            drop(header);
            // the freed page records the next link in the chain
            let next = match self.read_cached(page_id)? {
                Page::Free(free) => free.next_free,
                _ => {
                    return Err(SpatialError::CorruptTree(format!(
                        "free list head {} is not a free page",
                        page_id
                    )))
                }
            };
            let mut header = self.header.write();
            header.free_list_head = next;
            header.free_page_count = header.free_page_count.saturating_sub(1);
            return Ok(page_id);
        }

        let page_id = header.next_page_id;
        header.next_page_id += 1;
        Ok(page_id)
    }

    /// Free a page, chaining it onto the on-disk free list. The free marker
    /// overwrites the old contents so stale handles read back as freed.
    fn free_page(&self, page_id: PageId) -> SpatialResult<()> {
        let next_free = {
            let mut header = self.header.write();
            let next = header.free_list_head;
            header.free_list_head = page_id;
            header.free_page_count += 1;
            next
        };
        self.write_cached(page_id, Page::Free(FreePage { next_free }))
    }

    /// Read a page - first checks cache, then loads from disk.
    fn read_cached(&self, page_id: PageId) -> SpatialResult<Page> {
        {
            let mut cache = self.cache.write();
            if let Some(page) = cache.get(page_id) {
                self.counters.cache_hits.fetch_add(1, Ordering::Relaxed);
                return Ok(page.clone());
            }
        }

        self.counters.cache_misses.fetch_add(1, Ordering::Relaxed);
        self.counters.disk_reads.fetch_add(1, Ordering::Relaxed);

        let page = self.storage.read_page(page_id)?;
        self.insert_cached(page_id, page.clone(), false)?;
        Ok(page)
    }

    /// Write a page to cache, marked dirty for a later flush.
    fn write_cached(&self, page_id: PageId, page: Page) -> SpatialResult<()> {
        self.insert_cached(page_id, page, true)
    }

    /// Add a page to cache, writing evicted dirty pages back to disk.
    fn insert_cached(&self, page_id: PageId, page: Page, dirty: bool) -> SpatialResult<()> {
        let mut cache = self.cache.write();

        while cache.needs_eviction() {
            if let Some((evict_id, evict_page, evict_dirty)) = cache.evict_oldest() {
                if evict_dirty {
                    self.storage.write_page(evict_id, &evict_page)?;
                    self.counters.disk_writes.fetch_add(1, Ordering::Relaxed);
                }
            } else {
                break;
            }
        }

        cache.insert(page_id, page, dirty);
        Ok(())
    }

    fn in_bounds(&self, page_id: PageId) -> bool {
        page_id != 0 && page_id < self.header.read().next_page_id
    }

    fn read_node(&self, node: NodeId) -> SpatialResult<StoredNode> {
        if !self.in_bounds(node.0) {
            return Err(SpatialError::CorruptTree(format!("no such {}", node)));
        }
        match self.read_cached(node.0)? {
            Page::Node(stored) => Ok(stored),
            _ => Err(SpatialError::CorruptTree(format!(
                "page {} is not a tree node",
                node.0
            ))),
        }
    }

    fn write_node(&self, node: NodeId, stored: StoredNode) -> SpatialResult<()> {
        self.write_cached(node.0, Page::Node(stored))
    }

    fn read_record(&self, record: RecordId) -> SpatialResult<StoredRecord> {
        if !self.in_bounds(record.0) {
            return Err(SpatialError::NotFound(format!("no such {}", record)));
        }
        match self.read_cached(record.0)? {
            Page::Record(stored) if stored.id == record => Ok(stored),
            _ => Err(SpatialError::NotFound(format!("no such {}", record))),
        }
    }

    fn write_record(&self, record: RecordId, stored: StoredRecord) -> SpatialResult<()> {
        self.write_cached(record.0, Page::Record(stored))
    }
}

impl NodeStore for DiskNodeStore {
    fn create_node(&self) -> SpatialResult<NodeId> {
        self.check_closed()?;
        let page_id = self.allocate_page()?;
        self.write_cached(page_id, Page::Node(StoredNode::new()))?;
        Ok(NodeId(page_id))
    }

    fn delete_node(&self, node: NodeId) -> SpatialResult<()> {
        self.check_closed()?;
        let stored = self.read_node(node)?;

        if let Some(parent) = stored.parent {
            let mut parent_node = self.read_node(parent)?;
            parent_node.children.retain(|c| *c != node);
            self.write_node(parent, parent_node)?;
        }
        for child in &stored.children {
            let mut child_node = self.read_node(*child)?;
            child_node.parent = None;
            self.write_node(*child, child_node)?;
        }
        for record in &stored.references {
            let mut stored_record = self.read_record(*record)?;
            stored_record.holder = None;
            self.write_record(*record, stored_record)?;
        }

        self.free_page(node.0)
    }

    fn is_leaf(&self, node: NodeId) -> SpatialResult<bool> {
        Ok(self.read_node(node)?.children.is_empty())
    }

    fn children(&self, node: NodeId) -> SpatialResult<Vec<NodeId>> {
        Ok(self.read_node(node)?.children)
    }

    fn parent(&self, node: NodeId) -> SpatialResult<Option<NodeId>> {
        Ok(self.read_node(node)?.parent)
    }

    fn add_child(&self, parent: NodeId, child: NodeId) -> SpatialResult<()> {
        self.check_closed()?;
        let mut child_node = self.read_node(child)?;
        if child_node.parent.is_some() {
            return Err(SpatialError::CorruptTree(format!(
                "{} already has a parent",
                child
            )));
        }
        let mut parent_node = self.read_node(parent)?;
        child_node.parent = Some(parent);
        parent_node.children.push(child);
        self.write_node(child, child_node)?;
        self.write_node(parent, parent_node)
    }

    fn remove_child(&self, parent: NodeId, child: NodeId) -> SpatialResult<()> {
        self.check_closed()?;
        let mut parent_node = self.read_node(parent)?;
        let before = parent_node.children.len();
        parent_node.children.retain(|c| *c != child);
        if parent_node.children.len() == before {
            return Err(SpatialError::CorruptTree(format!(
                "{} is not a child of {}",
                child, parent
            )));
        }
        let mut child_node = self.read_node(child)?;
        child_node.parent = None;
        self.write_node(parent, parent_node)?;
        self.write_node(child, child_node)
    }

    fn bounding_box(&self, node: NodeId) -> SpatialResult<Option<Envelope>> {
        match self.read_node(node)?.bbox {
            Some(flat) => Ok(Some(Envelope::from_flat(&flat)?)),
            None => Ok(None),
        }
    }

    fn set_bounding_box(&self, node: NodeId, bbox: &Envelope) -> SpatialResult<()> {
        self.check_closed()?;
        let mut stored = self.read_node(node)?;
        stored.bbox = Some(bbox.to_flat());
        self.write_node(node, stored)
    }

    fn clear_bounding_box(&self, node: NodeId) -> SpatialResult<()> {
        self.check_closed()?;
        let mut stored = self.read_node(node)?;
        stored.bbox = None;
        self.write_node(node, stored)
    }

    fn add_reference(&self, leaf: NodeId, record: RecordId) -> SpatialResult<()> {
        self.check_closed()?;
        let mut stored_record = self.read_record(record)?;
        if stored_record.holder.is_some() {
            return Err(SpatialError::CorruptTree(format!(
                "{} is already referenced",
                record
            )));
        }
        let mut leaf_node = self.read_node(leaf)?;
        stored_record.holder = Some(leaf);
        leaf_node.references.push(record);
        self.write_record(record, stored_record)?;
        self.write_node(leaf, leaf_node)
    }

    fn remove_reference(&self, leaf: NodeId, record: RecordId) -> SpatialResult<()> {
        self.check_closed()?;
        let mut leaf_node = self.read_node(leaf)?;
        let before = leaf_node.references.len();
        leaf_node.references.retain(|r| *r != record);
        if leaf_node.references.len() == before {
            return Err(SpatialError::NotFound(format!(
                "{} holds no reference to {}",
                leaf, record
            )));
        }
        let mut stored_record = self.read_record(record)?;
        stored_record.holder = None;
        self.write_node(leaf, leaf_node)?;
        self.write_record(record, stored_record)
    }

    fn references(&self, leaf: NodeId) -> SpatialResult<Vec<RecordId>> {
        Ok(self.read_node(leaf)?.references)
    }

    fn reference_holder(&self, record: RecordId) -> SpatialResult<Option<NodeId>> {
        Ok(self.read_record(record)?.holder)
    }

    fn create_record(&self, data: &[f64]) -> SpatialResult<RecordId> {
        self.check_closed()?;
        let page_id = self.allocate_page()?;
        let id = RecordId(page_id);
        self.write_record(
            id,
            StoredRecord {
                id,
                data: data.to_vec(),
                holder: None,
            },
        )?;
        Ok(id)
    }

    fn record_exists(&self, record: RecordId) -> SpatialResult<bool> {
        if !self.in_bounds(record.0) {
            return Ok(false);
        }
        match self.read_cached(record.0)? {
            Page::Record(stored) => Ok(stored.id == record),
            _ => Ok(false),
        }
    }

    fn record_data(&self, record: RecordId) -> SpatialResult<Vec<f64>> {
        Ok(self.read_record(record)?.data)
    }

    fn delete_record(&self, record: RecordId) -> SpatialResult<()> {
        self.check_closed()?;
        let stored = self.read_record(record)?;
        if let Some(holder) = stored.holder {
            let mut leaf_node = self.read_node(holder)?;
            leaf_node.references.retain(|r| *r != record);
            self.write_node(holder, leaf_node)?;
        }
        self.free_page(record.0)
    }

    fn read_metadata(&self) -> SpatialResult<Option<TreeMetadata>> {
        Ok(self.header.read().metadata.clone())
    }

    fn write_metadata(&self, meta: &TreeMetadata) -> SpatialResult<()> {
        self.check_closed()?;
        let header = {
            let mut header = self.header.write();
            header.metadata = Some(meta.clone());
            header.clone()
        };
        self.storage.write_header(&header)
    }

    fn clear_metadata(&self) -> SpatialResult<()> {
        self.check_closed()?;
        let header = {
            let mut header = self.header.write();
            header.metadata = None;
            header.clone()
        };
        self.storage.write_header(&header)
    }
}

impl Drop for DiskNodeStore {
    fn drop(&mut self) {
        // best effort flush on drop
        if !*self.closed.read() {
            let _ = self.flush();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_create_and_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.gtree");

        {
            let store = DiskNodeStore::create(&path).unwrap();
            let node = store.create_node().unwrap();
            let bbox = Envelope::rect(0.0, 0.0, 10.0, 10.0).unwrap();
            store.set_bounding_box(node, &bbox).unwrap();
            store
                .write_metadata(&TreeMetadata {
                    root: Some(node),
                    max_node_references: 100,
                    total_count: 0,
                })
                .unwrap();
            store.close().unwrap();
        }

        {
            let store = DiskNodeStore::open(&path).unwrap();
            let meta = store.read_metadata().unwrap().unwrap();
            let root = meta.root.unwrap();
            assert_eq!(
                store.bounding_box(root).unwrap(),
                Some(Envelope::rect(0.0, 0.0, 10.0, 10.0).unwrap())
            );
            // nothing was preloaded before the node access
            assert_eq!(store.stats().disk_reads, 1);
            store.close().unwrap();
        }
    }

    #[test]
    fn test_open_rejects_garbage() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("garbage.gtree");
        std::fs::write(&path, vec![0xAB; PAGE_SIZE]).unwrap();
        assert!(DiskNodeStore::open(&path).is_err());
    }

    #[test]
    fn test_links_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("links.gtree");
        let store = DiskNodeStore::create(&path).unwrap();

        let root = store.create_node().unwrap();
        let leaf = store.create_node().unwrap();
        store.add_child(root, leaf).unwrap();

        let record = store.create_record(&[1.0, 2.0, 3.0, 4.0]).unwrap();
        store.add_reference(leaf, record).unwrap();

        assert!(!store.is_leaf(root).unwrap());
        assert!(store.is_leaf(leaf).unwrap());
        assert_eq!(store.children(root).unwrap(), vec![leaf]);
        assert_eq!(store.parent(leaf).unwrap(), Some(root));
        assert_eq!(store.references(leaf).unwrap(), vec![record]);
        assert_eq!(store.reference_holder(record).unwrap(), Some(leaf));
        assert_eq!(store.record_data(record).unwrap(), vec![1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_free_pages_are_not_resurrected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("free.gtree");
        let store = DiskNodeStore::create(&path).unwrap();

        let record = store.create_record(&[1.0, 2.0]).unwrap();
        store.delete_record(record).unwrap();

        assert!(!store.record_exists(record).unwrap());
        assert!(matches!(
            store.record_data(record).unwrap_err(),
            SpatialError::NotFound(_)
        ));
    }

    #[test]
    fn test_page_reuse_after_free() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("reuse.gtree");
        let store = DiskNodeStore::create(&path).unwrap();

        let a = store.create_node().unwrap();
        let b = store.create_node().unwrap();
        store.delete_node(a).unwrap();
        store.delete_node(b).unwrap();

        // freed pages come back in LIFO chain order
        let c = store.create_node().unwrap();
        let d = store.create_node().unwrap();
        assert_eq!(c, b);
        assert_eq!(d, a);

        // the chain is drained, fresh allocations extend the file
        let e = store.create_node().unwrap();
        assert!(e.0 > b.0);
    }

    #[test]
    fn test_closed_store_errors() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("closed.gtree");
        let store = DiskNodeStore::create(&path).unwrap();
        store.close().unwrap();

        assert!(matches!(
            store.create_node().unwrap_err(),
            SpatialError::Closed
        ));
    }

    #[test]
    fn test_eviction_keeps_cache_bounded() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bounded.gtree");
        let store = DiskNodeStore::create_with_cache_size(&path, 8).unwrap();

        for i in 0..100 {
            let record = store.create_record(&[i as f64, i as f64]).unwrap();
            assert!(store.record_exists(record).unwrap());
        }

        let stats = store.stats();
        assert!(stats.cached_pages <= 8);
        assert!(stats.disk_writes > 0);
        store.close().unwrap();
    }

    #[test]
    fn test_checksum_corruption_detected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("corrupt.gtree");

        let record;
        {
            let store = DiskNodeStore::create(&path).unwrap();
            record = store.create_record(&[1.0, 2.0, 3.0, 4.0]).unwrap();
            store.close().unwrap();
        }

        // flip a byte inside the record's encoded payload
        {
            let mut file = OpenOptions::new().write(true).read(true).open(&path).unwrap();
            let offset = record.0 as usize * PAGE_SIZE + 12;
            file.seek(SeekFrom::Start(offset as u64)).unwrap();
            let mut byte = [0u8; 1];
            file.read_exact(&mut byte).unwrap();
            byte[0] ^= 0xFF;
            file.seek(SeekFrom::Start(offset as u64)).unwrap();
            file.write_all(&byte).unwrap();
        }

        let store = DiskNodeStore::open(&path).unwrap();
        assert!(store.record_data(record).is_err());
    }
}
