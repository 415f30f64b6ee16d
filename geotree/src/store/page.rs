//! On-disk page types for the page-file node store.
//!
//! Every entity lives in a fixed-size page: tree nodes, domain records, and
//! free-list links. Pages are bincode-encoded, wrapped in a CRC32 checksum
//! for corruption detection, and padded to [`PAGE_SIZE`]. Page 0 is reserved
//! for the file header.

use serde::{Deserialize, Serialize};

use crate::error::{SpatialError, SpatialResult};
use crate::store::{NodeId, RecordId, TreeMetadata};

/// Page ID - unique identifier for a page on disk
pub type PageId = u64;

/// Page size (16KB) - balances I/O efficiency and memory usage
pub const PAGE_SIZE: usize = 16384;

/// Default cache size in number of pages (16MB with 16KB pages)
pub const DEFAULT_CACHE_PAGES: usize = 1024;

/// Magic number for file format identification
pub const MAGIC: u32 = 0x47545245; // "GTRE"

/// File format version
pub const VERSION: u32 = 1;

/// A persisted tree node. The bounding box is stored in the flat doubles
/// layout (all mins then all maxes; `[xmin, ymin, xmax, ymax]` in 2D).
/// Child links and record references are structurally distinct lists.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredNode {
    pub parent: Option<NodeId>,
    pub bbox: Option<Vec<f64>>,
    pub children: Vec<NodeId>,
    pub references: Vec<RecordId>,
}

impl StoredNode {
    pub fn new() -> Self {
        Self {
            parent: None,
            bbox: None,
            children: Vec::new(),
            references: Vec::new(),
        }
    }
}

impl Default for StoredNode {
    fn default() -> Self {
        Self::new()
    }
}

/// A persisted domain record: its canonical flat numeric payload and the
/// leaf holding its incoming reference link.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredRecord {
    pub id: RecordId,
    pub data: Vec<f64>,
    pub holder: Option<NodeId>,
}

/// Page payloads in the store file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Page {
    /// A tree node with its links
    Node(StoredNode),
    /// A domain record payload
    Record(StoredRecord),
    /// A free page in the free list chain
    Free(FreePage),
}

/// A free page in the free list chain
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FreePage {
    /// Next free page in the chain (0 = end of chain)
    pub next_free: PageId,
}

/// A page wrapped with CRC32 checksum for corruption detection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageWithChecksum {
    /// CRC32 checksum of the page data
    pub checksum: u32,
    /// The actual page data
    pub page: Page,
}

impl PageWithChecksum {
    pub fn new(page: Page) -> Self {
        let checksum = Self::calculate_checksum(&page);
        Self { checksum, page }
    }

    /// Calculate CRC32 checksum of page data
    pub fn calculate_checksum(page: &Page) -> u32 {
        let serialized =
            bincode::serde::encode_to_vec(page, bincode::config::legacy()).unwrap_or_default();
        Self::crc32(&serialized)
    }

    /// CRC32-MPEG2 implementation (matching common checksums)
    fn crc32(data: &[u8]) -> u32 {
        let mut crc: u32 = 0xFFFFFFFF;
        const POLY: u32 = 0x04C11DB7;

        for &byte in data {
            crc ^= (byte as u32) << 24;
            for _ in 0..8 {
                crc = if crc & 0x80000000 != 0 {
                    (crc << 1) ^ POLY
                } else {
                    crc << 1
                };
            }
        }

        crc ^ 0xFFFFFFFF
    }

    /// Verify checksum and consume self to return the page
    pub fn into_page(self) -> SpatialResult<Page> {
        let expected = Self::calculate_checksum(&self.page);
        if self.checksum != expected {
            return Err(SpatialError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!(
                    "Page checksum mismatch - possible corruption (expected: {:x}, got: {:x})",
                    expected, self.checksum
                ),
            )));
        }
        Ok(self.page)
    }
}

/// File header stored at the beginning of the store file.
///
/// Besides the page bookkeeping, the header carries the serialized tree
/// metadata (root pointer, branching factor, cached total count), so that a
/// reopened file finds its tree without scanning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileHeader {
    pub magic: u32,
    pub version: u32,
    pub page_size: u32,
    pub next_page_id: PageId,
    pub free_list_head: PageId,
    pub free_page_count: u64,
    pub metadata: Option<TreeMetadata>,
}

impl FileHeader {
    pub fn new() -> Self {
        Self {
            magic: MAGIC,
            version: VERSION,
            page_size: PAGE_SIZE as u32,
            next_page_id: 1,
            free_list_head: 0,
            free_page_count: 0,
            metadata: None,
        }
    }

    pub fn validate(&self) -> SpatialResult<()> {
        if self.magic != MAGIC {
            return Err(SpatialError::Serialization(
                "Invalid file format (bad magic)".into(),
            ));
        }
        if self.version != VERSION {
            return Err(SpatialError::Serialization(
                "Unsupported file format version".into(),
            ));
        }
        Ok(())
    }
}

impl Default for FileHeader {
    fn default() -> Self {
        Self::new()
    }
}
