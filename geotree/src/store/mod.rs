//! Node storage abstraction for the R-Tree.
//!
//! The engine never owns tree structure directly. It manipulates nodes,
//! child links, leaf references, and per-tree metadata through the
//! [`NodeStore`] trait, addressed by opaque handles. Two backings ship:
//! an in-memory arena ([`MemoryNodeStore`]) and a page-file backing
//! ([`DiskNodeStore`]) with checksummed pages and an LRU cache.

pub mod cache;
pub mod disk;
pub mod memory;
pub mod page;

pub use disk::DiskNodeStore;
pub use memory::MemoryNodeStore;

use serde::{Deserialize, Serialize};

use crate::envelope::Envelope;
use crate::error::SpatialResult;

/// Opaque handle to a tree node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u64);

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "node:{}", self.0)
    }
}

/// Opaque handle to a domain record referenced by a leaf.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RecordId(pub u64);

impl std::fmt::Display for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "record:{}", self.0)
    }
}

/// Per-tree metadata record: the root handle, the branching factor, and the
/// cached total record count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeMetadata {
    pub root: Option<NodeId>,
    pub max_node_references: u32,
    pub total_count: u64,
}

/// Abstraction over persisted tree nodes and their links.
///
/// Two structurally distinct link kinds exist: *child* links (internal node
/// to tree node) and *reference* links (leaf node to domain record). A node
/// with no outgoing child links is a leaf. Records carry a canonical flat
/// numeric payload, converted once when the record is written; decoders read
/// it back via [`NodeStore::record_data`].
///
/// Handle errors: unknown record handles fail with
/// [`SpatialError::NotFound`]; unknown node handles fail with
/// [`SpatialError::CorruptTree`], since a dangling node handle means the
/// tree structure itself is damaged.
///
/// [`SpatialError::NotFound`]: crate::SpatialError::NotFound
/// [`SpatialError::CorruptTree`]: crate::SpatialError::CorruptTree
pub trait NodeStore: Send + Sync {
    /// Creates a fresh node with no links and no bounding box.
    fn create_node(&self) -> SpatialResult<NodeId>;

    /// Deletes a node, detaching it from its parent and clearing the parent
    /// link of anything it still points to.
    fn delete_node(&self, node: NodeId) -> SpatialResult<()>;

    /// A node with no outgoing child links is a leaf.
    fn is_leaf(&self, node: NodeId) -> SpatialResult<bool>;

    /// Child nodes, in storage order.
    fn children(&self, node: NodeId) -> SpatialResult<Vec<NodeId>>;

    /// The node's parent, or `None` for a root.
    fn parent(&self, node: NodeId) -> SpatialResult<Option<NodeId>>;

    /// Links `child` under `parent`.
    fn add_child(&self, parent: NodeId, child: NodeId) -> SpatialResult<()>;

    /// Removes the child link between `parent` and `child`.
    fn remove_child(&self, parent: NodeId, child: NodeId) -> SpatialResult<()>;

    /// The node's cached bounding box, if one has been set.
    fn bounding_box(&self, node: NodeId) -> SpatialResult<Option<Envelope>>;

    /// Replaces the node's cached bounding box.
    fn set_bounding_box(&self, node: NodeId, bbox: &Envelope) -> SpatialResult<()>;

    /// Removes the node's cached bounding box.
    fn clear_bounding_box(&self, node: NodeId) -> SpatialResult<()>;

    /// Links a record under a leaf.
    fn add_reference(&self, leaf: NodeId, record: RecordId) -> SpatialResult<()>;

    /// Removes the reference link between a leaf and a record.
    fn remove_reference(&self, leaf: NodeId, record: RecordId) -> SpatialResult<()>;

    /// Records referenced by a leaf, in storage order.
    fn references(&self, leaf: NodeId) -> SpatialResult<Vec<RecordId>>;

    /// The leaf holding the record's incoming reference link, if any.
    fn reference_holder(&self, record: RecordId) -> SpatialResult<Option<NodeId>>;

    /// Stores a record payload and returns its handle.
    fn create_record(&self, data: &[f64]) -> SpatialResult<RecordId>;

    /// Whether the record handle is known to storage at all.
    fn record_exists(&self, record: RecordId) -> SpatialResult<bool>;

    /// The record's canonical flat numeric payload.
    fn record_data(&self, record: RecordId) -> SpatialResult<Vec<f64>>;

    /// Deletes the record and any incoming reference link.
    fn delete_record(&self, record: RecordId) -> SpatialResult<()>;

    /// Reads the tree metadata record, if one has been written.
    fn read_metadata(&self) -> SpatialResult<Option<TreeMetadata>>;

    /// Writes the tree metadata record.
    fn write_metadata(&self, meta: &TreeMetadata) -> SpatialResult<()>;

    /// Removes the tree metadata record.
    fn clear_metadata(&self) -> SpatialResult<()>;
}
