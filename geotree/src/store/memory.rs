//! In-memory arena-backed node store.

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::envelope::Envelope;
use crate::error::{SpatialError, SpatialResult};
use crate::store::{NodeId, NodeStore, RecordId, TreeMetadata};

/// A tree node slot in the arena.
#[derive(Debug, Clone, Default)]
struct NodeSlot {
    parent: Option<NodeId>,
    bbox: Option<Envelope>,
    children: Vec<NodeId>,
    references: Vec<RecordId>,
}

/// A stored domain record: its canonical flat payload and the leaf holding
/// its incoming reference link.
#[derive(Debug, Clone)]
struct RecordSlot {
    data: Vec<f64>,
    holder: Option<NodeId>,
}

#[derive(Default)]
struct MemoryNodeStoreInner {
    nodes: Vec<Option<NodeSlot>>,
    free_nodes: Vec<u64>,
    records: HashMap<RecordId, RecordSlot>,
    next_record_id: u64,
    metadata: Option<TreeMetadata>,
}

/// Arena-backed [`NodeStore`]: nodes live in a vector addressed by integer
/// handle, deleted slots are recycled through a free list, and records sit
/// in a hash map keyed by their own id.
///
/// All state is behind a single `RwLock`; readers proceed concurrently and
/// writers serialize against each other and against readers.
#[derive(Default)]
pub struct MemoryNodeStore {
    inner: RwLock<MemoryNodeStoreInner>,
}

impl MemoryNodeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live node slots, free-listed slots excluded.
    pub fn node_count(&self) -> usize {
        let inner = self.inner.read();
        inner.nodes.iter().filter(|slot| slot.is_some()).count()
    }

    /// Number of stored records.
    pub fn record_count(&self) -> usize {
        self.inner.read().records.len()
    }
}

impl MemoryNodeStoreInner {
    fn slot(&self, node: NodeId) -> SpatialResult<&NodeSlot> {
        self.nodes
            .get(node.0 as usize)
            .and_then(|slot| slot.as_ref())
            .ok_or_else(|| SpatialError::CorruptTree(format!("no such node {}", node)))
    }

    fn slot_mut(&mut self, node: NodeId) -> SpatialResult<&mut NodeSlot> {
        self.nodes
            .get_mut(node.0 as usize)
            .and_then(|slot| slot.as_mut())
            .ok_or_else(|| SpatialError::CorruptTree(format!("no such node {}", node)))
    }
}

impl NodeStore for MemoryNodeStore {
    fn create_node(&self) -> SpatialResult<NodeId> {
        let mut inner = self.inner.write();
        let id = match inner.free_nodes.pop() {
            Some(index) => {
                inner.nodes[index as usize] = Some(NodeSlot::default());
                NodeId(index)
            }
            None => {
                inner.nodes.push(Some(NodeSlot::default()));
                NodeId(inner.nodes.len() as u64 - 1)
            }
        };
        Ok(id)
    }

    fn delete_node(&self, node: NodeId) -> SpatialResult<()> {
        let mut inner = self.inner.write();
        let slot = inner.slot(node)?.clone();

        if let Some(parent) = slot.parent {
            let parent_slot = inner.slot_mut(parent)?;
            parent_slot.children.retain(|c| *c != node);
        }
        for child in &slot.children {
            inner.slot_mut(*child)?.parent = None;
        }
        for record in &slot.references {
            if let Some(record_slot) = inner.records.get_mut(record) {
                record_slot.holder = None;
            }
        }

        inner.nodes[node.0 as usize] = None;
        inner.free_nodes.push(node.0);
        Ok(())
    }

    fn is_leaf(&self, node: NodeId) -> SpatialResult<bool> {
        Ok(self.inner.read().slot(node)?.children.is_empty())
    }

    fn children(&self, node: NodeId) -> SpatialResult<Vec<NodeId>> {
        Ok(self.inner.read().slot(node)?.children.clone())
    }

    fn parent(&self, node: NodeId) -> SpatialResult<Option<NodeId>> {
        Ok(self.inner.read().slot(node)?.parent)
    }

    fn add_child(&self, parent: NodeId, child: NodeId) -> SpatialResult<()> {
        let mut inner = self.inner.write();
        inner.slot(parent)?;
        let child_slot = inner.slot_mut(child)?;
        if child_slot.parent.is_some() {
            return Err(SpatialError::CorruptTree(format!(
                "{} already has a parent",
                child
            )));
        }
        child_slot.parent = Some(parent);
        inner.slot_mut(parent)?.children.push(child);
        Ok(())
    }

    fn remove_child(&self, parent: NodeId, child: NodeId) -> SpatialResult<()> {
        let mut inner = self.inner.write();
        let parent_slot = inner.slot_mut(parent)?;
        let before = parent_slot.children.len();
        parent_slot.children.retain(|c| *c != child);
        if parent_slot.children.len() == before {
            return Err(SpatialError::CorruptTree(format!(
                "{} is not a child of {}",
                child, parent
            )));
        }
        inner.slot_mut(child)?.parent = None;
        Ok(())
    }

    fn bounding_box(&self, node: NodeId) -> SpatialResult<Option<Envelope>> {
        Ok(self.inner.read().slot(node)?.bbox.clone())
    }

    fn set_bounding_box(&self, node: NodeId, bbox: &Envelope) -> SpatialResult<()> {
        self.inner.write().slot_mut(node)?.bbox = Some(bbox.clone());
        Ok(())
    }

    fn clear_bounding_box(&self, node: NodeId) -> SpatialResult<()> {
        self.inner.write().slot_mut(node)?.bbox = None;
        Ok(())
    }

    fn add_reference(&self, leaf: NodeId, record: RecordId) -> SpatialResult<()> {
        let mut inner = self.inner.write();
        inner.slot(leaf)?;
        let record_slot = inner
            .records
            .get_mut(&record)
            .ok_or_else(|| SpatialError::NotFound(format!("no such {}", record)))?;
        if record_slot.holder.is_some() {
            return Err(SpatialError::CorruptTree(format!(
                "{} is already referenced",
                record
            )));
        }
        record_slot.holder = Some(leaf);
        inner.slot_mut(leaf)?.references.push(record);
        Ok(())
    }

    fn remove_reference(&self, leaf: NodeId, record: RecordId) -> SpatialResult<()> {
        let mut inner = self.inner.write();
        let leaf_slot = inner.slot_mut(leaf)?;
        let before = leaf_slot.references.len();
        leaf_slot.references.retain(|r| *r != record);
        if leaf_slot.references.len() == before {
            return Err(SpatialError::NotFound(format!(
                "{} holds no reference to {}",
                leaf, record
            )));
        }
        if let Some(record_slot) = inner.records.get_mut(&record) {
            record_slot.holder = None;
        }
        Ok(())
    }

    fn references(&self, leaf: NodeId) -> SpatialResult<Vec<RecordId>> {
        Ok(self.inner.read().slot(leaf)?.references.clone())
    }

    fn reference_holder(&self, record: RecordId) -> SpatialResult<Option<NodeId>> {
        let inner = self.inner.read();
        let record_slot = inner
            .records
            .get(&record)
            .ok_or_else(|| SpatialError::NotFound(format!("no such {}", record)))?;
        Ok(record_slot.holder)
    }

    fn create_record(&self, data: &[f64]) -> SpatialResult<RecordId> {
        let mut inner = self.inner.write();
        let id = RecordId(inner.next_record_id);
        inner.next_record_id += 1;
        inner.records.insert(
            id,
            RecordSlot {
                data: data.to_vec(),
                holder: None,
            },
        );
        Ok(id)
    }

    fn record_exists(&self, record: RecordId) -> SpatialResult<bool> {
        Ok(self.inner.read().records.contains_key(&record))
    }

    fn record_data(&self, record: RecordId) -> SpatialResult<Vec<f64>> {
        let inner = self.inner.read();
        inner
            .records
            .get(&record)
            .map(|slot| slot.data.clone())
            .ok_or_else(|| SpatialError::NotFound(format!("no such {}", record)))
    }

    fn delete_record(&self, record: RecordId) -> SpatialResult<()> {
        let mut inner = self.inner.write();
        let slot = inner
            .records
            .remove(&record)
            .ok_or_else(|| SpatialError::NotFound(format!("no such {}", record)))?;
        if let Some(holder) = slot.holder {
            if let Ok(leaf_slot) = inner.slot_mut(holder) {
                leaf_slot.references.retain(|r| *r != record);
            }
        }
        Ok(())
    }

    fn read_metadata(&self) -> SpatialResult<Option<TreeMetadata>> {
        Ok(self.inner.read().metadata.clone())
    }

    fn write_metadata(&self, meta: &TreeMetadata) -> SpatialResult<()> {
        self.inner.write().metadata = Some(meta.clone());
        Ok(())
    }

    fn clear_metadata(&self) -> SpatialResult<()> {
        self.inner.write().metadata = None;
        Ok(())
    }
}
