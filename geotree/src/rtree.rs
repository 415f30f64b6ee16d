//! The R-Tree engine: insertion with quadratic/Greene splitting, deletion
//! with empty-node pruning, bulk removal, and lazy filtered search.
//!
//! The tree lives entirely inside a [`NodeStore`]; the engine holds only the
//! root handle, the configuration, and a cached record count. Record
//! envelopes come exclusively from the [`EnvelopeDecoder`]. A single mutex
//! serializes mutating operations; searches read the store directly and may
//! run concurrently with each other, but a search running concurrently with
//! a mutation needs a snapshotting store.
//!
//! Bulk operations (`remove_all`, `clear`) are not crash-safe: interrupting
//! one mid-traversal can leave the stored structure inconsistent.

use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};

use crate::decoder::EnvelopeDecoder;
use crate::envelope::Envelope;
use crate::error::{SpatialError, SpatialResult};
use crate::filter::{FilterResult, SearchFilter};
use crate::listener::Listener;
use crate::monitor::{EmptyMonitor, TreeMonitor};
use crate::store::{NodeId, NodeStore, RecordId, TreeMetadata};

/// Smallest branching factor accepted by reconfiguration.
pub const MIN_MAX_NODE_REFERENCES: usize = 10;
/// Largest branching factor accepted by reconfiguration.
pub const MAX_MAX_NODE_REFERENCES: usize = 1_000_000;
/// Branching factor used when none is given.
pub const DEFAULT_MAX_NODE_REFERENCES: usize = 100;

/// Node split algorithm selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SplitMode {
    /// Seed pair by maximal dead space, then greedy minimal-enlargement
    /// assignment.
    Quadratic,
    /// Sort by the longest dimension and cut at the midpoint.
    Greene,
}

/// Engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RTreeConfig {
    pub max_node_references: usize,
    pub split_mode: SplitMode,
}

impl Default for RTreeConfig {
    fn default() -> Self {
        Self {
            max_node_references: DEFAULT_MAX_NODE_REFERENCES,
            split_mode: SplitMode::Quadratic,
        }
    }
}

impl RTreeConfig {
    /// Any branching factor >= 2 is accepted at construction; the stricter
    /// bounds apply only when reconfiguring a live index.
    pub fn new(max_node_references: usize, split_mode: SplitMode) -> SpatialResult<Self> {
        if max_node_references < 2 {
            return Err(SpatialError::InvalidConfiguration(format!(
                "max_node_references must be at least 2, got {}",
                max_node_references
            )));
        }
        Ok(Self {
            max_node_references,
            split_mode,
        })
    }
}

/// A tree node paired with its envelope, the working unit of the split
/// algorithms and subtree selection.
struct EntryWithEnvelope {
    entry: ChildEntry,
    envelope: Envelope,
}

/// Something a node can point at: another tree node (child link) or a
/// domain record (reference link).
#[derive(Clone, Copy)]
enum ChildEntry {
    Node(NodeId),
    Record(RecordId),
}

/// Which link kind a bounding-box recomputation should read.
#[derive(Clone, Copy, PartialEq)]
enum LinkKind {
    Children,
    References,
}

/// Callback-driven pruning traversal over the whole index.
///
/// Used by maintenance operations (cache warming, recounting, bulk
/// removal); queries go through [`RTreeIndex::search`] instead.
pub trait SpatialIndexVisitor {
    /// Whether the subtree under an index node with this envelope needs a
    /// visit. An unset envelope is passed as the invalid envelope.
    fn needs_to_visit(&self, envelope: &Envelope) -> bool;

    /// Called once per leaf reference.
    fn on_index_reference(&mut self, record: RecordId) -> SpatialResult<()>;
}

struct CountState {
    total: u64,
    saved: bool,
}

struct RTreeIndexInner {
    store: Arc<dyn NodeStore>,
    decoder: Arc<dyn EnvelopeDecoder>,
    monitor: RwLock<Arc<dyn TreeMonitor>>,
    config: RwLock<RTreeConfig>,
    root: RwLock<Option<NodeId>>,
    count: RwLock<CountState>,
    /// Serializes all mutating operations.
    write_lock: Mutex<()>,
}

/// A persistent R-Tree over a [`NodeStore`].
///
/// Cheap to clone; clones share the same tree. Construction adopts the tree
/// already present in the store (root handle, branching factor, and cached
/// count from its metadata record) or initializes a fresh empty one.
///
/// ```rust
/// use std::sync::Arc;
/// use geotree::{ArrayEnvelopeDecoder, MemoryNodeStore, NodeStore, RTreeConfig, RTreeIndex, SearchAll};
///
/// # fn main() -> geotree::SpatialResult<()> {
/// let store = Arc::new(MemoryNodeStore::new());
/// let decoder = Arc::new(ArrayEnvelopeDecoder::new(store.clone()));
/// let index = RTreeIndex::new(store.clone(), decoder, RTreeConfig::default())?;
///
/// let record = store.create_record(&[12.0, 56.0])?;
/// index.add(record)?;
///
/// let found: Vec<_> = index.search(Arc::new(SearchAll)).collect::<Result<_, _>>()?;
/// assert_eq!(found, vec![record]);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct RTreeIndex {
    inner: Arc<RTreeIndexInner>,
}

impl RTreeIndex {
    pub fn new(
        store: Arc<dyn NodeStore>,
        decoder: Arc<dyn EnvelopeDecoder>,
        mut config: RTreeConfig,
    ) -> SpatialResult<RTreeIndex> {
        if config.max_node_references < 2 {
            return Err(SpatialError::InvalidConfiguration(format!(
                "max_node_references must be at least 2, got {}",
                config.max_node_references
            )));
        }

        let (root, total, saved) = match store.read_metadata()? {
            Some(meta) => {
                config.max_node_references = meta.max_node_references as usize;
                match meta.root {
                    Some(root) => (root, meta.total_count, true),
                    None => {
                        let root = store.create_node()?;
                        store.write_metadata(&TreeMetadata {
                            root: Some(root),
                            ..meta
                        })?;
                        (root, meta.total_count, true)
                    }
                }
            }
            None => {
                let root = store.create_node()?;
                store.write_metadata(&TreeMetadata {
                    root: Some(root),
                    max_node_references: config.max_node_references as u32,
                    total_count: 0,
                })?;
                (root, 0, true)
            }
        };

        Ok(RTreeIndex {
            inner: Arc::new(RTreeIndexInner {
                store,
                decoder,
                monitor: RwLock::new(Arc::new(EmptyMonitor)),
                config: RwLock::new(config),
                root: RwLock::new(Some(root)),
                count: RwLock::new(CountState { total, saved }),
                write_lock: Mutex::new(()),
            }),
        })
    }

    /// Installs a diagnostic monitor, replacing the previous one.
    pub fn add_monitor(&self, monitor: Arc<dyn TreeMonitor>) {
        *self.inner.monitor.write() = monitor;
    }

    /// The decoder this index reads record envelopes through.
    pub fn envelope_decoder(&self) -> Arc<dyn EnvelopeDecoder> {
        self.inner.decoder.clone()
    }

    /// Current configuration snapshot.
    pub fn config(&self) -> RTreeConfig {
        self.inner.config.read().clone()
    }

    /// Changes the branching factor of a live index, within
    /// [`MIN_MAX_NODE_REFERENCES`]..=[`MAX_MAX_NODE_REFERENCES`]. Existing
    /// nodes are not re-split; the new bound applies from the next insert.
    pub fn set_max_node_references(&self, value: usize) -> SpatialResult<()> {
        if value < MIN_MAX_NODE_REFERENCES {
            return Err(SpatialError::InvalidConfiguration(format!(
                "max_node_references below minimum {}: {}",
                MIN_MAX_NODE_REFERENCES, value
            )));
        }
        if value > MAX_MAX_NODE_REFERENCES {
            return Err(SpatialError::InvalidConfiguration(format!(
                "max_node_references above maximum {}: {}",
                MAX_MAX_NODE_REFERENCES, value
            )));
        }
        let _guard = self.inner.write_lock.lock();
        self.inner.config.write().max_node_references = value;
        self.save_metadata()
    }

    /// Switches the split algorithm used by subsequent inserts.
    pub fn set_split_mode(&self, mode: SplitMode) {
        self.inner.config.write().split_mode = mode;
    }

    /// Indexes a record. The record must decode to a valid envelope; an
    /// undecodable record fails fast with no mutation.
    pub fn add(&self, record: RecordId) -> SpatialResult<()> {
        let _guard = self.inner.write_lock.lock();
        let envelope = self.inner.decoder.decode_envelope(record)?;
        if !envelope.is_valid() {
            return Err(SpatialError::InvalidEnvelope(format!(
                "record {} decodes to an invalid envelope",
                record
            )));
        }

        let root = self.root()?;
        self.add_below(root, record, &envelope)?;

        let mut count = self.inner.count.write();
        count.total += 1;
        count.saved = false;
        Ok(())
    }

    /// Unindexes a record.
    ///
    /// `delete_record` also removes the record itself from storage.
    /// `throw_if_not_found` selects between failing and a silent no-op when
    /// the record is unknown ([`SpatialError::NotFound`]) or not linked into
    /// this tree ([`SpatialError::NotIndexed`]).
    ///
    /// Deletion never rebalances: emptied nodes are pruned, but a sparsely
    /// populated subtree is left as is, so heavy delete churn degrades the
    /// tree shape rather than the results.
    pub fn remove(
        &self,
        record: RecordId,
        delete_record: bool,
        throw_if_not_found: bool,
    ) -> SpatialResult<()> {
        let _guard = self.inner.write_lock.lock();

        if !self.inner.store.record_exists(record)? {
            if throw_if_not_found {
                return Err(SpatialError::NotFound(format!(
                    "{} is unknown to storage",
                    record
                )));
            }
            return Ok(());
        }

        let leaf = match self.inner.store.reference_holder(record)? {
            Some(leaf) => leaf,
            None => {
                if throw_if_not_found {
                    return Err(SpatialError::NotIndexed(format!(
                        "{} is not referenced by any index node",
                        record
                    )));
                }
                return Ok(());
            }
        };

        // the reference might belong to a tree other than this one
        if !self.is_node_in_this_tree(leaf)? {
            if throw_if_not_found {
                return Err(SpatialError::NotIndexed(format!(
                    "{} is indexed in a different tree",
                    record
                )));
            }
            return Ok(());
        }

        self.inner.store.remove_reference(leaf, record)?;
        if delete_record {
            self.inner.store.delete_record(record)?;
        }

        let node = if self.inner.store.references(leaf)?.is_empty() {
            let surviving = self.delete_empty_tree_nodes(leaf)?;
            self.adjust_node_bounding_box(surviving, LinkKind::Children)?;
            surviving
        } else {
            self.adjust_node_bounding_box(leaf, LinkKind::References)?;
            leaf
        };
        self.adjust_path_bounding_box(node)?;

        let mut count = self.inner.count.write();
        count.total = count.total.saturating_sub(1);
        count.saved = false;
        Ok(())
    }

    /// Unindexes every record, then deletes the whole tree structure and its
    /// metadata. The listener sees one unit of work per record. The index is
    /// unusable afterwards until [`RTreeIndex::clear`] re-initializes it.
    pub fn remove_all(&self, delete_records: bool, listener: &dyn Listener) -> SpatialResult<()> {
        let _guard = self.inner.write_lock.lock();
        self.remove_all_locked(delete_records, listener)
    }

    fn remove_all_locked(
        &self,
        delete_records: bool,
        listener: &dyn Listener,
    ) -> SpatialResult<()> {
        let root = self.root()?;
        self.detach_records(delete_records, root, listener)?;

        self.delete_subtree(root)?;
        *self.inner.root.write() = None;
        self.inner.store.clear_metadata()?;

        let mut count = self.inner.count.write();
        count.total = 0;
        count.saved = false;
        Ok(())
    }

    /// Empties the index and re-initializes a fresh empty root, leaving it
    /// ready for use. Records themselves are kept.
    pub fn clear(&self, listener: &dyn Listener) -> SpatialResult<()> {
        let _guard = self.inner.write_lock.lock();
        self.remove_all_locked(false, listener)?;

        let root = self.inner.store.create_node()?;
        *self.inner.root.write() = Some(root);
        {
            let mut count = self.inner.count.write();
            count.total = 0;
            count.saved = true;
        }
        self.save_metadata()
    }

    /// Number of indexed records. The cached total is recomputed by a full
    /// traversal exactly once if it is in the unknown (zero) state, and
    /// persisted to the metadata record when it has drifted.
    pub fn count(&self) -> SpatialResult<u64> {
        let _guard = self.inner.write_lock.lock();
        self.count_locked()
    }

    fn count_locked(&self) -> SpatialResult<u64> {
        let needs_recount = self.inner.count.read().total == 0;
        if needs_recount {
            let mut counter = RecordCounter { total: 0 };
            self.visit(&mut counter)?;

            let persisted = self
                .inner
                .store
                .read_metadata()?
                .map(|meta| meta.total_count)
                .unwrap_or(0);

            let mut count = self.inner.count.write();
            count.total = counter.total;
            count.saved = persisted == counter.total;
        }

        let (total, saved) = {
            let count = self.inner.count.read();
            (count.total, count.saved)
        };
        if !saved {
            self.save_metadata()?;
        }
        Ok(total)
    }

    /// True iff the tree holds no records; an empty root has no cached
    /// bounding box.
    pub fn is_empty(&self) -> SpatialResult<bool> {
        let root = self.root()?;
        Ok(self.inner.store.bounding_box(root)?.is_none())
    }

    /// The root's cached envelope; the invalid envelope when the tree is
    /// empty.
    pub fn get_bounding_box(&self) -> SpatialResult<Envelope> {
        let root = self.root()?;
        Ok(self
            .inner
            .store
            .bounding_box(root)?
            .unwrap_or_else(Envelope::empty))
    }

    /// Touches every node and reference once. No logical effect; a cache
    /// priming hint for stores that load lazily.
    pub fn warm_up(&self) -> SpatialResult<()> {
        let mut visitor = WarmUpVisitor;
        self.visit(&mut visitor)
    }

    /// Tree height counted in levels from the root down to the leaves;
    /// an empty tree has height 1.
    pub fn height(&self) -> SpatialResult<usize> {
        let mut node = self.root()?;
        let mut height = 1;
        loop {
            let children = self.inner.store.children(node)?;
            match children.first() {
                Some(child) => {
                    node = *child;
                    height += 1;
                }
                None => return Ok(height),
            }
        }
    }

    /// Whether the record is linked into this tree.
    pub fn is_record_indexed(&self, record: RecordId) -> SpatialResult<bool> {
        if !self.inner.store.record_exists(record)? {
            return Ok(false);
        }
        match self.inner.store.reference_holder(record)? {
            Some(leaf) => self.is_node_in_this_tree(leaf),
            None => Ok(false),
        }
    }

    /// Runs a pruning depth-first search, yielding matching records lazily.
    ///
    /// The returned sequence is single-pass and non-restartable, and the
    /// traversal order is storage order - callers must not rely on result
    /// ordering. Filter and store errors surface as `Err` items and end the
    /// iteration.
    pub fn search(&self, filter: Arc<dyn SearchFilter>) -> SearchResults {
        let root = *self.inner.root.read();
        SearchResults {
            store: self.inner.store.clone(),
            filter,
            monitor: self.inner.monitor.read().clone(),
            stack: match root {
                Some(root) => vec![(root, FilterResult::Filter, 0)],
                None => Vec::new(),
            },
            pending: Vec::new(),
            finished: root.is_none(),
        }
    }

    /// Pruning traversal over the whole index, driving a visitor.
    pub fn visit(&self, visitor: &mut dyn SpatialIndexVisitor) -> SpatialResult<()> {
        let root = self.root()?;
        self.visit_node(visitor, root)
    }

    fn visit_node(
        &self,
        visitor: &mut dyn SpatialIndexVisitor,
        node: NodeId,
    ) -> SpatialResult<()> {
        let envelope = self
            .inner
            .store
            .bounding_box(node)?
            .unwrap_or_else(Envelope::empty);
        if !visitor.needs_to_visit(&envelope) {
            return Ok(());
        }

        let children = self.inner.store.children(node)?;
        if children.is_empty() {
            for record in self.inner.store.references(node)? {
                visitor.on_index_reference(record)?;
            }
        } else {
            for child in children {
                self.visit_node(visitor, child)?;
            }
        }
        Ok(())
    }

    // Private methods

    fn root(&self) -> SpatialResult<NodeId> {
        (*self.inner.root.read())
            .ok_or_else(|| SpatialError::CorruptTree("index root missing".to_string()))
    }

    fn max_node_references(&self) -> usize {
        self.inner.config.read().max_node_references
    }

    fn save_metadata(&self) -> SpatialResult<()> {
        let meta = TreeMetadata {
            root: *self.inner.root.read(),
            max_node_references: self.max_node_references() as u32,
            total_count: self.inner.count.read().total,
        };
        self.inner.store.write_metadata(&meta)?;
        self.inner.count.write().saved = true;
        Ok(())
    }

    fn node_envelope(&self, node: NodeId) -> SpatialResult<Envelope> {
        self.inner.store.bounding_box(node)?.ok_or_else(|| {
            SpatialError::CorruptTree(format!("{} has no cached bounding box", node))
        })
    }

    /// Inserts a record somewhere below the given node, splitting and
    /// adjusting envelopes on the way back up.
    fn add_below(&self, mut parent: NodeId, record: RecordId, envelope: &Envelope) -> SpatialResult<()> {
        // choose a path down to a leaf
        while !self.inner.store.is_leaf(parent)? {
            parent = self.choose_subtree(parent, envelope)?;
        }

        if self.inner.store.references(parent)?.len() >= self.max_node_references() {
            self.insert_in_leaf(parent, record, envelope)?;
            self.split_and_adjust(parent)
        } else if self.insert_in_leaf(parent, record, envelope)? {
            self.adjust_path_bounding_box(parent)
        } else {
            Ok(())
        }
    }

    /// Links the record into the leaf. Returns whether the leaf's envelope
    /// grew, so callers know to propagate upward.
    fn insert_in_leaf(
        &self,
        leaf: NodeId,
        record: RecordId,
        envelope: &Envelope,
    ) -> SpatialResult<bool> {
        self.inner.store.add_reference(leaf, record)?;
        self.expand_node_bbox(leaf, envelope)
    }

    /// Among the node's children, prefer one that already covers the new
    /// envelope (smallest area on ties); otherwise take the child needing
    /// the least area enlargement, again breaking ties by smallest area.
    fn choose_subtree(&self, parent: NodeId, envelope: &Envelope) -> SpatialResult<NodeId> {
        let children = self.inner.store.children(parent)?;
        let mut candidates: Vec<(NodeId, Envelope)> = Vec::with_capacity(children.len());
        for child in children {
            let child_env = self.node_envelope(child)?;
            candidates.push((child, child_env));
        }

        let mut covering: Vec<&(NodeId, Envelope)> = candidates
            .iter()
            .filter(|(_, env)| env.covers(envelope))
            .collect();
        if !covering.is_empty() {
            covering.sort_by(|a, b| {
                a.1.area()
                    .partial_cmp(&b.1.area())
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
            return Ok(covering[0].0);
        }

        let mut best: Option<(NodeId, f64, f64)> = None;
        for (child, env) in &candidates {
            let enlargement = env.union(envelope).area() - env.area();
            let area = env.area();
            let better = match best {
                None => true,
                Some((_, best_enlargement, best_area)) => {
                    enlargement < best_enlargement
                        || (enlargement == best_enlargement && area < best_area)
                }
            };
            if better {
                best = Some((*child, enlargement, area));
            }
        }

        best.map(|(child, _, _)| child).ok_or_else(|| {
            SpatialError::CorruptTree(format!("{} has no child to descend into", parent))
        })
    }

    /// Splits an overflowing node and links the new sibling into the parent,
    /// creating a new root when the split node was the root. Splits cascade
    /// upward as long as parents overflow.
    fn split_and_adjust(&self, node: NodeId) -> SpatialResult<()> {
        let split_mode = self.inner.config.read().split_mode;
        let new_node = match split_mode {
            SplitMode::Quadratic => self.quadratic_split(node)?,
            SplitMode::Greene => self.greene_split(node)?,
        };

        match self.inner.store.parent(node)? {
            None => self.create_new_root(node, new_node)?,
            Some(parent) => {
                let node_env = self.node_envelope(node)?;
                self.expand_node_bbox(parent, &node_env)?;

                let sibling_env = self.node_envelope(new_node)?;
                self.inner.store.add_child(parent, new_node)?;
                self.expand_node_bbox(parent, &sibling_env)?;

                if self.inner.store.children(parent)?.len() > self.max_node_references() {
                    self.split_and_adjust(parent)?;
                } else {
                    self.adjust_path_bounding_box(parent)?;
                }
            }
        }
        self.inner.monitor.read().add_split(new_node);
        Ok(())
    }

    /// Classic quadratic split: seed the two groups with the pair wasting
    /// the most dead space, then repeatedly assign the entry with the single
    /// cheapest enlargement to its cheaper group.
    fn quadratic_split(&self, node: NodeId) -> SpatialResult<NodeId> {
        let mut entries = self.detach_entries(node)?;

        let (seed1, seed2) = most_distant_by_dead_space(&entries);
        // remove the higher index first so the lower stays valid
        let (first, second) = if seed1 > seed2 {
            (seed1, seed2)
        } else {
            (seed2, seed1)
        };
        let seed_a = entries.remove(first);
        let seed_b = entries.remove(second);

        let mut group1_env = seed_a.envelope.clone();
        let mut group2_env = seed_b.envelope.clone();
        let mut group1 = vec![seed_a];
        let mut group2 = vec![seed_b];

        while !entries.is_empty() {
            let mut best: Option<(usize, bool)> = None;
            let mut expansion_min = f64::INFINITY;

            for (i, e) in entries.iter().enumerate() {
                let expansion1 = group1_env.union(&e.envelope).area() - group1_env.area();
                let expansion2 = group2_env.union(&e.envelope).area() - group2_env.area();

                if expansion1 < expansion2 && expansion1 < expansion_min {
                    best = Some((i, true));
                    expansion_min = expansion1;
                } else if expansion2 < expansion1 && expansion2 < expansion_min {
                    best = Some((i, false));
                    expansion_min = expansion2;
                } else if expansion1 == expansion2 && expansion1 < expansion_min {
                    // equal cost either way: favor the smaller group envelope
                    best = Some((i, group1_env.area() < group2_env.area()));
                    expansion_min = expansion1;
                }
            }

            let (index, to_group1) = best.ok_or_else(|| {
                SpatialError::CorruptTree(
                    "quadratic split failed to select a best entry".to_string(),
                )
            })?;
            let entry = entries.remove(index);
            if to_group1 {
                group1_env.expand_to_include(&entry.envelope);
                group1.push(entry);
            } else {
                group2_env.expand_to_include(&entry.envelope);
                group2.push(entry);
            }
        }

        self.reconnect_two_groups(node, group1, group2)
    }

    /// Greene's split: order by the longest dimension of the combined
    /// envelope and cut the sorted list in half.
    fn greene_split(&self, node: NodeId) -> SpatialResult<NodeId> {
        let mut entries = self.detach_entries(node)?;

        let longest = find_longest_dimension(&entries);
        entries.sort_by(|a, b| {
            a.envelope
                .centre(longest)
                .partial_cmp(&b.envelope.centre(longest))
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let split_at = entries.len() / 2;
        let right = entries.split_off(split_at);
        self.reconnect_two_groups(node, entries, right)
    }

    /// Disconnects all of the node's entries, pairing each with its
    /// envelope: decoded envelopes for leaf references, cached envelopes for
    /// child nodes.
    fn detach_entries(&self, node: NodeId) -> SpatialResult<Vec<EntryWithEnvelope>> {
        let mut entries = Vec::new();
        if self.inner.store.is_leaf(node)? {
            for record in self.inner.store.references(node)? {
                let envelope = self.inner.decoder.decode_envelope(record)?;
                self.inner.store.remove_reference(node, record)?;
                entries.push(EntryWithEnvelope {
                    entry: ChildEntry::Record(record),
                    envelope,
                });
            }
        } else {
            for child in self.inner.store.children(node)? {
                let envelope = self.node_envelope(child)?;
                self.inner.store.remove_child(node, child)?;
                entries.push(EntryWithEnvelope {
                    entry: ChildEntry::Node(child),
                    envelope,
                });
            }
        }
        Ok(entries)
    }

    /// The split node keeps group 1 (with a rebuilt envelope); a fresh
    /// sibling receives group 2 and is returned for the caller to link in.
    fn reconnect_two_groups(
        &self,
        node: NodeId,
        group1: Vec<EntryWithEnvelope>,
        group2: Vec<EntryWithEnvelope>,
    ) -> SpatialResult<NodeId> {
        self.inner.store.clear_bounding_box(node)?;
        for entry in &group1 {
            self.attach_entry(node, entry)?;
        }

        let new_node = self.inner.store.create_node()?;
        for entry in &group2 {
            self.attach_entry(new_node, entry)?;
        }
        Ok(new_node)
    }

    fn attach_entry(&self, node: NodeId, entry: &EntryWithEnvelope) -> SpatialResult<bool> {
        match entry.entry {
            ChildEntry::Node(child) => self.inner.store.add_child(node, child)?,
            ChildEntry::Record(record) => self.inner.store.add_reference(node, record)?,
        }
        self.expand_node_bbox(node, &entry.envelope)
    }

    fn create_new_root(&self, old_root: NodeId, sibling: NodeId) -> SpatialResult<()> {
        let new_root = self.inner.store.create_node()?;

        let old_env = self.node_envelope(old_root)?;
        self.inner.store.add_child(new_root, old_root)?;
        self.expand_node_bbox(new_root, &old_env)?;

        let sibling_env = self.node_envelope(sibling)?;
        self.inner.store.add_child(new_root, sibling)?;
        self.expand_node_bbox(new_root, &sibling_env)?;

        *self.inner.root.write() = Some(new_root);
        self.save_metadata()
    }

    /// Grows the node's cached envelope to include `envelope`. Returns
    /// whether anything changed.
    fn expand_node_bbox(&self, node: NodeId, envelope: &Envelope) -> SpatialResult<bool> {
        match self.inner.store.bounding_box(node)? {
            None => {
                self.inner.store.set_bounding_box(node, envelope)?;
                Ok(true)
            }
            Some(current) => {
                let expanded = current.union(envelope);
                if expanded != current {
                    self.inner.store.set_bounding_box(node, &expanded)?;
                    Ok(true)
                } else {
                    Ok(false)
                }
            }
        }
    }

    /// Walks up from the node, re-deriving each ancestor's envelope from its
    /// children, stopping as soon as an ancestor is unchanged.
    fn adjust_path_bounding_box(&self, node: NodeId) -> SpatialResult<()> {
        if let Some(parent) = self.inner.store.parent(node)? {
            if self.adjust_node_bounding_box(parent, LinkKind::Children)? {
                self.adjust_path_bounding_box(parent)?;
            }
        }
        Ok(())
    }

    /// Recomputes a node's envelope as the union over one link kind. A node
    /// left with no members loses its envelope entirely, which is the
    /// empty-tree state when it is the root. Returns whether the stored
    /// envelope changed.
    fn adjust_node_bounding_box(&self, node: NodeId, kind: LinkKind) -> SpatialResult<bool> {
        let old = self.inner.store.bounding_box(node)?;

        let mut bbox = Envelope::empty();
        match kind {
            LinkKind::Children => {
                for child in self.inner.store.children(node)? {
                    bbox.expand_to_include(&self.node_envelope(child)?);
                }
            }
            LinkKind::References => {
                for record in self.inner.store.references(node)? {
                    bbox.expand_to_include(&self.inner.decoder.decode_envelope(record)?);
                }
            }
        }

        if !bbox.is_valid() {
            if old.is_some() {
                self.inner.store.clear_bounding_box(node)?;
                return Ok(true);
            }
            return Ok(false);
        }

        if old.as_ref() != Some(&bbox) {
            self.inner.store.set_bounding_box(node, &bbox)?;
            return Ok(true);
        }
        Ok(false)
    }

    /// Deletes the node and its now-empty ancestors, stopping at the first
    /// ancestor that still has members or at the root (which is never
    /// deleted here). Returns the deepest surviving node.
    fn delete_empty_tree_nodes(&self, mut node: NodeId) -> SpatialResult<NodeId> {
        loop {
            let empty = self.inner.store.children(node)?.is_empty()
                && self.inner.store.references(node)?.is_empty();
            if !empty {
                return Ok(node);
            }
            match self.inner.store.parent(node)? {
                Some(parent) => {
                    self.inner.store.delete_node(node)?;
                    node = parent;
                }
                None => return Ok(node), // root
            }
        }
    }

    /// Whether walking the node's parent chain ends at this tree's root.
    fn is_node_in_this_tree(&self, node: NodeId) -> SpatialResult<bool> {
        let mut current = node;
        while let Some(parent) = self.inner.store.parent(current)? {
            current = parent;
        }
        Ok(current == self.root()?)
    }

    /// Deletes every reference in the tree, reporting progress, without
    /// touching the node structure.
    fn detach_records(
        &self,
        delete_records: bool,
        root: NodeId,
        listener: &dyn Listener,
    ) -> SpatialResult<()> {
        listener.begin(self.count_locked()?);
        let mut detacher = RecordDetacher {
            store: self.inner.store.as_ref(),
            delete_records,
            listener,
        };
        let result = self.visit_node(&mut detacher, root);
        listener.done();
        result
    }

    /// Deletes a whole subtree, children first.
    fn delete_subtree(&self, node: NodeId) -> SpatialResult<()> {
        for child in self.inner.store.children(node)? {
            self.delete_subtree(child)?;
        }
        let leftover = self.inner.store.references(node)?;
        if !leftover.is_empty() {
            log::warn!(
                "{} still holds {} references while its subtree is deleted",
                node,
                leftover.len()
            );
        }
        self.inner.store.delete_node(node)
    }
}

struct WarmUpVisitor;

impl SpatialIndexVisitor for WarmUpVisitor {
    fn needs_to_visit(&self, _envelope: &Envelope) -> bool {
        true
    }

    fn on_index_reference(&mut self, _record: RecordId) -> SpatialResult<()> {
        Ok(())
    }
}

struct RecordCounter {
    total: u64,
}

impl SpatialIndexVisitor for RecordCounter {
    fn needs_to_visit(&self, _envelope: &Envelope) -> bool {
        true
    }

    fn on_index_reference(&mut self, _record: RecordId) -> SpatialResult<()> {
        self.total += 1;
        Ok(())
    }
}

struct RecordDetacher<'a> {
    store: &'a dyn NodeStore,
    delete_records: bool,
    listener: &'a dyn Listener,
}

impl SpatialIndexVisitor for RecordDetacher<'_> {
    fn needs_to_visit(&self, _envelope: &Envelope) -> bool {
        true
    }

    fn on_index_reference(&mut self, record: RecordId) -> SpatialResult<()> {
        if let Some(leaf) = self.store.reference_holder(record)? {
            self.store.remove_reference(leaf, record)?;
        }
        if self.delete_records {
            self.store.delete_record(record)?;
        }
        self.listener.worked(1);
        Ok(())
    }
}

/// Lazy result sequence of a filtered search.
///
/// Single-pass and non-restartable; yields records in traversal (storage)
/// order. The first error ends the sequence.
pub struct SearchResults {
    store: Arc<dyn NodeStore>,
    filter: Arc<dyn SearchFilter>,
    monitor: Arc<dyn TreeMonitor>,
    /// Depth-first stack of nodes with the filter state inherited from
    /// their parents.
    stack: Vec<(NodeId, FilterResult, usize)>,
    /// Leaf references waiting for the exact match test, with the depth
    /// they were found at and whether the subtree was fully included.
    pending: Vec<(RecordId, bool, usize)>,
    finished: bool,
}

impl SearchResults {
    fn step(&mut self) -> SpatialResult<Option<RecordId>> {
        loop {
            while let Some((record, include_all, level)) = self.pending.pop() {
                if include_all || self.filter.geometry_matches(record)? {
                    self.monitor.set_height(level);
                    return Ok(Some(record));
                }
            }

            let (node, inherited, level) = match self.stack.pop() {
                Some(frame) => frame,
                None => return Ok(None),
            };

            let state = if inherited == FilterResult::IncludeAll {
                FilterResult::IncludeAll
            } else {
                match self.store.bounding_box(node)? {
                    Some(envelope) => self.filter.needs_to_visit_extended(&envelope)?,
                    // a node without an envelope holds nothing
                    None => FilterResult::ExcludeAll,
                }
            };
            if state == FilterResult::ExcludeAll {
                continue;
            }
            self.monitor.matched_tree_node(level, node);

            let children = self.store.children(node)?;
            if children.is_empty() {
                let include_all = state == FilterResult::IncludeAll;
                for record in self.store.references(node)? {
                    self.pending.push((record, include_all, level + 1));
                }
            } else {
                // reversed so the first child stored is the first visited
                for child in children.into_iter().rev() {
                    self.stack.push((child, state, level + 1));
                }
            }
        }
    }
}

impl Iterator for SearchResults {
    type Item = SpatialResult<RecordId>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        match self.step() {
            Ok(Some(record)) => Some(Ok(record)),
            Ok(None) => {
                self.finished = true;
                None
            }
            Err(e) => {
                self.finished = true;
                Some(Err(e))
            }
        }
    }
}

fn most_distant_by_dead_space(entries: &[EntryWithEnvelope]) -> (usize, usize) {
    let mut seed1 = 0;
    let mut seed2 = 0;
    let mut worst = f64::NEG_INFINITY;
    for i in 0..entries.len() {
        for j in (i + 1)..entries.len() {
            let dead_space = entries[i].envelope.separation(&entries[j].envelope);
            if dead_space > worst {
                worst = dead_space;
                seed1 = i;
                seed2 = j;
            }
        }
    }
    (seed1, seed2)
}

fn find_longest_dimension(entries: &[EntryWithEnvelope]) -> usize {
    let mut combined = Envelope::empty();
    for entry in entries {
        combined.expand_to_include(&entry.envelope);
    }
    let mut longest = 0;
    let mut max_width = f64::NEG_INFINITY;
    for i in 0..combined.dimension() {
        let width = combined.width(i);
        if width > max_width {
            max_width = width;
            longest = i;
        }
    }
    longest
}
