//! Fixtures shared by the integration tests.

use std::path::Path;
use std::sync::Arc;
use std::sync::Once;

use geotree::{
    ArrayEnvelopeDecoder, DiskNodeStore, MemoryNodeStore, NodeStore, RTreeConfig, RTreeIndex,
    SpatialResult, SplitMode,
};

static INIT_LOGGER: Once = Once::new();

/// Initializes logging once for the whole test binary.
pub fn init_logging() {
    INIT_LOGGER.call_once(|| {
        let _ = env_logger::builder().is_test(true).try_init();
    });
}

/// An index over a fresh in-memory store with a small branching factor, so
/// modest datasets already exercise splitting.
pub fn memory_index(max_node_references: usize) -> SpatialResult<(Arc<dyn NodeStore>, RTreeIndex)> {
    init_logging();
    let store: Arc<dyn NodeStore> = Arc::new(MemoryNodeStore::new());
    let index = build_index(store.clone(), max_node_references)?;
    Ok((store, index))
}

/// An index over a fresh page-file store at the given path.
pub fn disk_index(
    path: &Path,
    max_node_references: usize,
) -> SpatialResult<(Arc<dyn NodeStore>, RTreeIndex)> {
    init_logging();
    let store: Arc<dyn NodeStore> = Arc::new(DiskNodeStore::create(path)?);
    let index = build_index(store.clone(), max_node_references)?;
    Ok((store, index))
}

/// An index adopting whatever tree an existing page file holds.
pub fn reopen_disk_index(path: &Path) -> SpatialResult<(Arc<dyn NodeStore>, RTreeIndex)> {
    init_logging();
    let store: Arc<dyn NodeStore> = Arc::new(DiskNodeStore::open(path)?);
    let index = build_index(store.clone(), 0)?;
    Ok((store, index))
}

fn build_index(store: Arc<dyn NodeStore>, max_node_references: usize) -> SpatialResult<RTreeIndex> {
    let decoder = Arc::new(ArrayEnvelopeDecoder::new(store.clone()));
    // adoption overrides the branching factor with the persisted one
    let config = if max_node_references >= 2 {
        RTreeConfig::new(max_node_references, SplitMode::Quadratic)?
    } else {
        RTreeConfig::default()
    };
    RTreeIndex::new(store, decoder, config)
}

/// Indexes a point record, returning its handle.
pub fn add_point(
    store: &Arc<dyn NodeStore>,
    index: &RTreeIndex,
    x: f64,
    y: f64,
) -> SpatialResult<geotree::RecordId> {
    let record = store.create_record(&[x, y])?;
    index.add(record)?;
    Ok(record)
}

/// Indexes a box record, returning its handle.
pub fn add_box(
    store: &Arc<dyn NodeStore>,
    index: &RTreeIndex,
    min_x: f64,
    min_y: f64,
    max_x: f64,
    max_y: f64,
) -> SpatialResult<geotree::RecordId> {
    let record = store.create_record(&[min_x, min_y, max_x, max_y])?;
    index.add(record)?;
    Ok(record)
}
