//! # Geotree - Persistent Graph-Backed Spatial Indexing
//!
//! This crate provides a persistent R-Tree spatial index over geometry-bearing
//! records, with the tree structure held in a pluggable node store.
//!
//! ## Features
//!
//! - **Pluggable Storage**: tree nodes and links live behind the [`NodeStore`]
//!   trait; an in-memory arena and a checksummed page file ship in the box
//! - **Quadratic Split**: maximal-dead-space seeding with greedy
//!   minimal-enlargement assignment (Greene's split available as well)
//! - **Empty-Node Pruning**: deletions cascade structure removal upward and
//!   shrink bounding boxes back down the path
//! - **Lazy Search**: pruning depth-first traversal exposed as a single-use
//!   iterator, driven by a pluggable [`SearchFilter`]
//! - **Capability Seams**: record envelopes come from an [`EnvelopeDecoder`],
//!   progress goes to a [`Listener`], diagnostics to a [`TreeMonitor`]
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use geotree::{
//!     ArrayEnvelopeDecoder, Envelope, MemoryNodeStore, NodeStore, RTreeConfig,
//!     RTreeIndex, SearchIntersectWindow,
//! };
//!
//! # fn main() -> geotree::SpatialResult<()> {
//! let store = Arc::new(MemoryNodeStore::new());
//! let decoder = Arc::new(ArrayEnvelopeDecoder::new(store.clone()));
//! let index = RTreeIndex::new(store.clone(), decoder, RTreeConfig::default())?;
//!
//! // records carry a flat numeric payload: a point or a bounding box
//! let record = store.create_record(&[12.9, 56.0])?;
//! index.add(record)?;
//!
//! // window query over the indexed records
//! let window = Envelope::rect(10.0, 50.0, 20.0, 60.0)?;
//! let filter = Arc::new(SearchIntersectWindow::new(index.envelope_decoder(), window));
//! for found in index.search(filter) {
//!     println!("matched {}", found?);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Persistence
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use geotree::{ArrayEnvelopeDecoder, DiskNodeStore, RTreeConfig, RTreeIndex};
//!
//! # fn main() -> geotree::SpatialResult<()> {
//! let store = Arc::new(DiskNodeStore::open("places.gtree")?);
//! let decoder = Arc::new(ArrayEnvelopeDecoder::new(store.clone()));
//! // adopts the tree persisted in the store
//! let index = RTreeIndex::new(store, decoder, RTreeConfig::default())?;
//! println!("{} records indexed", index.count()?);
//! # Ok(())
//! # }
//! ```

// Core modules
pub mod envelope;
pub mod error;
pub mod store;

// Capability seams
pub mod decoder;
pub mod filter;
pub mod listener;
pub mod monitor;

// The engine
pub mod rtree;

// Re-export core types
pub use envelope::Envelope;
pub use error::{SpatialError, SpatialResult};
pub use store::{
    DiskNodeStore, MemoryNodeStore, NodeId, NodeStore, RecordId, TreeMetadata,
};

// Re-export capability traits and implementations
pub use decoder::{ArrayEnvelopeDecoder, EnvelopeDecoder};
pub use filter::{
    FilterResult, SearchAll, SearchAnd, SearchCoveredByWindow, SearchFilter,
    SearchIntersectWindow,
};
pub use listener::{Listener, NullListener, ProgressLoggingListener};
pub use monitor::{EmptyMonitor, RTreeMonitor, TreeMonitor};

// Re-export the engine
pub use rtree::{
    RTreeConfig, RTreeIndex, SearchResults, SpatialIndexVisitor, SplitMode,
    DEFAULT_MAX_NODE_REFERENCES, MAX_MAX_NODE_REFERENCES, MIN_MAX_NODE_REFERENCES,
};
