//! Search filters: the pruning/matching predicate pair driving traversal.
//!
//! Queries run in two phases. The pruning phase asks
//! [`SearchFilter::needs_to_visit`] whether a subtree's envelope can possibly
//! hold a match; saying no skips the whole subtree, so implementations must
//! only say no when they are certain. The matching phase asks
//! [`SearchFilter::geometry_matches`] for the exact per-record test.

use std::sync::Arc;

use crate::decoder::EnvelopeDecoder;
use crate::envelope::Envelope;
use crate::error::SpatialResult;
use crate::store::RecordId;

/// Outcome of the extended pruning check for a subtree envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterResult {
    /// Every record below this node matches; skip all further checks.
    IncludeAll,
    /// Nothing below this node can match; prune the subtree.
    ExcludeAll,
    /// Keep filtering per node and per record.
    Filter,
}

/// Pruning + matching predicate pair.
///
/// Errors from either method propagate unmodified to the caller; the engine
/// never swallows filter failures.
pub trait SearchFilter: Send + Sync {
    /// Whether a subtree with this envelope needs to be visited. May be
    /// conservative (visiting too much is only a performance cost); must
    /// return `false` only when no descendant can match.
    fn needs_to_visit(&self, envelope: &Envelope) -> SpatialResult<bool>;

    /// Extended pruning check allowing an `IncludeAll` fast path.
    fn needs_to_visit_extended(&self, envelope: &Envelope) -> SpatialResult<FilterResult> {
        Ok(if self.needs_to_visit(envelope)? {
            FilterResult::Filter
        } else {
            FilterResult::ExcludeAll
        })
    }

    /// Exact test for a single record.
    fn geometry_matches(&self, record: RecordId) -> SpatialResult<bool>;
}

/// Matches every record. The root reports `IncludeAll`, so a full scan
/// never decodes an envelope for pruning.
pub struct SearchAll;

impl SearchFilter for SearchAll {
    fn needs_to_visit(&self, _envelope: &Envelope) -> SpatialResult<bool> {
        Ok(true)
    }

    fn needs_to_visit_extended(&self, _envelope: &Envelope) -> SpatialResult<FilterResult> {
        Ok(FilterResult::IncludeAll)
    }

    fn geometry_matches(&self, _record: RecordId) -> SpatialResult<bool> {
        Ok(true)
    }
}

/// Window query: records whose decoded envelope intersects the window.
pub struct SearchIntersectWindow {
    decoder: Arc<dyn EnvelopeDecoder>,
    window: Envelope,
}

impl SearchIntersectWindow {
    pub fn new(decoder: Arc<dyn EnvelopeDecoder>, window: Envelope) -> Self {
        Self { decoder, window }
    }
}

impl SearchFilter for SearchIntersectWindow {
    fn needs_to_visit(&self, envelope: &Envelope) -> SpatialResult<bool> {
        Ok(self.window.intersects(envelope))
    }

    fn needs_to_visit_extended(&self, envelope: &Envelope) -> SpatialResult<FilterResult> {
        // a window covering the whole subtree envelope matches every record
        // below it, no further per-record intersection tests needed
        Ok(if self.window.covers(envelope) {
            FilterResult::IncludeAll
        } else if self.window.intersects(envelope) {
            FilterResult::Filter
        } else {
            FilterResult::ExcludeAll
        })
    }

    fn geometry_matches(&self, record: RecordId) -> SpatialResult<bool> {
        Ok(self.window.intersects(&self.decoder.decode_envelope(record)?))
    }
}

/// Records whose decoded envelope lies entirely within the window. A covered
/// record can sit in a subtree that only partially intersects the window, so
/// pruning still uses intersection.
pub struct SearchCoveredByWindow {
    decoder: Arc<dyn EnvelopeDecoder>,
    window: Envelope,
}

impl SearchCoveredByWindow {
    pub fn new(decoder: Arc<dyn EnvelopeDecoder>, window: Envelope) -> Self {
        Self { decoder, window }
    }
}

impl SearchFilter for SearchCoveredByWindow {
    fn needs_to_visit(&self, envelope: &Envelope) -> SpatialResult<bool> {
        Ok(self.window.intersects(envelope))
    }

    fn geometry_matches(&self, record: RecordId) -> SpatialResult<bool> {
        Ok(self.window.covers(&self.decoder.decode_envelope(record)?))
    }
}

/// Logical AND over any number of filters. Both the pruning and the matching
/// method must pass every sub-filter.
pub struct SearchAnd {
    filters: Vec<Arc<dyn SearchFilter>>,
}

impl SearchAnd {
    pub fn new(filters: Vec<Arc<dyn SearchFilter>>) -> Self {
        Self { filters }
    }
}

impl SearchFilter for SearchAnd {
    fn needs_to_visit(&self, envelope: &Envelope) -> SpatialResult<bool> {
        for filter in &self.filters {
            if !filter.needs_to_visit(envelope)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn needs_to_visit_extended(&self, envelope: &Envelope) -> SpatialResult<FilterResult> {
        let mut result = FilterResult::IncludeAll;
        for filter in &self.filters {
            match filter.needs_to_visit_extended(envelope)? {
                FilterResult::ExcludeAll => return Ok(FilterResult::ExcludeAll),
                FilterResult::Filter => result = FilterResult::Filter,
                FilterResult::IncludeAll => {}
            }
        }
        Ok(result)
    }

    fn geometry_matches(&self, record: RecordId) -> SpatialResult<bool> {
        for filter in &self.filters {
            if !filter.geometry_matches(record)? {
                return Ok(false);
            }
        }
        Ok(true)
    }
}
