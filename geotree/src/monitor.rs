//! Diagnostic hooks for tree structure changes and search traversal.

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::store::NodeId;

/// Hooks fired on structural changes and search traversal.
///
/// Diagnostics and visualization only: no hook affects correctness, and the
/// default [`EmptyMonitor`] ignores everything. State is per instance; there
/// are no process-wide counters.
pub trait TreeMonitor: Send + Sync {
    /// A node was split; `node` is the newly created sibling.
    fn add_split(&self, node: NodeId);

    /// Tally a named case for algorithm-path debugging.
    fn add_case(&self, key: &str);

    /// Tree height observed during an operation.
    fn set_height(&self, height: usize);

    fn height(&self) -> usize;

    /// A search visited this tree node at the given level.
    fn matched_tree_node(&self, level: usize, node: NodeId);

    fn split_count(&self) -> usize;

    fn case_counts(&self) -> HashMap<String, usize>;

    fn matched_tree_nodes(&self, level: usize) -> Vec<NodeId>;

    fn reset(&self);
}

/// Ignores all hooks.
pub struct EmptyMonitor;

impl TreeMonitor for EmptyMonitor {
    fn add_split(&self, _node: NodeId) {}

    fn add_case(&self, _key: &str) {}

    fn set_height(&self, _height: usize) {}

    fn height(&self) -> usize {
        0
    }

    fn matched_tree_node(&self, _level: usize, _node: NodeId) {}

    fn split_count(&self) -> usize {
        0
    }

    fn case_counts(&self) -> HashMap<String, usize> {
        HashMap::new()
    }

    fn matched_tree_nodes(&self, _level: usize) -> Vec<NodeId> {
        Vec::new()
    }

    fn reset(&self) {}
}

/// Counting monitor for tests and visualization.
#[derive(Default)]
pub struct RTreeMonitor {
    state: RwLock<MonitorState>,
}

#[derive(Default)]
struct MonitorState {
    splits: usize,
    height: usize,
    cases: HashMap<String, usize>,
    matched: Vec<Vec<NodeId>>,
}

impl RTreeMonitor {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TreeMonitor for RTreeMonitor {
    fn add_split(&self, _node: NodeId) {
        self.state.write().splits += 1;
    }

    fn add_case(&self, key: &str) {
        *self.state.write().cases.entry(key.to_string()).or_insert(0) += 1;
    }

    fn set_height(&self, height: usize) {
        self.state.write().height = height;
    }

    fn height(&self) -> usize {
        self.state.read().height
    }

    fn matched_tree_node(&self, level: usize, node: NodeId) {
        let mut state = self.state.write();
        while state.matched.len() <= level {
            state.matched.push(Vec::new());
        }
        state.matched[level].push(node);
    }

    fn split_count(&self) -> usize {
        self.state.read().splits
    }

    fn case_counts(&self) -> HashMap<String, usize> {
        self.state.read().cases.clone()
    }

    fn matched_tree_nodes(&self, level: usize) -> Vec<NodeId> {
        self.state
            .read()
            .matched
            .get(level)
            .cloned()
            .unwrap_or_default()
    }

    fn reset(&self) {
        *self.state.write() = MonitorState::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counting_monitor() {
        let monitor = RTreeMonitor::new();
        monitor.add_split(NodeId(1));
        monitor.add_split(NodeId(2));
        monitor.add_case("Index Matches");
        monitor.add_case("Index Matches");
        monitor.add_case("Geometry Matches");
        monitor.set_height(3);
        monitor.matched_tree_node(0, NodeId(1));
        monitor.matched_tree_node(2, NodeId(5));

        assert_eq!(monitor.split_count(), 2);
        assert_eq!(monitor.height(), 3);
        assert_eq!(monitor.case_counts().get("Index Matches"), Some(&2));
        assert_eq!(monitor.matched_tree_nodes(0), vec![NodeId(1)]);
        assert_eq!(monitor.matched_tree_nodes(2), vec![NodeId(5)]);
        assert!(monitor.matched_tree_nodes(1).is_empty());

        monitor.reset();
        assert_eq!(monitor.split_count(), 0);
        assert!(monitor.case_counts().is_empty());
    }

    #[test]
    fn test_empty_monitor_reports_nothing() {
        let monitor = EmptyMonitor;
        monitor.add_split(NodeId(1));
        monitor.set_height(9);
        assert_eq!(monitor.split_count(), 0);
        assert_eq!(monitor.height(), 0);
    }
}
