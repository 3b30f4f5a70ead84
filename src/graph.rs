//! Attribute dependency tracking.
//!
//! `DependencyTracker` records which `(holder, attribute)` entries were read
//! while computing other entries, as a directed graph. Invalidation walks
//! this graph downstream so that cached values computed from a changed
//! attribute are dropped too, and nothing else is.
//!
//! Edges are recorded lazily during computation and cleared when an entry is
//! invalidated; a recomputed entry re-records exactly the inputs it actually
//! used.

use crate::expression::AttrId;
use crate::holder::HolderId;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use std::collections::HashMap;

/// One tracked cache entry.
pub type AttrNode = (HolderId, AttrId);

/// Directed graph of attribute dependencies within one fit.
///
/// An edge `src -> dst` means `dst` was computed using the value of `src`,
/// so invalidating `src` must invalidate `dst`.
#[derive(Debug, Default)]
pub struct DependencyTracker {
    graph: DiGraph<AttrNode, ()>,
    node_map: HashMap<AttrNode, NodeIndex>,
}

impl DependencyTracker {
    /// Create an empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    fn node(&mut self, key: AttrNode) -> NodeIndex {
        if let Some(&idx) = self.node_map.get(&key) {
            idx
        } else {
            let idx = self.graph.add_node(key);
            self.node_map.insert(key, idx);
            idx
        }
    }

    /// Record that `dst` was computed using `src`.
    pub fn add_dependency(&mut self, src: AttrNode, dst: AttrNode) {
        if src == dst {
            return;
        }
        let src_idx = self.node(src);
        let dst_idx = self.node(dst);
        self.graph.update_edge(src_idx, dst_idx, ());
    }

    /// Every entry computed, directly or transitively, from `key`.
    ///
    /// `key` itself is not included.
    pub fn dependents_of(&self, key: AttrNode) -> Vec<AttrNode> {
        let Some(&start) = self.node_map.get(&key) else {
            return Vec::new();
        };
        let mut seen = std::collections::HashSet::new();
        let mut stack = vec![start];
        let mut out = Vec::new();
        while let Some(idx) = stack.pop() {
            for neighbor in self.graph.neighbors_directed(idx, Direction::Outgoing) {
                if seen.insert(neighbor) {
                    out.push(self.graph[neighbor]);
                    stack.push(neighbor);
                }
            }
        }
        out
    }

    /// Forget what `key` was computed from. Called when the entry is
    /// invalidated; recomputation records fresh inputs.
    pub fn clear_inputs(&mut self, key: AttrNode) {
        let Some(&idx) = self.node_map.get(&key) else {
            return;
        };
        // `remove_edge` renumbers the last edge into the freed slot, so
        // re-query after every removal instead of batching edge ids.
        while let Some(edge) = self
            .graph
            .edges_directed(idx, Direction::Incoming)
            .map(|edge| edge.id())
            .next()
        {
            self.graph.remove_edge(edge);
        }
    }

    /// Tracked entries belonging to one holder.
    pub fn nodes_of_holder(&self, holder: HolderId) -> Vec<AttrNode> {
        self.node_map
            .keys()
            .filter(|(h, _)| *h == holder)
            .copied()
            .collect()
    }

    /// Drop the holder's entries together with every edge touching them.
    /// Holder ids are never reused, so the nodes are reclaimed rather than
    /// left behind as orphans.
    pub fn remove_holder(&mut self, holder: HolderId) {
        for node in self.nodes_of_holder(holder) {
            self.remove_node(node);
        }
    }

    fn remove_node(&mut self, key: AttrNode) {
        if let Some(idx) = self.node_map.remove(&key) {
            self.graph.remove_node(idx);
            // `remove_node` swaps the last node into the freed slot; re-point
            // its map entry at the new index.
            if let Some(&moved) = self.graph.node_weight(idx) {
                self.node_map.insert(moved, idx);
            }
        }
    }

    /// Number of tracked entries.
    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    /// Whether no entries are tracked.
    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// Drop all recorded dependencies.
    pub fn clear(&mut self) {
        self.graph.clear();
        self.node_map.clear();
    }
}
