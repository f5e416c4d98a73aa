//! Graph nodes and their per-level adjacency lists.

use serde::Serialize;

/// Dense node identifier, assigned in insertion order starting at 0.
pub type NodeId = usize;

/// An outgoing edge with the cached internal distance between its endpoints.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    /// Target node.
    pub id: NodeId,
    /// Internal distance from the owning node to `id`.
    pub distance: f32,
}

/// One indexed vector and its adjacency on every level it occupies.
#[derive(Debug, Clone)]
pub struct Node {
    pub(crate) vector: Vec<f32>,
    /// `links[l]` is the neighbor list at level `l`; `links.len() - 1` is the node's top level.
    pub(crate) links: Vec<Vec<Neighbor>>,
}

impl Node {
    /// Creates a node present on levels `0..=level`, with no edges yet.
    pub(crate) fn new(vector: Vec<f32>, level: usize) -> Self {
        Self {
            vector,
            links: vec![Vec::new(); level + 1],
        }
    }

    /// Top level of this node.
    #[must_use]
    pub fn level(&self) -> usize {
        self.links.len() - 1
    }

    /// The node's vector.
    #[must_use]
    pub fn vector(&self) -> &[f32] {
        &self.vector
    }

    /// Neighbors at `level`; empty if the node is not present there.
    #[must_use]
    pub fn neighbors(&self, level: usize) -> &[Neighbor] {
        self.links.get(level).map_or(&[], Vec::as_slice)
    }

    /// Neighbor ids at `level`, in stored order.
    #[must_use]
    pub fn neighbor_ids(&self, level: usize) -> Vec<NodeId> {
        self.neighbors(level).iter().map(|n| n.id).collect()
    }
}

/// A search hit: node id and exposed score.
///
/// The score is the squared distance for Euclidean indexes and the
/// dot-product similarity for inner-product indexes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScoredNode {
    /// Node id (row position in the external passage table).
    pub id: NodeId,
    /// Distance or similarity, depending on the metric.
    pub score: f32,
}
