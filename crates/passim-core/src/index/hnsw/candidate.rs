//! Heap entries for best-first graph traversal.
//!
//! Distances use `f32::total_cmp`, so NaN cannot corrupt heap order. Ties
//! are broken by node id to keep traversal deterministic.

use super::node::NodeId;
use std::cmp::Ordering;

/// A node paired with its internal distance to the current query.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Candidate {
    pub distance: f32,
    pub id: NodeId,
}

impl Candidate {
    pub(crate) fn new(id: NodeId, distance: f32) -> Self {
        Self { distance, id }
    }
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Candidate {}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        self.distance
            .total_cmp(&other.distance)
            .then_with(|| self.id.cmp(&other.id))
    }
}
