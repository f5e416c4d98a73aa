//! Native HNSW index.
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │              HnswGraph                  │
//! ├─────────────────────────────────────────┤
//! │  nodes: Vec<Node>  (vector + links[l])  │
//! │  entry_point: Option<NodeId>            │
//! │  max_level, rng_state                   │
//! │  params: HnswParams (M, ef, level cap)  │
//! └─────────────────────────────────────────┘
//! ```
//!
//! Level 0 holds every node with up to `2*M` neighbors; higher levels hold a
//! geometrically shrinking subset with up to `M` neighbors each.

mod candidate;
mod graph;
mod node;
mod params;
pub mod persistence;

pub use graph::{GraphStats, HnswGraph, MAX_DIMENSION};
pub use node::{Neighbor, Node, NodeId, ScoredNode};
pub use params::{HnswParams, DEFAULT_SEED, MAX_CONNECTIONS_LIMIT, MAX_EF, MAX_LEVEL_CAP};

#[cfg(test)]
mod graph_tests;
#[cfg(test)]
mod node_tests;
