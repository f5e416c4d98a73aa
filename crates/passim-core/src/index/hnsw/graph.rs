//! HNSW graph structure, construction and search.
//!
//! Implements the hierarchical navigable small world graph described by
//! Malkov & Yashunin (<https://arxiv.org/abs/1603.09320>).
//!
//! Construction takes `&mut self` and search takes `&self`: the borrow checker
//! gives single-writer construction and any number of concurrent readers on a
//! frozen graph. All traversal state is allocated per call.

use super::candidate::Candidate;
use super::node::{Neighbor, Node, NodeId, ScoredNode};
use super::params::HnswParams;
use crate::distance::DistanceMetric;
use crate::error::{Error, Result};
use rustc_hash::FxHashSet;
use serde::Serialize;
use std::cmp::Reverse;
use std::collections::BinaryHeap;

/// Largest supported vector dimension.
pub const MAX_DIMENSION: usize = 65_536;

/// Native HNSW index.
#[derive(Debug, Clone)]
pub struct HnswGraph {
    pub(super) dimension: usize,
    pub(super) metric: DistanceMetric,
    pub(super) params: HnswParams,
    pub(super) nodes: Vec<Node>,
    /// Entry point for search (first node inserted at `max_level`)
    pub(super) entry_point: Option<NodeId>,
    pub(super) max_level: usize,
    /// xorshift64 state for level selection
    pub(super) rng_state: u64,
}

/// Summary of graph shape.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphStats {
    /// Number of nodes.
    pub nodes: usize,
    /// Vector dimension.
    pub dimension: usize,
    /// Distance metric.
    pub metric: DistanceMetric,
    /// Highest occupied level.
    pub max_level: usize,
    /// Entry point, if any.
    pub entry_point: Option<NodeId>,
    /// `nodes_per_level[l]` counts nodes present on level `l`.
    pub nodes_per_level: Vec<usize>,
    /// Mean neighbor count on level 0.
    pub avg_degree_level0: f64,
}

impl HnswGraph {
    /// Creates an empty graph.
    ///
    /// # Errors
    ///
    /// `InvalidParameter` if the dimension is zero or too large, or the
    /// parameters fail [`HnswParams::validate`].
    pub fn new(dimension: usize, metric: DistanceMetric, params: HnswParams) -> Result<Self> {
        if dimension == 0 || dimension > MAX_DIMENSION {
            return Err(Error::invalid(format!(
                "dimension must be in [1, {MAX_DIMENSION}], got {dimension}"
            )));
        }
        params.validate()?;

        Ok(Self {
            dimension,
            metric,
            params,
            nodes: Vec::new(),
            entry_point: None,
            max_level: 0,
            rng_state: seed_state(params.seed),
        })
    }

    /// Number of indexed vectors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// True if nothing has been inserted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Fixed vector dimension.
    #[must_use]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Distance metric.
    #[must_use]
    pub fn metric(&self) -> DistanceMetric {
        self.metric
    }

    /// Construction and default search parameters.
    #[must_use]
    pub fn params(&self) -> &HnswParams {
        &self.params
    }

    /// Current entry point.
    #[must_use]
    pub fn entry_point(&self) -> Option<NodeId> {
        self.entry_point
    }

    /// Highest occupied level.
    #[must_use]
    pub fn max_level(&self) -> usize {
        self.max_level
    }

    /// Returns a node by id.
    #[must_use]
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    /// Neighbor ids of `id` at `level`, or `None` if the node is absent there.
    #[must_use]
    pub fn neighbors(&self, id: NodeId, level: usize) -> Option<Vec<NodeId>> {
        let node = self.nodes.get(id)?;
        (level <= node.level()).then(|| node.neighbor_ids(level))
    }

    /// Inserts a vector and returns its node id (the next dense id).
    ///
    /// # Errors
    ///
    /// `DimensionMismatch` for a wrong-length vector, `InvalidParameter` for
    /// non-finite components. The graph is unchanged on error.
    pub fn insert(&mut self, vector: &[f32]) -> Result<NodeId> {
        self.check_query(vector)?;
        if self.nodes.len() >= u32::MAX as usize {
            return Err(Error::invalid("graph is full (u32 node ids)"));
        }

        let node_id = self.nodes.len();
        let node_level = self.random_level();
        self.nodes.push(Node::new(vector.to_vec(), node_level));

        let Some(ep) = self.entry_point else {
            // First node becomes the entry point with no neighbors
            self.entry_point = Some(node_id);
            self.max_level = node_level;
            return Ok(node_id);
        };

        let mut current = Candidate::new(ep, self.distance_to(vector, ep));
        for level in (node_level + 1..=self.max_level).rev() {
            current = self.greedy_closest(vector, current, level);
        }

        let mut entry_points = vec![current];
        for level in (0..=node_level.min(self.max_level)).rev() {
            let candidates =
                self.search_layer(vector, &entry_points, self.params.ef_construction, level);
            let capacity = self.params.capacity(level);
            let selected = self.select_neighbors(&candidates, capacity);

            self.nodes[node_id].links[level] = selected
                .iter()
                .map(|c| Neighbor {
                    id: c.id,
                    distance: c.distance,
                })
                .collect();

            for c in &selected {
                self.connect(c.id, node_id, c.distance, level);
            }

            if !candidates.is_empty() {
                entry_points = candidates;
            }
        }

        if node_level > self.max_level {
            self.max_level = node_level;
            self.entry_point = Some(node_id);
        }

        Ok(node_id)
    }

    /// Inserts a vector under an explicit id, which must be the next dense id.
    ///
    /// This enforces the positional coupling between insertion order and the
    /// external passage table.
    pub fn insert_with_id(&mut self, id: NodeId, vector: &[f32]) -> Result<NodeId> {
        if id != self.nodes.len() {
            return Err(Error::invalid(format!(
                "out-of-order node id {id}, expected {}",
                self.nodes.len()
            )));
        }
        self.insert(vector)
    }

    /// Searches for the `k` nearest neighbors, best first.
    ///
    /// `ef_search` below `k` is clamped up to `k`.
    ///
    /// # Errors
    ///
    /// `InvalidParameter` if `k == 0` or the query has non-finite components,
    /// `DimensionMismatch` for a wrong-length query.
    pub fn search(&self, query: &[f32], k: usize, ef_search: usize) -> Result<Vec<ScoredNode>> {
        if k == 0 {
            return Err(Error::invalid("k must be > 0"));
        }
        self.check_query(query)?;

        let Some(ep) = self.entry_point else {
            return Ok(Vec::new());
        };

        let ef = if ef_search < k {
            tracing::debug!(ef_search, k, "ef_search below k, clamping to k");
            k
        } else {
            ef_search
        };

        let mut current = Candidate::new(ep, self.distance_to(query, ep));
        for level in (1..=self.max_level).rev() {
            current = self.greedy_closest(query, current, level);
        }

        let candidates = self.search_layer(query, &[current], ef, 0);
        Ok(self.to_scored(candidates, k))
    }

    /// Searches with the graph's default `ef_search`.
    pub fn search_default(&self, query: &[f32], k: usize) -> Result<Vec<ScoredNode>> {
        self.search(query, k, self.params.ef_search)
    }

    /// Brute-force k-NN over every node, ordered like [`HnswGraph::search`].
    pub fn exact_search(&self, query: &[f32], k: usize) -> Result<Vec<ScoredNode>> {
        if k == 0 {
            return Err(Error::invalid("k must be > 0"));
        }
        self.check_query(query)?;

        let mut all: Vec<Candidate> = self
            .nodes
            .iter()
            .enumerate()
            .map(|(id, node)| Candidate::new(id, self.metric.distance(query, &node.vector)))
            .collect();
        all.sort_unstable();
        Ok(self.to_scored(all, k))
    }

    /// Computes graph shape statistics.
    #[must_use]
    pub fn stats(&self) -> GraphStats {
        let mut nodes_per_level = vec![0usize; if self.is_empty() { 0 } else { self.max_level + 1 }];
        let mut degree_sum = 0usize;
        for node in &self.nodes {
            for count in nodes_per_level.iter_mut().take(node.level() + 1) {
                *count += 1;
            }
            degree_sum += node.neighbors(0).len();
        }

        GraphStats {
            nodes: self.len(),
            dimension: self.dimension,
            metric: self.metric,
            max_level: self.max_level,
            entry_point: self.entry_point,
            nodes_per_level,
            avg_degree_level0: if self.is_empty() {
                0.0
            } else {
                degree_sum as f64 / self.len() as f64
            },
        }
    }

    // =========================================================================
    // Private helper methods
    // =========================================================================

    fn check_query(&self, vector: &[f32]) -> Result<()> {
        if vector.len() != self.dimension {
            return Err(Error::DimensionMismatch {
                expected: self.dimension,
                actual: vector.len(),
            });
        }
        if vector.iter().any(|x| !x.is_finite()) {
            return Err(Error::invalid("vector contains NaN or infinite values"));
        }
        Ok(())
    }

    #[inline]
    fn distance_to(&self, query: &[f32], id: NodeId) -> f32 {
        self.metric.distance(query, &self.nodes[id].vector)
    }

    fn to_scored(&self, candidates: Vec<Candidate>, k: usize) -> Vec<ScoredNode> {
        candidates
            .into_iter()
            .take(k)
            .map(|c| ScoredNode {
                id: c.id,
                score: self.metric.to_score(c.distance),
            })
            .collect()
    }

    fn random_level(&mut self) -> usize {
        let mut state = self.rng_state;
        state ^= state << 13;
        state ^= state >> 7;
        state ^= state << 17;
        self.rng_state = state;

        // state is never zero, so uniform is in (0, 1]
        let uniform = (state as f64) / (u64::MAX as f64);
        let level = (-uniform.ln() * self.params.level_mult()).floor() as usize;
        level.min(self.params.max_level)
    }

    /// Greedy single-best descent on one level.
    fn greedy_closest(&self, query: &[f32], entry: Candidate, level: usize) -> Candidate {
        let mut best = entry;
        loop {
            let mut improved = false;
            for neighbor in self.nodes[best.id].neighbors(level) {
                let dist = self.distance_to(query, neighbor.id);
                if dist < best.distance {
                    best = Candidate::new(neighbor.id, dist);
                    improved = true;
                }
            }
            if !improved {
                return best;
            }
        }
    }

    /// Best-first search on one level with `ef` candidates.
    ///
    /// Returns candidates sorted closest first.
    fn search_layer(
        &self,
        query: &[f32],
        entry_points: &[Candidate],
        ef: usize,
        level: usize,
    ) -> Vec<Candidate> {
        let mut visited: FxHashSet<NodeId> = FxHashSet::default();
        let mut frontier: BinaryHeap<Reverse<Candidate>> = BinaryHeap::new();
        let mut results: BinaryHeap<Candidate> = BinaryHeap::new();

        for &ep in entry_points {
            if visited.insert(ep.id) {
                frontier.push(Reverse(ep));
                results.push(ep);
            }
        }
        while results.len() > ef {
            results.pop();
        }

        while let Some(Reverse(current)) = frontier.pop() {
            let furthest = results.peek().map_or(f32::MAX, |r| r.distance);
            if current.distance > furthest && results.len() >= ef {
                break;
            }

            for neighbor in self.nodes[current.id].neighbors(level) {
                if !visited.insert(neighbor.id) {
                    continue;
                }
                let dist = self.distance_to(query, neighbor.id);
                let furthest = results.peek().map_or(f32::MAX, |r| r.distance);

                if results.len() < ef || dist < furthest {
                    let candidate = Candidate::new(neighbor.id, dist);
                    frontier.push(Reverse(candidate));
                    results.push(candidate);
                    if results.len() > ef {
                        results.pop();
                    }
                }
            }
        }

        results.into_sorted_vec()
    }

    /// Relative-neighborhood heuristic over candidates sorted closest first.
    ///
    /// A candidate is dropped when it is closer to an already kept neighbor
    /// than to the base node. Never returns more than `max_neighbors`.
    pub(crate) fn select_neighbors(
        &self,
        candidates: &[Candidate],
        max_neighbors: usize,
    ) -> Vec<Candidate> {
        if candidates.len() <= max_neighbors {
            return candidates.to_vec();
        }

        let mut selected: Vec<Candidate> = Vec::with_capacity(max_neighbors);
        for &candidate in candidates {
            if selected.len() >= max_neighbors {
                break;
            }
            let candidate_vec = &self.nodes[candidate.id].vector;
            let is_diverse = selected.iter().all(|kept| {
                self.metric.distance(candidate_vec, &self.nodes[kept.id].vector)
                    >= candidate.distance
            });
            if is_diverse {
                selected.push(candidate);
            }
        }
        selected
    }

    /// Adds `new_node` to `target`'s list at `level`, pruning on overflow.
    fn connect(&mut self, target: NodeId, new_node: NodeId, distance: f32, level: usize) {
        let capacity = self.params.capacity(level);
        let links = &mut self.nodes[target].links[level];
        links.push(Neighbor {
            id: new_node,
            distance,
        });
        if links.len() <= capacity {
            return;
        }

        let mut candidates: Vec<Candidate> = links
            .iter()
            .map(|n| Candidate::new(n.id, n.distance))
            .collect();
        candidates.sort_unstable();

        let pruned: Vec<Neighbor> = self
            .select_neighbors(&candidates, capacity)
            .into_iter()
            .map(|c| Neighbor {
                id: c.id,
                distance: c.distance,
            })
            .collect();
        self.nodes[target].links[level] = pruned;
    }
}

/// Maps a user seed onto a valid (non-zero) xorshift state.
pub(super) fn seed_state(seed: u64) -> u64 {
    if seed == 0 {
        super::params::DEFAULT_SEED
    } else {
        seed
    }
}
