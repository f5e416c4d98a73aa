//! Query serving over an immutable index snapshot.
//!
//! A [`ServingIndex`] pairs a frozen [`HnswGraph`] with the passage table it
//! was built from. Node `i` of the graph is row `i` of the table.
//! [`SearchService`] holds the current snapshot behind an [`ArcSwap`]:
//! queries load the snapshot once and keep it for their whole duration, so a
//! concurrent [`SearchService::swap`] never affects an in-flight query.

use crate::encoder::Encoder;
use crate::error::{Error, Result};
use crate::index::hnsw::{persistence, HnswGraph, ScoredNode};
use arc_swap::ArcSwap;
use serde::Serialize;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

/// One row of the passage table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Passage {
    /// External document id.
    pub id: String,
    /// Passage text.
    pub text: String,
}

/// Row-ordered passage table.
#[derive(Debug, Clone, Default)]
pub struct PassageTable {
    rows: Vec<Passage>,
}

impl PassageTable {
    /// Creates a table from rows already in index order.
    #[must_use]
    pub fn new(rows: Vec<Passage>) -> Self {
        Self { rows }
    }

    /// Parses a headerless two-column TSV (`doc_id \t text`).
    ///
    /// Quotes are not interpreted. Extra tab-separated fields are folded back
    /// into the text.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(false)
            .quoting(false)
            .flexible(true)
            .from_reader(reader);

        let mut rows = Vec::new();
        for (line, record) in csv_reader.records().enumerate() {
            let record = record?;
            let mut fields = record.iter();
            let (Some(id), Some(first)) = (fields.next(), fields.next()) else {
                return Err(Error::Parse(format!(
                    "passage row {} has fewer than 2 fields",
                    line + 1
                )));
            };
            let mut text = first.to_string();
            for extra in fields {
                text.push('\t');
                text.push_str(extra);
            }
            rows.push(Passage {
                id: id.to_string(),
                text,
            });
        }
        Ok(Self { rows })
    }

    /// Loads a TSV file.
    pub fn from_tsv_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let table = Self::from_reader(BufReader::new(file))?;
        tracing::info!(path = %path.display(), rows = table.len(), "Loaded passage table");
        Ok(table)
    }

    /// Number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns true if the table has no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Row at position `row`.
    #[must_use]
    pub fn get(&self, row: usize) -> Option<&Passage> {
        self.rows.get(row)
    }
}

/// A search hit joined with its passage.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PassageHit {
    /// External document id.
    pub id: String,
    /// Passage text.
    pub text: String,
    /// Similarity (inner product) or squared distance (euclidean).
    pub score: f32,
}

/// A frozen graph and its passage table.
#[derive(Debug)]
pub struct ServingIndex {
    graph: HnswGraph,
    passages: PassageTable,
}

impl ServingIndex {
    /// Pairs a graph with its passage table.
    ///
    /// # Errors
    ///
    /// `InvalidParameter` if the table has fewer rows than the graph has
    /// nodes. A longer table is accepted with a warning.
    pub fn new(graph: HnswGraph, passages: PassageTable) -> Result<Self> {
        if passages.len() < graph.len() {
            return Err(Error::invalid(format!(
                "passage table has {} rows but the index has {} nodes",
                passages.len(),
                graph.len()
            )));
        }
        if passages.len() > graph.len() {
            tracing::warn!(
                rows = passages.len(),
                nodes = graph.len(),
                "Passage table has rows with no indexed vector"
            );
        }
        Ok(Self { graph, passages })
    }

    /// Loads an index file and a passage TSV.
    pub fn load<P: AsRef<Path>, Q: AsRef<Path>>(index_path: P, passages_path: Q) -> Result<Self> {
        let graph = persistence::load_from_path(index_path)?;
        let passages = PassageTable::from_tsv_path(passages_path)?;
        Self::new(graph, passages)
    }

    /// The graph.
    #[must_use]
    pub fn graph(&self) -> &HnswGraph {
        &self.graph
    }

    /// The passage table.
    #[must_use]
    pub fn passages(&self) -> &PassageTable {
        &self.passages
    }

    /// Maps graph results to passages.
    ///
    /// # Errors
    ///
    /// `RowOutOfRange` if a node id has no row.
    pub fn join(&self, results: &[ScoredNode]) -> Result<Vec<PassageHit>> {
        results
            .iter()
            .map(|r| {
                let passage = self.passages.get(r.id).ok_or(Error::RowOutOfRange {
                    id: r.id,
                    rows: self.passages.len(),
                })?;
                Ok(PassageHit {
                    id: passage.id.clone(),
                    text: passage.text.clone(),
                    score: r.score,
                })
            })
            .collect()
    }
}

/// Serves top-k passage lookups from a swappable snapshot.
pub struct SearchService {
    current: ArcSwap<ServingIndex>,
}

impl SearchService {
    /// Creates a service over `index`.
    #[must_use]
    pub fn new(index: ServingIndex) -> Self {
        Self {
            current: ArcSwap::from_pointee(index),
        }
    }

    /// The current snapshot. Holding it pins that snapshot.
    #[must_use]
    pub fn snapshot(&self) -> Arc<ServingIndex> {
        self.current.load_full()
    }

    /// Atomically replaces the snapshot, returning the previous one.
    pub fn swap(&self, index: ServingIndex) -> Arc<ServingIndex> {
        tracing::info!(
            nodes = index.graph.len(),
            rows = index.passages.len(),
            "Swapping serving index"
        );
        self.current.swap(Arc::new(index))
    }

    /// Top-k passages for `vector`.
    ///
    /// `ef_search` falls back to the graph's default when `None`.
    pub fn search(
        &self,
        vector: &[f32],
        k: usize,
        ef_search: Option<usize>,
    ) -> Result<Vec<PassageHit>> {
        let start = Instant::now();
        let snapshot = self.current.load_full();
        let graph = &snapshot.graph;
        let ef = ef_search.unwrap_or(graph.params().ef_search);

        let results = graph.search(vector, k, ef)?;
        let hits = snapshot.join(&results)?;

        tracing::debug!(
            k,
            ef_search = ef,
            hits = hits.len(),
            took_us = start.elapsed().as_micros() as u64,
            "Search completed"
        );
        Ok(hits)
    }

    /// Embeds `text` with `encoder` and searches.
    pub fn search_text(
        &self,
        encoder: &dyn Encoder,
        text: &str,
        k: usize,
    ) -> Result<Vec<PassageHit>> {
        if text.trim().is_empty() {
            return Err(Error::invalid("query text is empty"));
        }
        let vector = encoder.encode(text)?;
        self.search(&vector, k, None)
    }
}

impl std::fmt::Debug for SearchService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let snapshot = self.current.load();
        f.debug_struct("SearchService")
            .field("nodes", &snapshot.graph.len())
            .field("rows", &snapshot.passages.len())
            .finish()
    }
}
