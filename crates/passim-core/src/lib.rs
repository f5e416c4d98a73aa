//! # `Passim` Core
//!
//! Approximate nearest neighbor search over dense text embeddings.
//!
//! `Passim` builds a hierarchical navigable small world (HNSW) graph from a
//! stream of embedding vectors, persists it in a versioned binary file, and
//! serves top-k passage lookups from an immutable, atomically swappable
//! snapshot.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use passim_core::{
//!     DistanceMetric, HnswGraph, HnswParams, IndexBuilder, MemorySource, PassageTable,
//!     SearchService, ServingIndex,
//! };
//!
//! let params = HnswParams::default();
//! let mut source = MemorySource::new(384, vectors, 10_000)?;
//! let graph = IndexBuilder::new(384, DistanceMetric::InnerProduct, params)?
//!     .build(&mut source)?;
//! passim_core::index::hnsw::persistence::save_to_path(&graph, "hnsw_index.psm")?;
//!
//! let passages = PassageTable::from_tsv_path("collection.tsv")?;
//! let service = SearchService::new(ServingIndex::new(graph, passages)?);
//! let hits = service.search(&query_vector, 3, None)?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::must_use_candidate)]

pub mod build;
pub mod config;
pub mod distance;
pub mod encoder;
pub mod error;
pub mod eval;
pub mod index;
pub mod service;
pub mod source;
#[cfg(test)]
mod source_tests;

pub use build::{BuildReport, IndexBuilder};
pub use config::{ConfigError, PassimConfig};
pub use distance::DistanceMetric;
pub use encoder::Encoder;
pub use error::{Error, Result};
pub use eval::{evaluate, EvaluationSummary, Qrels, Run};
pub use index::hnsw::{GraphStats, HnswGraph, HnswParams, NodeId, ScoredNode};
pub use service::{Passage, PassageHit, PassageTable, SearchService, ServingIndex};
pub use source::{FvecsSource, MemorySource, VectorBatch, VectorBatchSource};
