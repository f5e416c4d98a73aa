//! Batch index construction.
//!
//! [`IndexBuilder`] drains a [`VectorBatchSource`] into an [`HnswGraph`],
//! one batch at a time, from a single writer. Each batch is validated in full
//! before any of its rows are inserted, so a rejected batch leaves the graph
//! at the previous batch boundary.
//!
//! With a checkpoint configured, the partial graph is saved every N batches.
//! A later build with the same checkpoint path loads it, skips the rows it
//! already holds and continues. The level generator state is part of the
//! checkpoint, so the resumed graph matches an uninterrupted build. The
//! checkpoint outlives the build itself: [`IndexBuilder::finish`] removes it
//! only after the output file has been written.

use crate::config::PassimConfig;
use crate::distance::DistanceMetric;
use crate::error::{Error, Result};
use crate::index::hnsw::{persistence, HnswGraph, HnswParams};
use crate::source::{VectorBatch, VectorBatchSource};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info};

/// Build statistics.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BuildReport {
    /// Rows inserted by this run.
    pub inserted: usize,
    /// Batches processed by this run.
    pub batches: usize,
    /// Rows restored from a checkpoint.
    pub resumed_from: usize,
    /// Checkpoints written.
    pub checkpoints: usize,
    /// Nodes in the graph.
    pub nodes: usize,
    /// Duration in seconds.
    pub duration_secs: f64,
}

impl BuildReport {
    /// Calculate throughput (rows per second).
    #[must_use]
    pub fn throughput(&self) -> f64 {
        if self.duration_secs > 0.0 {
            self.inserted as f64 / self.duration_secs
        } else {
            0.0
        }
    }
}

#[derive(Debug, Clone)]
struct Checkpoint {
    path: PathBuf,
    every: usize,
}

/// Builds an HNSW graph from a batch source.
#[derive(Debug, Clone)]
pub struct IndexBuilder {
    dimension: usize,
    metric: DistanceMetric,
    params: HnswParams,
    checkpoint: Option<Checkpoint>,
}

impl IndexBuilder {
    /// Creates a builder.
    ///
    /// # Errors
    ///
    /// `InvalidParameter` if the dimension or parameters are invalid.
    pub fn new(dimension: usize, metric: DistanceMetric, params: HnswParams) -> Result<Self> {
        // Fails early on the same checks the graph applies
        HnswGraph::new(dimension, metric, params)?;
        Ok(Self {
            dimension,
            metric,
            params,
            checkpoint: None,
        })
    }

    /// Creates a builder from the `hnsw` and `build` sections.
    pub fn from_config(dimension: usize, config: &PassimConfig) -> Result<Self> {
        let params = config.hnsw.to_params()?;
        let builder = Self::new(dimension, config.hnsw.metric, params)?;
        match (&config.build.checkpoint_path, config.build.checkpoint_every) {
            (Some(path), every) if every > 0 => builder.with_checkpoint(path, every),
            _ => Ok(builder),
        }
    }

    /// Saves the partial graph to `path` every `every` batches and resumes
    /// from it when present.
    pub fn with_checkpoint<P: AsRef<Path>>(mut self, path: P, every: usize) -> Result<Self> {
        if every == 0 {
            return Err(Error::invalid("checkpoint interval must be > 0"));
        }
        self.checkpoint = Some(Checkpoint {
            path: path.as_ref().to_path_buf(),
            every,
        });
        Ok(self)
    }

    /// Drains `source` into a new graph.
    pub fn build<S: VectorBatchSource + ?Sized>(&self, source: &mut S) -> Result<HnswGraph> {
        self.build_with_progress(source, |_| {}).map(|(graph, _)| graph)
    }

    /// Drains `source`, calling `on_batch` after every batch.
    pub fn build_with_progress<S, F>(
        &self,
        source: &mut S,
        mut on_batch: F,
    ) -> Result<(HnswGraph, BuildReport)>
    where
        S: VectorBatchSource + ?Sized,
        F: FnMut(&BuildReport),
    {
        let start = Instant::now();
        if source.dimension() != self.dimension {
            return Err(Error::DimensionMismatch {
                expected: self.dimension,
                actual: source.dimension(),
            });
        }

        let mut graph = self.resume_or_create()?;
        let mut report = BuildReport {
            resumed_from: graph.len(),
            nodes: graph.len(),
            ..BuildReport::default()
        };

        if !graph.is_empty() {
            let target = graph.len();
            source.skip_rows(target.saturating_sub(source.position()))?;
            if source.position() != target {
                return Err(Error::Source(format!(
                    "source ended after {} rows but the checkpoint holds {target}",
                    source.position()
                )));
            }
            info!(rows = target, "Resuming build from checkpoint");
        }

        info!(
            dimension = self.dimension,
            metric = %self.metric,
            m = self.params.max_connections,
            ef_construction = self.params.ef_construction,
            "Starting index build"
        );

        loop {
            let batch = source.next_batch()?;
            if batch.is_empty() {
                break;
            }
            self.insert_batch(&mut graph, &batch)?;

            report.batches += 1;
            report.inserted += batch.len();
            report.nodes = graph.len();
            info!(
                batch = report.batches,
                rows = batch.len(),
                total = graph.len(),
                "Processed batch"
            );

            if let Some(checkpoint) = &self.checkpoint {
                if report.batches % checkpoint.every == 0 {
                    persistence::save_to_path(&graph, &checkpoint.path)?;
                    report.checkpoints += 1;
                    debug!(
                        path = %checkpoint.path.display(),
                        nodes = graph.len(),
                        "Checkpoint written"
                    );
                }
            }
            report.duration_secs = start.elapsed().as_secs_f64();
            on_batch(&report);
        }

        report.duration_secs = start.elapsed().as_secs_f64();
        info!(
            nodes = graph.len(),
            batches = report.batches,
            duration_secs = report.duration_secs,
            "Index build complete"
        );
        Ok((graph, report))
    }

    /// Saves the finished graph to `output`, then removes the checkpoint.
    ///
    /// The checkpoint is left in place when the save fails.
    pub fn finish<P: AsRef<Path>>(&self, graph: &HnswGraph, output: P) -> Result<()> {
        persistence::save_to_path(graph, output)?;
        self.remove_checkpoint()
    }

    /// Deletes the checkpoint file, if one is configured and present.
    pub fn remove_checkpoint(&self) -> Result<()> {
        if let Some(checkpoint) = &self.checkpoint {
            if checkpoint.path.exists() {
                std::fs::remove_file(&checkpoint.path)?;
                debug!(path = %checkpoint.path.display(), "Removed checkpoint after complete build");
            }
        }
        Ok(())
    }

    fn resume_or_create(&self) -> Result<HnswGraph> {
        let Some(checkpoint) = self.checkpoint.as_ref().filter(|c| c.path.exists()) else {
            return HnswGraph::new(self.dimension, self.metric, self.params);
        };

        let graph = persistence::load_from_path(&checkpoint.path)?;
        if graph.dimension() != self.dimension
            || graph.metric() != self.metric
            || *graph.params() != self.params
        {
            return Err(Error::invalid(format!(
                "checkpoint {} was built with different settings",
                checkpoint.path.display()
            )));
        }
        Ok(graph)
    }

    fn insert_batch(&self, graph: &mut HnswGraph, batch: &VectorBatch) -> Result<()> {
        if batch.start_id != graph.len() {
            return Err(Error::invalid(format!(
                "batch starts at row {} but the graph holds {} nodes",
                batch.start_id,
                graph.len()
            )));
        }
        for (row, vector) in batch.ids().zip(&batch.vectors) {
            if vector.len() != self.dimension {
                return Err(Error::DimensionMismatch {
                    expected: self.dimension,
                    actual: vector.len(),
                });
            }
            if vector.iter().any(|x| !x.is_finite()) {
                return Err(Error::invalid(format!("row {row} has a non-finite component")));
            }
        }

        for (row, vector) in batch.ids().zip(&batch.vectors) {
            graph.insert_with_id(row, vector)?;
        }
        Ok(())
    }
}
