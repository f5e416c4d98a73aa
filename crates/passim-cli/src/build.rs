//! `passim build`: stream an `.fvecs` file into an index file.

use anyhow::{Context, Result};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use passim_core::{
    BuildReport, DistanceMetric, FvecsSource, IndexBuilder, PassimConfig, VectorBatchSource,
};
use std::path::{Path, PathBuf};
use tracing::info;

/// Build options, after CLI parsing.
pub struct BuildOptions {
    pub input: PathBuf,
    pub output: PathBuf,
    pub config: PathBuf,
    pub metric: Option<DistanceMetric>,
    pub m: Option<usize>,
    pub ef_construction: Option<usize>,
    pub ef_search: Option<usize>,
    pub seed: Option<u64>,
    pub batch_size: Option<usize>,
    pub checkpoint: Option<PathBuf>,
    pub checkpoint_every: usize,
    pub show_progress: bool,
}

impl BuildOptions {
    /// Applies command-line overrides on top of the loaded configuration.
    pub fn resolve_config(&self) -> Result<PassimConfig> {
        let mut config = PassimConfig::load_from_path(&self.config)
            .with_context(|| format!("Failed to load config {}", self.config.display()))?;

        if let Some(metric) = self.metric {
            config.hnsw.metric = metric;
        }
        if let Some(m) = self.m {
            config.hnsw.m = m;
        }
        if let Some(ef) = self.ef_construction {
            config.hnsw.ef_construction = ef;
        }
        if let Some(ef) = self.ef_search {
            config.hnsw.ef_search = ef;
        }
        if let Some(seed) = self.seed {
            config.hnsw.seed = seed;
        }
        if let Some(batch_size) = self.batch_size {
            config.build.batch_size = batch_size;
        }
        if let Some(path) = &self.checkpoint {
            config.build.checkpoint_path = Some(path.display().to_string());
            config.build.checkpoint_every = self.checkpoint_every;
        }

        config.validate()?;
        Ok(config)
    }
}

/// Builds the index and writes it to `options.output`.
pub fn run(options: &BuildOptions) -> Result<BuildReport> {
    let config = options.resolve_config()?;

    let mut source = FvecsSource::open(&options.input, config.build.batch_size)
        .with_context(|| format!("Failed to open {}", options.input.display()))?;
    let dimension = source.dimension();
    let total_rows = estimate_rows(&options.input, dimension)?;
    info!(
        input = %options.input.display(),
        dimension,
        rows = total_rows,
        "Building index"
    );

    let builder = IndexBuilder::from_config(dimension, &config)?;
    let progress = create_progress_bar(total_rows, options.show_progress);
    progress.set_message(format!("{dimension}D, {}", config.hnsw.metric));

    let (graph, report) = builder
        .build_with_progress(&mut source, |report| {
            progress.set_position(report.nodes as u64);
        })
        .context("Index build failed")?;
    progress.finish_with_message("Build complete");

    builder
        .finish(&graph, &options.output)
        .with_context(|| format!("Failed to write {}", options.output.display()))?;
    Ok(report)
}

/// Rows in an `.fvecs` file, from its size.
fn estimate_rows(path: &Path, dimension: usize) -> Result<usize> {
    let bytes = std::fs::metadata(path)?.len();
    let row_bytes = 4 + 4 * dimension as u64;
    Ok((bytes / row_bytes) as usize)
}

fn create_progress_bar(total: usize, show: bool) -> ProgressBar {
    if !show {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new(total as u64);
    let style = ProgressStyle::default_bar()
        .template(
            "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}",
        )
        .map_or_else(|_| ProgressStyle::default_bar(), |s| s.progress_chars("#>-"));
    pb.set_style(style);
    pb
}

/// Prints the build summary.
pub fn print_report(output: &Path, report: &BuildReport) {
    println!("\n{}", "Build Summary".green().bold());
    println!("  Index:            {}", output.display());
    println!("  Nodes:            {}", report.nodes);
    if report.resumed_from > 0 {
        println!("  Resumed from:     {}", report.resumed_from.to_string().yellow());
    }
    println!("  Inserted:         {}", report.inserted.to_string().green());
    println!("  Batches:          {}", report.batches);
    if report.checkpoints > 0 {
        println!("  Checkpoints:      {}", report.checkpoints);
    }
    println!("  Duration:         {:.2} s", report.duration_secs);
    println!("  Throughput:       {:.0} vectors/sec", report.throughput());
}
