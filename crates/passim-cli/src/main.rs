#![allow(clippy::doc_markdown)]
#![allow(clippy::uninlined_format_args)]
//! `passim` CLI - build, inspect and evaluate passage search indexes
//!
//! Usage:
//!   `passim build --input embeddings.fvecs --output hnsw_index.psm`
//!   `passim info hnsw_index.psm`
//!   `passim search hnsw_index.psm --vector '[0.1, 0.2, ...]' --passages collection.tsv`
//!   `passim evaluate --qrels qrels.dev.tsv --endpoint http://127.0.0.1:8080/search --queries queries.dev.tsv`

mod build;
mod evaluate;
mod inspect;

use clap::{Parser, Subcommand, ValueEnum};
use passim_core::DistanceMetric;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "passim")]
#[command(author, version, about = "Passim CLI - HNSW passage search tools")]
#[command(propagate_version = true)]
struct Cli {
    /// Log filter (overridden by RUST_LOG)
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

/// CLI metric option
#[derive(Debug, Clone, Copy, ValueEnum)]
enum MetricArg {
    /// Inner product (cosine on normalized embeddings)
    Ip,
    Euclidean,
}

impl From<MetricArg> for DistanceMetric {
    fn from(m: MetricArg) -> Self {
        match m {
            MetricArg::Ip => DistanceMetric::InnerProduct,
            MetricArg::Euclidean => DistanceMetric::Euclidean,
        }
    }
}

/// Output format for `info`, `search` and `evaluate`
#[derive(Debug, Clone, Copy, ValueEnum, Default, PartialEq, Eq)]
enum OutputFormat {
    #[default]
    Table,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Build an index from an .fvecs embedding file
    Build {
        /// Embedding vectors (.fvecs), one row per passage in collection order
        #[arg(short, long)]
        input: PathBuf,

        /// Index file to write
        #[arg(short, long, default_value = "hnsw_index.psm")]
        output: PathBuf,

        /// Configuration file for the [hnsw] and [build] sections
        #[arg(short, long, env = "PASSIM_CONFIG", default_value = "passim.toml")]
        config: PathBuf,

        /// Distance metric
        #[arg(long, value_enum)]
        metric: Option<MetricArg>,

        /// Max connections per node (M)
        #[arg(long)]
        m: Option<usize>,

        /// Candidate list size during construction
        #[arg(long)]
        ef_construction: Option<usize>,

        /// Default candidate list size stored with the index
        #[arg(long)]
        ef_search: Option<usize>,

        /// Level generator seed
        #[arg(long)]
        seed: Option<u64>,

        /// Rows per batch
        #[arg(long)]
        batch_size: Option<usize>,

        /// Checkpoint file; an existing one is resumed
        #[arg(long)]
        checkpoint: Option<PathBuf>,

        /// Write the checkpoint every N batches
        #[arg(long, default_value = "1")]
        checkpoint_every: usize,

        /// Hide the progress bar
        #[arg(long)]
        quiet: bool,
    },

    /// Show index info
    Info {
        /// Index file
        path: PathBuf,

        /// Output format
        #[arg(short, long, value_enum, default_value = "table")]
        format: OutputFormat,
    },

    /// Query an index with a raw vector
    Search {
        /// Index file
        path: PathBuf,

        /// Query vector, JSON array or comma-separated
        #[arg(long)]
        vector: String,

        /// Passage table (id<TAB>text) to join results with
        #[arg(long)]
        passages: Option<PathBuf>,

        /// Number of results
        #[arg(short, long, default_value = "3")]
        k: usize,

        /// Candidate list size (defaults to the index's ef_search)
        #[arg(long)]
        ef: Option<usize>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "table")]
        format: OutputFormat,
    },

    /// Score a run against relevance judgments (NDCG, MRR, Recall@k)
    Evaluate {
        /// Relevance judgments (qid 0 docid rel)
        #[arg(long)]
        qrels: PathBuf,

        /// TREC run file (qid Q0 docid rank score tag)
        #[arg(long, conflicts_with_all = ["endpoint", "queries"])]
        run: Option<PathBuf>,

        /// Search endpoint to query, e.g. http://127.0.0.1:8080/search
        #[arg(long, requires = "queries")]
        endpoint: Option<String>,

        /// Queries (qid<TAB>text) sent to the endpoint
        #[arg(long, requires = "endpoint")]
        queries: Option<PathBuf>,

        /// Recall cutoff, also the number of results requested per query
        #[arg(long, default_value = "10")]
        cutoff: usize,

        /// Request timeout for the endpoint in milliseconds
        #[arg(long, default_value = "30000")]
        timeout_ms: u64,

        /// Print per-query scores
        #[arg(long)]
        per_query: bool,

        /// Output format
        #[arg(short, long, value_enum, default_value = "table")]
        format: OutputFormat,
    },
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);

    match cli.command {
        Commands::Build {
            input,
            output,
            config,
            metric,
            m,
            ef_construction,
            ef_search,
            seed,
            batch_size,
            checkpoint,
            checkpoint_every,
            quiet,
        } => {
            let options = build::BuildOptions {
                input,
                output,
                config,
                metric: metric.map(Into::into),
                m,
                ef_construction,
                ef_search,
                seed,
                batch_size,
                checkpoint,
                checkpoint_every,
                show_progress: !quiet,
            };
            let report = build::run(&options)?;
            build::print_report(&options.output, &report);
        }
        Commands::Info { path, format } => {
            inspect::info(&path, format)?;
        }
        Commands::Search {
            path,
            vector,
            passages,
            k,
            ef,
            format,
        } => {
            let query = inspect::parse_vector(&vector)?;
            inspect::search(&path, passages.as_deref(), &query, k, ef, format)?;
        }
        Commands::Evaluate {
            qrels,
            run,
            endpoint,
            queries,
            cutoff,
            timeout_ms,
            per_query,
            format,
        } => {
            let run_source = match (run, endpoint, queries) {
                (Some(path), _, _) => evaluate::RunSource::File(path),
                (None, Some(url), Some(queries)) => evaluate::RunSource::Endpoint {
                    url,
                    queries,
                    timeout: std::time::Duration::from_millis(timeout_ms),
                },
                _ => anyhow::bail!("Provide either --run or --endpoint with --queries"),
            };
            let summary = evaluate::run(&qrels, &run_source, cutoff)?;
            evaluate::print_summary(&summary, per_query, format)?;
        }
    }

    Ok(())
}
