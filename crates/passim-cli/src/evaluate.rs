//! `passim evaluate`: score a run against relevance judgments.
//!
//! The run comes either from a TREC run file or from a live search endpoint
//! queried once per line of a queries file. Endpoint results are ranked in
//! response order and scored `cutoff - rank + 1`.

use anyhow::{Context, Result};
use colored::Colorize;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, Color, ContentArrangement, Table};
use indicatif::{ProgressBar, ProgressStyle};
use passim_core::eval::{self, run_from_rankings, EvaluationSummary, Qrels, Run};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

use crate::OutputFormat;

/// Where the ranked results come from.
pub enum RunSource {
    /// TREC run file (`qid Q0 docid rank score tag`).
    File(PathBuf),
    /// `POST {"query", "top_k"}` to a search endpoint for each query.
    Endpoint {
        url: String,
        queries: PathBuf,
        timeout: Duration,
    },
}

#[derive(Serialize)]
struct SearchRequest<'a> {
    query: &'a str,
    top_k: usize,
}

#[derive(Deserialize)]
struct SearchHit {
    id: String,
}

fn open(path: &Path) -> Result<BufReader<File>> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    Ok(BufReader::new(file))
}

/// Loads the judgments and the run, then evaluates.
pub fn run(qrels_path: &Path, source: &RunSource, cutoff: usize) -> Result<EvaluationSummary> {
    if cutoff == 0 {
        anyhow::bail!("--cutoff must be > 0");
    }
    let qrels: Qrels = eval::load_qrels(open(qrels_path)?)
        .with_context(|| format!("Failed to parse {}", qrels_path.display()))?;

    let run = match source {
        RunSource::File(path) => eval::load_run(open(path)?)
            .with_context(|| format!("Failed to parse {}", path.display()))?,
        RunSource::Endpoint {
            url,
            queries,
            timeout,
        } => {
            let queries = eval::load_queries(open(queries)?)
                .with_context(|| format!("Failed to parse {}", queries.display()))?;
            query_endpoint(url, &queries, cutoff, *timeout)?
        }
    };

    Ok(eval::evaluate(&qrels, &run, cutoff))
}

/// Sends every query to `url` and collects the ranked document ids.
///
/// Queries that fail (transport error, non-2xx status, unreadable body) are
/// logged and left out of the run, so they score 0.
pub fn query_endpoint(
    url: &str,
    queries: &[(String, String)],
    top_k: usize,
    timeout: Duration,
) -> Result<Run> {
    let client = reqwest::blocking::Client::builder()
        .timeout(timeout)
        .build()
        .context("Failed to build HTTP client")?;

    let progress = if queries.len() > 1 {
        let pb = ProgressBar::new(queries.len() as u64);
        if let Ok(style) =
            ProgressStyle::default_bar().template("[{elapsed_precise}] [{bar:40}] {pos}/{len}")
        {
            pb.set_style(style.progress_chars("#>-"));
        }
        pb
    } else {
        ProgressBar::hidden()
    };

    let mut rankings = Vec::with_capacity(queries.len());
    for (qid, text) in queries {
        // A failed query stays in the qrels and scores zero
        match fetch_ranking(&client, url, text, top_k) {
            Ok(ids) => {
                debug!(qid = %qid, hits = ids.len(), "Query answered");
                rankings.push((qid.clone(), ids));
            }
            Err(e) => warn!(qid = %qid, error = %e, "Search endpoint query failed"),
        }
        progress.inc(1);
    }
    progress.finish_and_clear();

    Ok(run_from_rankings(rankings, top_k))
}

fn fetch_ranking(
    client: &reqwest::blocking::Client,
    url: &str,
    text: &str,
    top_k: usize,
) -> Result<Vec<String>> {
    let response = client
        .post(url)
        .json(&SearchRequest { query: text, top_k })
        .send()
        .context("request failed")?;
    let status = response.status();
    if !status.is_success() {
        anyhow::bail!("endpoint answered {status}");
    }
    let hits: Vec<SearchHit> = response.json().context("invalid response body")?;
    Ok(hits.into_iter().map(|h| h.id).collect())
}

/// Renders the averaged measures.
pub fn summary_table(summary: &EvaluationSummary) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("Measure").fg(Color::Cyan),
            Cell::new("Value").fg(Color::Cyan),
        ]);
    table.add_row(vec![Cell::new("NDCG"), Cell::new(format!("{:.4}", summary.ndcg))]);
    table.add_row(vec![Cell::new("MRR"), Cell::new(format!("{:.4}", summary.mrr))]);
    table.add_row(vec![
        Cell::new(format!("Recall@{}", summary.cutoff)),
        Cell::new(format!("{:.4}", summary.recall_at_k)),
    ]);
    table.add_row(vec![Cell::new("Queries"), Cell::new(summary.queries)]);
    table
}

fn per_query_table(summary: &EvaluationSummary) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("qid").fg(Color::Cyan),
            Cell::new("ndcg").fg(Color::Cyan),
            Cell::new("rr").fg(Color::Cyan),
            Cell::new(format!("recall@{}", summary.cutoff)).fg(Color::Cyan),
        ]);
    for (qid, scores) in &summary.per_query {
        table.add_row(vec![
            Cell::new(qid),
            Cell::new(format!("{:.4}", scores.ndcg)),
            Cell::new(format!("{:.4}", scores.reciprocal_rank)),
            Cell::new(format!("{:.4}", scores.recall)),
        ]);
    }
    table
}

/// Prints the evaluation result.
pub fn print_summary(
    summary: &EvaluationSummary,
    per_query: bool,
    format: OutputFormat,
) -> Result<()> {
    if format == OutputFormat::Json {
        if per_query {
            println!("{}", serde_json::to_string_pretty(summary)?);
        } else {
            let mut value = serde_json::to_value(summary)?;
            if let Some(obj) = value.as_object_mut() {
                obj.remove("per_query");
            }
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
        return Ok(());
    }

    if per_query {
        println!("{}", per_query_table(summary));
    }
    println!("\n{}", "Evaluation Summary".green().bold());
    println!("{}", summary_table(summary));
    if summary.missing_queries > 0 {
        println!(
            "{}",
            format!(
                "{} judged queries had no results and scored 0",
                summary.missing_queries
            )
            .yellow()
        );
    }
    Ok(())
}
