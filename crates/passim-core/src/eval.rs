//! Retrieval quality evaluation.
//!
//! Computes the standard TREC measures over a run and relevance judgments:
//! - **NDCG**: graded gain `rel / log2(rank + 1)` over the whole ranking,
//!   normalized by the ideal ordering of the judgments
//! - **MRR**: reciprocal rank of the first relevant document
//! - **Recall@k**: relevant documents in the top k over all relevant documents
//!
//! Averages are taken over the queries in the qrels. A query missing from the
//! run scores 0 on every measure instead of being skipped.
//!
//! # Example
//!
//! ```rust
//! use passim_core::eval::{evaluate, Qrels, Run};
//! use std::collections::HashMap;
//!
//! let qrels: Qrels = HashMap::from([(
//!     "q1".to_string(),
//!     HashMap::from([("d1".to_string(), 1), ("d2".to_string(), 0)]),
//! )]);
//! let run: Run = HashMap::from([(
//!     "q1".to_string(),
//!     HashMap::from([("d1".to_string(), 0.9), ("d2".to_string(), 0.1)]),
//! )]);
//!
//! let summary = evaluate(&qrels, &run, 10);
//! assert_eq!(summary.mrr, 1.0);
//! assert_eq!(summary.recall_at_k, 1.0);
//! ```

use crate::error::{Error, Result};
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::hash::Hash;
use std::io::BufRead;

/// Relevance judgments: query id → document id → relevance grade.
pub type Qrels = HashMap<String, HashMap<String, i64>>;

/// Retrieval run: query id → document id → retrieval score (higher ranks first).
pub type Run = HashMap<String, HashMap<String, f64>>;

/// Default recall cutoff (Recall@10).
pub const DEFAULT_RECALL_CUTOFF: usize = 10;

/// Per-query measures.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct QueryScores {
    /// Normalized discounted cumulative gain.
    pub ndcg: f64,
    /// Reciprocal rank of the first relevant document.
    pub reciprocal_rank: f64,
    /// Recall at the summary's cutoff.
    pub recall: f64,
}

/// Averaged measures over all judged queries.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationSummary {
    /// Mean NDCG.
    pub ndcg: f64,
    /// Mean reciprocal rank.
    pub mrr: f64,
    /// Mean recall at `cutoff`.
    pub recall_at_k: f64,
    /// Recall cutoff.
    pub cutoff: usize,
    /// Number of judged queries averaged over.
    pub queries: usize,
    /// Queries judged but absent from the run.
    pub missing_queries: usize,
    /// Per-query measures, keyed by query id.
    pub per_query: BTreeMap<String, QueryScores>,
}

/// Evaluates `run` against `qrels`.
///
/// Never fails: queries absent from the run, or without any relevant
/// judgment, contribute zeros.
#[must_use]
pub fn evaluate(qrels: &Qrels, run: &Run, cutoff: usize) -> EvaluationSummary {
    let mut per_query = BTreeMap::new();
    let mut missing_queries = 0;

    for (qid, judgments) in qrels {
        let scores = match run.get(qid) {
            Some(ranking) => score_query(judgments, ranking, cutoff),
            None => {
                missing_queries += 1;
                QueryScores::default()
            }
        };
        per_query.insert(qid.clone(), scores);
    }

    let n = per_query.len();
    let mean = |f: fn(&QueryScores) -> f64| {
        if n == 0 {
            0.0
        } else {
            per_query.values().map(f).sum::<f64>() / n as f64
        }
    };

    EvaluationSummary {
        ndcg: mean(|s| s.ndcg),
        mrr: mean(|s| s.reciprocal_rank),
        recall_at_k: mean(|s| s.recall),
        cutoff,
        queries: n,
        missing_queries,
        per_query,
    }
}

fn score_query(
    judgments: &HashMap<String, i64>,
    ranking: &HashMap<String, f64>,
    cutoff: usize,
) -> QueryScores {
    let relevant = judgments.values().filter(|&&rel| rel > 0).count();
    if relevant == 0 {
        return QueryScores::default();
    }

    let ranked = rank_documents(ranking);
    let gain = |doc: &str| judgments.get(doc).copied().unwrap_or(0).max(0) as f64;

    let dcg: f64 = ranked
        .iter()
        .enumerate()
        .map(|(i, doc)| gain(doc) / discount(i))
        .sum();
    let mut ideal: Vec<f64> = judgments
        .values()
        .filter(|&&rel| rel > 0)
        .map(|&rel| rel as f64)
        .collect();
    ideal.sort_by(|a, b| b.total_cmp(a));
    let idcg: f64 = ideal.iter().enumerate().map(|(i, g)| g / discount(i)).sum();

    let reciprocal_rank = ranked
        .iter()
        .position(|doc| gain(doc) > 0.0)
        .map_or(0.0, |i| 1.0 / (i + 1) as f64);

    let found = ranked
        .iter()
        .take(cutoff)
        .filter(|doc| gain(doc) > 0.0)
        .count();

    QueryScores {
        ndcg: dcg / idcg,
        reciprocal_rank,
        recall: found as f64 / relevant as f64,
    }
}

/// Log discount for 0-based position `i` (rank `i + 1`).
fn discount(i: usize) -> f64 {
    ((i + 2) as f64).log2()
}

/// Orders documents by score descending, ties by document id descending.
fn rank_documents(ranking: &HashMap<String, f64>) -> Vec<&str> {
    let mut docs: Vec<(&str, f64)> = ranking.iter().map(|(d, s)| (d.as_str(), *s)).collect();
    docs.sort_by(|a, b| match b.1.total_cmp(&a.1) {
        Ordering::Equal => b.0.cmp(a.0),
        other => other,
    });
    docs.into_iter().map(|(d, _)| d).collect()
}

/// Builds a run from ranked result lists, scoring rank `r` (1-based) as
/// `cutoff - r + 1` so earlier results score higher.
///
/// Repeated document ids keep their best rank.
#[must_use]
pub fn run_from_rankings<I>(rankings: I, cutoff: usize) -> Run
where
    I: IntoIterator<Item = (String, Vec<String>)>,
{
    rankings
        .into_iter()
        .map(|(qid, docs)| {
            let mut scores: HashMap<String, f64> = HashMap::with_capacity(docs.len());
            for (rank, doc) in docs.into_iter().enumerate() {
                let score = cutoff as f64 - (rank + 1) as f64 + 1.0;
                scores.entry(doc).or_insert(score);
            }
            (qid, scores)
        })
        .collect()
}

/// Calculates Recall@k for ANN results against exact ground truth.
///
/// `recall@k = |ground_truth ∩ results| / |ground_truth|`, 0.0 when the
/// ground truth is empty.
#[must_use]
pub fn recall_at_k<T: Eq + Hash + Copy>(ground_truth: &[T], results: &[T]) -> f64 {
    if ground_truth.is_empty() {
        return 0.0;
    }

    let truth_set: HashSet<T> = ground_truth.iter().copied().collect();
    let found = results.iter().filter(|id| truth_set.contains(id)).count();
    found as f64 / ground_truth.len() as f64
}

/// Reads TREC qrels: `qid 0 docid relevance` per line.
pub fn load_qrels<R: BufRead>(reader: R) -> Result<Qrels> {
    let mut qrels = Qrels::new();
    for (line_no, line) in reader.lines().enumerate() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split_whitespace().collect();
        let [qid, _, docid, rel] = fields.as_slice() else {
            return Err(parse_error(line_no, "expected 4 fields: qid 0 docid relevance"));
        };
        let rel: i64 = rel
            .parse()
            .map_err(|_| parse_error(line_no, &format!("invalid relevance '{rel}'")))?;
        qrels
            .entry((*qid).to_string())
            .or_default()
            .insert((*docid).to_string(), rel);
    }
    Ok(qrels)
}

/// Reads queries: `qid \t text` per line, preserving file order.
pub fn load_queries<R: BufRead>(reader: R) -> Result<Vec<(String, String)>> {
    let mut queries = Vec::new();
    for (line_no, line) in reader.lines().enumerate() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let (qid, text) = line
            .split_once('\t')
            .ok_or_else(|| parse_error(line_no, "expected qid<TAB>text"))?;
        queries.push((qid.to_string(), text.to_string()));
    }
    Ok(queries)
}

/// Reads a TREC run: `qid Q0 docid rank score tag` per line.
pub fn load_run<R: BufRead>(reader: R) -> Result<Run> {
    let mut run = Run::new();
    for (line_no, line) in reader.lines().enumerate() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split_whitespace().collect();
        let [qid, _, docid, _, score, _] = fields.as_slice() else {
            return Err(parse_error(
                line_no,
                "expected 6 fields: qid Q0 docid rank score tag",
            ));
        };
        let score: f64 = score
            .parse()
            .map_err(|_| parse_error(line_no, &format!("invalid score '{score}'")))?;
        run.entry((*qid).to_string())
            .or_default()
            .insert((*docid).to_string(), score);
    }
    Ok(run)
}

fn parse_error(line_no: usize, msg: &str) -> Error {
    Error::Parse(format!("line {}: {msg}", line_no + 1))
}
