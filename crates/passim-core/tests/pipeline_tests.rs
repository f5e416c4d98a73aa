//! End-to-end pipeline: vectors on disk → build → save → load → serve → evaluate.
//!
//! ```bash
//! cargo test -p passim-core --test pipeline_tests
//! ```

#![allow(clippy::cast_precision_loss)]

use passim_core::eval::{run_from_rankings, Qrels};
use passim_core::index::hnsw::persistence;
use passim_core::source::write_fvecs;
use passim_core::{
    evaluate, DistanceMetric, FvecsSource, HnswParams, IndexBuilder, PassageTable, SearchService,
    ServingIndex,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;
use std::fmt::Write as _;

const DIM: usize = 16;
const ROWS: usize = 600;

/// Seeded unit vectors.
fn corpus() -> Vec<Vec<f32>> {
    let mut rng = StdRng::seed_from_u64(2024);
    (0..ROWS)
        .map(|_| {
            let v: Vec<f32> = (0..DIM).map(|_| rng.gen_range(-1.0..1.0)).collect();
            let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
            v.into_iter().map(|x| x / norm).collect()
        })
        .collect()
}

fn collection_tsv() -> String {
    let mut tsv = String::new();
    for i in 0..ROWS {
        writeln!(tsv, "{}\tpassage number {i}", 1000 + i).expect("write");
    }
    tsv
}

#[test]
fn test_build_save_load_serve_evaluate() {
    let dir = tempfile::tempdir().expect("tempdir");
    let vectors_path = dir.path().join("embeddings.fvecs");
    let index_path = dir.path().join("hnsw_index.psm");
    let tsv_path = dir.path().join("collection.tsv");

    let vectors = corpus();
    write_fvecs(
        std::fs::File::create(&vectors_path).expect("create"),
        &vectors,
    )
    .expect("write vectors");
    std::fs::write(&tsv_path, collection_tsv()).expect("write tsv");

    // Build in batches and persist
    let mut source = FvecsSource::open(&vectors_path, 128).expect("open source");
    let graph = IndexBuilder::new(DIM, DistanceMetric::InnerProduct, HnswParams::new(8, 200))
        .expect("builder")
        .build(&mut source)
        .expect("build");
    assert_eq!(graph.len(), ROWS);
    persistence::save_to_path(&graph, &index_path).expect("save");

    // Serve from disk
    let service = SearchService::new(ServingIndex::load(&index_path, &tsv_path).expect("load"));

    // Each corpus vector used as a query should find its own passage first
    let rankings: Vec<(String, Vec<String>)> = (0..50)
        .map(|i| {
            let hits = service.search(&vectors[i * 12], 10, Some(128)).expect("search");
            (
                format!("q{i}"),
                hits.into_iter().map(|h| h.id).collect(),
            )
        })
        .collect();

    let qrels: Qrels = (0..50)
        .map(|i| {
            (
                format!("q{i}"),
                HashMap::from([((1000 + i * 12).to_string(), 1)]),
            )
        })
        .collect();
    let run = run_from_rankings(rankings, 10);

    let summary = evaluate(&qrels, &run, 10);

    assert_eq!(summary.queries, 50);
    assert!(summary.recall_at_k >= 0.98, "recall {}", summary.recall_at_k);
    assert!(summary.mrr >= 0.98, "mrr {}", summary.mrr);
    assert!(summary.ndcg >= 0.98, "ndcg {}", summary.ndcg);
}

#[test]
fn test_reloaded_index_serves_same_hits() {
    let dir = tempfile::tempdir().expect("tempdir");
    let index_path = dir.path().join("hnsw_index.psm");
    let vectors = corpus();

    let mut source =
        passim_core::MemorySource::new(DIM, vectors.clone(), 100).expect("memory source");
    let graph = IndexBuilder::new(DIM, DistanceMetric::Euclidean, HnswParams::default())
        .expect("builder")
        .build(&mut source)
        .expect("build");
    persistence::save_to_path(&graph, &index_path).expect("save");

    let table = PassageTable::from_reader(collection_tsv().as_bytes()).expect("table");
    let in_memory = SearchService::new(ServingIndex::new(graph, table.clone()).expect("index"));
    let reloaded = SearchService::new(
        ServingIndex::new(persistence::load_from_path(&index_path).expect("load"), table)
            .expect("index"),
    );

    for q in vectors.iter().step_by(37) {
        assert_eq!(
            in_memory.search(q, 5, None).expect("search"),
            reloaded.search(q, 5, None).expect("search")
        );
    }
}
