//! Tests for `graph` module - native HNSW construction and search.

#![allow(clippy::cast_precision_loss)]

use super::candidate::Candidate;
use super::graph::HnswGraph;
use super::params::HnswParams;
use crate::distance::DistanceMetric;
use crate::error::Error;

fn euclidean_graph(dim: usize) -> HnswGraph {
    HnswGraph::new(dim, DistanceMetric::Euclidean, HnswParams::new(8, 64)).expect("valid graph")
}

fn line_vector(i: usize, dim: usize) -> Vec<f32> {
    (0..dim).map(|j| (i * dim + j) as f32).collect()
}

#[test]
fn test_insert_and_search() {
    let mut hnsw = euclidean_graph(32);

    for i in 0..100 {
        let id = hnsw.insert(&line_vector(i, 32)).expect("insert");
        assert_eq!(id, i);
    }
    assert_eq!(hnsw.len(), 100);

    let query: Vec<f32> = (0..32).map(|j| j as f32).collect();
    let results = hnsw.search(&query, 10, 50).expect("search");

    assert_eq!(results.len(), 10);
    assert_eq!(results[0].id, 0);
    assert!(results[0].score.abs() < f32::EPSILON);
}

#[test]
fn test_empty_search_returns_nothing() {
    let hnsw = euclidean_graph(3);

    let results = hnsw.search(&[1.0, 2.0, 3.0], 10, 50).expect("search");

    assert!(results.is_empty());
}

#[test]
fn test_single_node_always_returned() {
    let mut hnsw = euclidean_graph(2);
    hnsw.insert(&[100.0, 100.0]).expect("insert");

    let results = hnsw.search(&[-5.0, 3.0], 5, 10).expect("search");

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].id, 0);
}

#[test]
fn test_first_node_is_entry_point_without_neighbors() {
    let mut hnsw = euclidean_graph(2);
    hnsw.insert(&[1.0, 1.0]).expect("insert");

    assert_eq!(hnsw.entry_point(), Some(0));
    let node = hnsw.node(0).expect("node 0");
    for level in 0..=node.level() {
        assert!(node.neighbors(level).is_empty());
    }
    assert_eq!(hnsw.max_level(), node.level());
}

#[test]
fn test_insert_dimension_mismatch_leaves_graph_untouched() {
    let mut hnsw = euclidean_graph(4);
    hnsw.insert(&[0.0; 4]).expect("insert");

    let err = hnsw.insert(&[0.0; 3]).unwrap_err();

    assert!(matches!(
        err,
        Error::DimensionMismatch {
            expected: 4,
            actual: 3
        }
    ));
    assert_eq!(hnsw.len(), 1);
}

#[test]
fn test_search_dimension_mismatch() {
    let mut hnsw = euclidean_graph(4);
    hnsw.insert(&[0.0; 4]).expect("insert");

    let err = hnsw.search(&[0.0; 5], 1, 10).unwrap_err();

    assert!(matches!(err, Error::DimensionMismatch { .. }));
}

#[test]
fn test_search_on_empty_graph_still_checks_dimension() {
    let hnsw = euclidean_graph(4);
    assert!(matches!(
        hnsw.search(&[0.0; 2], 1, 10),
        Err(Error::DimensionMismatch { .. })
    ));
}

#[test]
fn test_zero_k_rejected() {
    let hnsw = euclidean_graph(2);
    assert!(matches!(
        hnsw.search(&[0.0, 0.0], 0, 10),
        Err(Error::InvalidParameter(_))
    ));
}

#[test]
fn test_non_finite_vectors_rejected() {
    let mut hnsw = euclidean_graph(2);
    assert!(matches!(
        hnsw.insert(&[f32::NAN, 0.0]),
        Err(Error::InvalidParameter(_))
    ));
    assert!(hnsw.is_empty());
}

#[test]
fn test_ef_below_k_is_clamped() {
    let mut hnsw = euclidean_graph(4);
    for i in 0..50 {
        hnsw.insert(&line_vector(i, 4)).expect("insert");
    }

    let results = hnsw.search(&line_vector(0, 4), 20, 1).expect("search");

    assert_eq!(results.len(), 20);
}

#[test]
fn test_euclidean_results_ascending() {
    let mut hnsw = euclidean_graph(8);
    for i in 0..200 {
        let v: Vec<f32> = (0..8).map(|j| ((i * 7 + j * 13) % 31) as f32).collect();
        hnsw.insert(&v).expect("insert");
    }

    let results = hnsw.search(&[3.0; 8], 25, 64).expect("search");

    assert!(results.windows(2).all(|w| w[0].score <= w[1].score));
}

#[test]
fn test_inner_product_results_descending_similarity() {
    let mut hnsw =
        HnswGraph::new(2, DistanceMetric::InnerProduct, HnswParams::new(8, 64)).expect("graph");
    for i in 0..64 {
        let angle = i as f32 * 0.1;
        hnsw.insert(&[angle.cos(), angle.sin()]).expect("insert");
    }

    let results = hnsw.search(&[1.0, 0.0], 10, 32).expect("search");

    assert_eq!(results[0].id, 0);
    assert!((results[0].score - 1.0).abs() < 1e-6);
    assert!(results.windows(2).all(|w| w[0].score >= w[1].score));
}

#[test]
fn test_insert_with_id_enforces_sequence() {
    let mut hnsw = euclidean_graph(2);
    hnsw.insert_with_id(0, &[0.0, 0.0]).expect("id 0");

    let err = hnsw.insert_with_id(2, &[1.0, 1.0]).unwrap_err();

    assert!(matches!(err, Error::InvalidParameter(_)));
    assert_eq!(hnsw.insert_with_id(1, &[1.0, 1.0]).expect("id 1"), 1);
}

#[test]
fn test_entry_point_is_on_max_level() {
    let mut hnsw = HnswGraph::new(4, DistanceMetric::Euclidean, HnswParams::new(2, 16))
        .expect("graph");
    for i in 0..500 {
        hnsw.insert(&line_vector(i, 4)).expect("insert");
    }

    let ep = hnsw.entry_point().expect("entry point");
    let ep_level = hnsw.node(ep).expect("node").level();
    assert_eq!(ep_level, hnsw.max_level());

    // Ties broken by insertion order: no earlier node reaches the max level
    for id in 0..ep {
        assert!(hnsw.node(id).expect("node").level() < hnsw.max_level());
    }
    // M = 2 makes upper levels likely
    assert!(hnsw.max_level() > 0);
}

#[test]
fn test_neighbor_lists_respect_capacity() {
    let params = HnswParams::new(4, 32);
    let mut hnsw = HnswGraph::new(6, DistanceMetric::Euclidean, params).expect("graph");
    for i in 0..400 {
        let v: Vec<f32> = (0..6).map(|j| ((i * 31 + j * 17) % 97) as f32).collect();
        hnsw.insert(&v).expect("insert");
    }

    for id in 0..hnsw.len() {
        let node = hnsw.node(id).expect("node");
        for level in 0..=node.level() {
            let ids = node.neighbor_ids(level);
            assert!(ids.len() <= params.capacity(level), "node {id} level {level}");
            assert!(!ids.contains(&id), "self loop at node {id}");
            for n in ids {
                assert!(hnsw.node(n).expect("neighbor").level() >= level);
            }
        }
    }
}

#[test]
fn test_same_seed_same_topology() {
    let build = || {
        let mut g = HnswGraph::new(4, DistanceMetric::Euclidean, HnswParams::new(4, 32))
            .expect("graph");
        for i in 0..150 {
            let v: Vec<f32> = (0..4).map(|j| ((i * 13 + j * 7) % 23) as f32).collect();
            g.insert(&v).expect("insert");
        }
        g
    };

    let a = build();
    let b = build();

    assert_eq!(a.entry_point(), b.entry_point());
    for id in 0..a.len() {
        let level = a.node(id).expect("node").level();
        for l in 0..=level {
            assert_eq!(a.neighbors(id, l), b.neighbors(id, l));
        }
    }
}

#[test]
fn test_neighbors_absent_level_is_none() {
    let mut hnsw = euclidean_graph(2);
    hnsw.insert(&[0.0, 0.0]).expect("insert");
    let level = hnsw.node(0).expect("node").level();

    assert!(hnsw.neighbors(0, level + 1).is_none());
    assert!(hnsw.neighbors(5, 0).is_none());
}

#[test]
fn test_select_neighbors_keeps_all_when_under_capacity() {
    let mut hnsw = euclidean_graph(2);
    for i in 0..3 {
        hnsw.insert(&[i as f32, 0.0]).expect("insert");
    }
    let candidates = vec![
        Candidate::new(0, 0.0),
        Candidate::new(1, 1.0),
        Candidate::new(2, 4.0),
    ];

    let selected = hnsw.select_neighbors(&candidates, 10);

    assert_eq!(selected.len(), 3);
}

#[test]
fn test_select_neighbors_prefers_diversity() {
    // Base at origin; nodes 0 and 1 sit together on +x, node 2 on +y.
    let mut hnsw = euclidean_graph(2);
    hnsw.insert(&[1.0, 0.0]).expect("insert");
    hnsw.insert(&[1.1, 0.0]).expect("insert");
    hnsw.insert(&[0.0, 1.2]).expect("insert");
    let candidates = vec![
        Candidate::new(0, 1.0),
        Candidate::new(1, 1.21),
        Candidate::new(2, 1.44),
    ];

    let selected: Vec<usize> = hnsw
        .select_neighbors(&candidates, 2)
        .iter()
        .map(|c| c.id)
        .collect();

    // Node 1 is closer to node 0 than to the base, so it is dropped.
    assert_eq!(selected, vec![0, 2]);
}

#[test]
fn test_exact_search_matches_brute_force_order() {
    let mut hnsw = euclidean_graph(2);
    for p in [[5.0, 5.0], [1.0, 1.0], [3.0, 3.0]] {
        hnsw.insert(&p).expect("insert");
    }

    let ids: Vec<usize> = hnsw
        .exact_search(&[0.0, 0.0], 3)
        .expect("exact")
        .iter()
        .map(|r| r.id)
        .collect();

    assert_eq!(ids, vec![1, 2, 0]);
}

#[test]
fn test_stats() {
    let mut hnsw = euclidean_graph(2);
    assert_eq!(hnsw.stats().nodes, 0);
    assert!(hnsw.stats().nodes_per_level.is_empty());

    for i in 0..20 {
        hnsw.insert(&[i as f32, 0.0]).expect("insert");
    }
    let stats = hnsw.stats();

    assert_eq!(stats.nodes, 20);
    assert_eq!(stats.nodes_per_level[0], 20);
    assert_eq!(stats.nodes_per_level.len(), hnsw.max_level() + 1);
    assert!(stats.avg_degree_level0 > 0.0);
}

#[test]
fn test_new_rejects_bad_dimension_and_params() {
    assert!(matches!(
        HnswGraph::new(0, DistanceMetric::Euclidean, HnswParams::default()),
        Err(Error::InvalidParameter(_))
    ));
    assert!(matches!(
        HnswGraph::new(4, DistanceMetric::Euclidean, HnswParams::new(0, 10)),
        Err(Error::InvalidParameter(_))
    ));
}
