#![allow(clippy::doc_markdown)]
//! Integration tests for the Passim REST API.

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use passim_core::index::hnsw::persistence;
use passim_core::{
    DistanceMetric, Encoder, Error, HnswGraph, HnswParams, Passage, PassageTable, PassimConfig,
    SearchService, ServingIndex,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

use passim_server::{router, AppState};

/// Maps a few fixed words to axis vectors; anything else fails like an
/// unreachable encoder.
struct KeywordEncoder;

impl Encoder for KeywordEncoder {
    fn encode(&self, text: &str) -> passim_core::Result<Vec<f32>> {
        match text {
            "water" => Ok(vec![1.0, 0.0, 0.0, 0.0]),
            "fire" => Ok(vec![0.0, 1.0, 0.0, 0.0]),
            "earth" => Ok(vec![0.0, 0.0, 1.0, 0.0]),
            "wrong size" => Ok(vec![1.0, 0.0]),
            "not a number" => Ok(vec![f32::NAN, 0.0, 0.0, 0.0]),
            "overflow" => Ok(vec![f32::INFINITY, 0.0, 0.0, 0.0]),
            _ => Err(Error::Encoder("connection refused".to_string())),
        }
    }
}

const TEXTS: [&str; 5] = [
    "Water boils at 100 degrees.",
    "Fire needs oxygen.",
    "Earth orbits the sun.",
    "Air is mostly nitrogen.",
    "Steam is water vapour.",
];

fn vectors() -> Vec<[f32; 4]> {
    vec![
        [1.0, 0.0, 0.0, 0.0],
        [0.0, 1.0, 0.0, 0.0],
        [0.0, 0.0, 1.0, 0.0],
        [0.0, 0.0, 0.0, 1.0],
        [0.8, 0.0, 0.0, 0.6],
    ]
}

fn graph(n: usize) -> HnswGraph {
    let mut graph =
        HnswGraph::new(4, DistanceMetric::InnerProduct, HnswParams::new(4, 16)).expect("graph");
    for v in vectors().iter().take(n) {
        graph.insert(v).expect("insert");
    }
    graph
}

fn table(n: usize) -> PassageTable {
    PassageTable::new(
        TEXTS
            .iter()
            .take(n)
            .enumerate()
            .map(|(i, t)| Passage {
                id: format!("{}", 100 + i),
                text: (*t).to_string(),
            })
            .collect(),
    )
}

fn write_index_files(dir: &TempDir, n: usize) {
    persistence::save_to_path(&graph(n), dir.path().join("index.psm")).expect("save");
    let tsv: String = TEXTS
        .iter()
        .take(n)
        .enumerate()
        .map(|(i, t)| format!("{}\t{t}\n", 100 + i))
        .collect();
    std::fs::write(dir.path().join("collection.tsv"), tsv).expect("write tsv");
}

/// Helper to create a test app over an in-memory index of `n` passages.
fn create_test_app(temp_dir: &TempDir, n: usize) -> Router {
    let mut config = PassimConfig::default();
    config.server.index_path = temp_dir.path().join("index.psm").display().to_string();
    config.server.passages_path = temp_dir.path().join("collection.tsv").display().to_string();
    config.search.max_top_k = 4;

    let service = SearchService::new(ServingIndex::new(graph(n), table(n)).expect("index"));
    let state = Arc::new(AppState::new(service, Arc::new(KeywordEncoder), config));
    router(state)
}

async fn send(app: Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string())),
        None => builder.body(Body::empty()),
    }
    .expect("Failed to build request");

    let response = app.oneshot(request).await.expect("Request failed");
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("Failed to read body");
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("Invalid JSON")
    };
    (status, value)
}

#[tokio::test]
async fn test_health_check() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let app = create_test_app(&temp_dir, 5);

    let (status, body) = send(app, "GET", "/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["nodes"], 5);
    assert_eq!(body["dimension"], 4);
    assert_eq!(body["metric"], "inner_product");
}

#[tokio::test]
async fn test_text_search_returns_top_three_passages() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let app = create_test_app(&temp_dir, 5);

    let (status, body) = send(app, "POST", "/search", Some(json!({"query": "water"}))).await;

    assert_eq!(status, StatusCode::OK);
    let hits = body.as_array().expect("array");
    assert_eq!(hits.len(), 3);
    assert_eq!(hits[0], json!({"id": "100", "passage": "Water boils at 100 degrees."}));
    assert_eq!(hits[1]["id"], "104");
}

#[tokio::test]
async fn test_text_search_honours_top_k() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let app = create_test_app(&temp_dir, 5);

    let (status, body) = send(
        app,
        "POST",
        "/search",
        Some(json!({"query": "fire", "top_k": 1})),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([{"id": "101", "passage": "Fire needs oxygen."}]));
}

#[tokio::test]
async fn test_text_search_missing_query_is_bad_request() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");

    for payload in [json!({}), json!({"query": ""}), json!({"query": "   "})] {
        let app = create_test_app(&temp_dir, 5);
        let (status, body) = send(app, "POST", "/search", Some(payload)).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());
    }
}

#[tokio::test]
async fn test_text_search_malformed_body_is_bad_request() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let app = create_test_app(&temp_dir, 5);

    let request = Request::builder()
        .method("POST")
        .uri("/search")
        .header("content-type", "application/json")
        .body(Body::from("{not json"))
        .expect("Failed to build request");
    let response = app.oneshot(request).await.expect("Request failed");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_text_search_encoder_failure_is_bad_gateway() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");

    for query in ["unknown words", "wrong size", "not a number", "overflow"] {
        let app = create_test_app(&temp_dir, 5);
        let (status, body) = send(app, "POST", "/search", Some(json!({ "query": query }))).await;

        assert_eq!(status, StatusCode::BAD_GATEWAY, "query {query}");
        assert!(body["error"]
            .as_str()
            .expect("error")
            .contains("PASSIM-005"));
    }
}

#[tokio::test]
async fn test_top_k_above_limit_is_bad_request() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let app = create_test_app(&temp_dir, 5);

    let (status, _) = send(
        app,
        "POST",
        "/search",
        Some(json!({"query": "water", "top_k": 50})),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_vector_search_scores() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let app = create_test_app(&temp_dir, 5);

    let (status, body) = send(
        app,
        "POST",
        "/search/vector",
        Some(json!({"vector": [0.0, 0.0, 0.0, 1.0], "top_k": 2, "ef_search": 16})),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let results = body["results"].as_array().expect("results");
    assert_eq!(results.len(), 2);
    assert_eq!(results[0]["id"], "103");
    assert!((results[0]["score"].as_f64().expect("score") - 1.0).abs() < 1e-6);
    assert_eq!(results[1]["id"], "104");
    assert!(body["took_ms"].is_u64());
}

#[tokio::test]
async fn test_vector_search_dimension_mismatch() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let app = create_test_app(&temp_dir, 5);

    let (status, body) = send(
        app,
        "POST",
        "/search/vector",
        Some(json!({"vector": [1.0, 0.0]})),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"]
        .as_str()
        .expect("error")
        .contains("PASSIM-001"));
}

#[tokio::test]
async fn test_reload_swaps_index() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let app = create_test_app(&temp_dir, 3);
    write_index_files(&temp_dir, 5);

    let (status, body) = send(app.clone(), "POST", "/admin/reload", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["nodes"], 5);
    assert_eq!(body["rows"], 5);

    let (_, health) = send(app, "GET", "/health", None).await;
    assert_eq!(health["nodes"], 5);
}

#[tokio::test]
async fn test_reload_failure_keeps_current_index() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let app = create_test_app(&temp_dir, 3);
    std::fs::write(temp_dir.path().join("index.psm"), b"not an index").expect("write");
    std::fs::write(temp_dir.path().join("collection.tsv"), "1\tx\n").expect("write");

    let (status, body) = send(app.clone(), "POST", "/admin/reload", None).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"]
        .as_str()
        .expect("error")
        .contains("PASSIM-003"));

    let (_, health) = send(app, "GET", "/health", None).await;
    assert_eq!(health["nodes"], 3);
}

#[tokio::test]
async fn test_reload_with_short_table_is_server_error() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let app = create_test_app(&temp_dir, 3);
    write_index_files(&temp_dir, 5);
    std::fs::write(temp_dir.path().join("collection.tsv"), "100\ta\n101\tb\n102\tc\n")
        .expect("write");

    let (status, body) = send(app.clone(), "POST", "/admin/reload", None).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"]
        .as_str()
        .expect("error")
        .contains("PASSIM-002"));

    let (_, health) = send(app, "GET", "/health", None).await;
    assert_eq!(health["nodes"], 3);
}

#[tokio::test]
async fn test_openapi_document_served() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let app = create_test_app(&temp_dir, 5);

    let (status, body) = send(app, "GET", "/api-docs/openapi.json", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["info"]["title"], "Passim API");
    assert!(body["paths"]["/search"].is_object());
}
