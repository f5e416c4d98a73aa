//! Search handlers for text and vector queries.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use passim_core::Error;
use std::sync::Arc;
use std::time::Instant;

use super::{core_error_response, error_response};
use crate::types::{
    ErrorResponse, PassageResult, SearchHitResponse, TextSearchRequest, VectorSearchRequest,
    VectorSearchResponse,
};
use crate::AppState;

/// Resolves the requested result count against the configured bounds.
fn resolve_top_k(state: &AppState, requested: Option<usize>) -> Result<usize, Response> {
    let search = &state.config.search;
    let top_k = requested.unwrap_or(search.default_top_k);
    if top_k == 0 || top_k > search.max_top_k {
        return Err(error_response(
            StatusCode::BAD_REQUEST,
            format!("top_k must be in [1, {}], got {top_k}", search.max_top_k),
        ));
    }
    Ok(top_k)
}

/// Embed a text query and return the closest passages.
#[utoipa::path(
    post,
    path = "/search",
    tag = "search",
    request_body = TextSearchRequest,
    responses(
        (status = 200, description = "Closest passages, best first", body = [PassageResult]),
        (status = 400, description = "Missing or empty query", body = ErrorResponse),
        (status = 502, description = "Encoder unavailable", body = ErrorResponse)
    )
)]
pub async fn search(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<TextSearchRequest>, JsonRejection>,
) -> Response {
    let req = match payload {
        Ok(Json(req)) => req,
        Err(rejection) => return error_response(StatusCode::BAD_REQUEST, rejection.body_text()),
    };
    let Some(query) = req.query.filter(|q| !q.trim().is_empty()) else {
        return error_response(StatusCode::BAD_REQUEST, "missing 'query' field");
    };
    let top_k = match resolve_top_k(&state, req.top_k) {
        Ok(k) => k,
        Err(response) => return response,
    };

    let worker = Arc::clone(&state);
    let result = tokio::task::spawn_blocking(move || {
        let vector = worker.encoder.encode(&query)?;
        let dimension = worker.service.snapshot().graph().dimension();
        if vector.len() != dimension {
            return Err(Error::Encoder(format!(
                "encoder returned {} dimensions, index expects {dimension}",
                vector.len()
            )));
        }
        if vector.iter().any(|x| !x.is_finite()) {
            return Err(Error::Encoder(
                "encoder returned non-finite components".to_string(),
            ));
        }
        worker.service.search(&vector, top_k, None)
    })
    .await;

    match result {
        Ok(Ok(hits)) => {
            let passages: Vec<PassageResult> = hits
                .into_iter()
                .map(|h| PassageResult {
                    id: h.id,
                    passage: h.text,
                })
                .collect();
            Json(passages).into_response()
        }
        Ok(Err(e)) => core_error_response(&e),
        Err(e) => error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("search task failed: {e}"),
        ),
    }
}

/// Search with a precomputed embedding.
#[utoipa::path(
    post,
    path = "/search/vector",
    tag = "search",
    request_body = VectorSearchRequest,
    responses(
        (status = 200, description = "Scored passages, best first", body = VectorSearchResponse),
        (status = 400, description = "Invalid request or dimension mismatch", body = ErrorResponse)
    )
)]
pub async fn vector_search(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<VectorSearchRequest>, JsonRejection>,
) -> Response {
    let start = Instant::now();
    let req = match payload {
        Ok(Json(req)) => req,
        Err(rejection) => return error_response(StatusCode::BAD_REQUEST, rejection.body_text()),
    };
    let top_k = match resolve_top_k(&state, req.top_k) {
        Ok(k) => k,
        Err(response) => return response,
    };

    let worker = Arc::clone(&state);
    let result = tokio::task::spawn_blocking(move || {
        worker.service.search(&req.vector, top_k, req.ef_search)
    })
    .await;

    match result {
        Ok(Ok(hits)) => Json(VectorSearchResponse {
            results: hits
                .into_iter()
                .map(|h| SearchHitResponse {
                    id: h.id,
                    passage: h.text,
                    score: h.score,
                })
                .collect(),
            took_ms: start.elapsed().as_millis() as u64,
        })
        .into_response(),
        Ok(Err(e)) => core_error_response(&e),
        Err(e) => error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("search task failed: {e}"),
        ),
    }
}
