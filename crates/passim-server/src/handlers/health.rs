//! Health check handler.

use axum::{extract::State, response::IntoResponse, Json};
use std::sync::Arc;

use crate::types::HealthResponse;
use crate::AppState;

/// Health check endpoint.
#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses(
        (status = 200, description = "Server is healthy", body = HealthResponse)
    )
)]
#[allow(clippy::unused_async)]
pub async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let snapshot = state.service.snapshot();
    let graph = snapshot.graph();
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        nodes: graph.len(),
        dimension: graph.dimension(),
        metric: graph.metric().to_string(),
    })
}
