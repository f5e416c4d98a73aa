//! Index administration.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use passim_core::ServingIndex;
use std::sync::Arc;

use super::error_response;
use crate::types::{ErrorResponse, ReloadResponse};
use crate::AppState;

/// Reload the index and passage table from the configured paths.
///
/// The new snapshot replaces the old one atomically; queries already running
/// finish on the old snapshot. On failure the current snapshot stays.
#[utoipa::path(
    post,
    path = "/admin/reload",
    tag = "admin",
    responses(
        (status = 200, description = "Index reloaded", body = ReloadResponse),
        (status = 500, description = "Index or table could not be loaded", body = ErrorResponse)
    )
)]
pub async fn reload_index(State(state): State<Arc<AppState>>) -> Response {
    let _guard = state.reload_lock.lock().await;

    let index_path = state.config.server.index_path.clone();
    let passages_path = state.config.server.passages_path.clone();
    tracing::info!(index = %index_path, passages = %passages_path, "Reloading serving index");

    let loaded =
        tokio::task::spawn_blocking(move || ServingIndex::load(&index_path, &passages_path)).await;

    match loaded {
        Ok(Ok(index)) => {
            let response = ReloadResponse {
                status: "reloaded".to_string(),
                nodes: index.graph().len(),
                rows: index.passages().len(),
            };
            state.service.swap(index);
            Json(response).into_response()
        }
        // Bad files on disk are a server fault whatever the core error kind
        Ok(Err(e)) => {
            tracing::error!(code = e.code(), error = %e, "Reload failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
        Err(e) => error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("reload task failed: {e}"),
        ),
    }
}
