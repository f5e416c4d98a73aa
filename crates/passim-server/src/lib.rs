#![allow(clippy::doc_markdown)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::unused_async)]
#![allow(clippy::needless_for_each)]
//! `Passim` Server - REST API library for passage search.
//!
//! This module provides the HTTP handlers, types and router for the `Passim`
//! REST API.
//!
//! ## OpenAPI Documentation
//!
//! The API is documented using OpenAPI 3.0:
//! - OpenAPI JSON: `GET /api-docs/openapi.json`

pub mod encoder;
mod handlers;
mod types;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Json, Router,
};
use passim_core::{Encoder, PassimConfig, SearchService};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;

// Re-export types for external use
pub use encoder::HttpEncoder;
pub use types::*;

// Re-export handlers for routing
pub use handlers::{health_check, reload_index, search, vector_search};

// ============================================================================
// OpenAPI Documentation
// ============================================================================

/// Passim API Documentation
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Passim API",
        version = "0.3.0",
        description = "Passage search over an HNSW index of text embeddings."
    ),
    servers(
        (url = "/", description = "Local server")
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "search", description = "Text and vector passage search"),
        (name = "admin", description = "Index administration")
    ),
    paths(
        handlers::health::health_check,
        handlers::search::search,
        handlers::search::vector_search,
        handlers::admin::reload_index
    ),
    components(
        schemas(
            TextSearchRequest,
            PassageResult,
            VectorSearchRequest,
            VectorSearchResponse,
            SearchHitResponse,
            HealthResponse,
            ReloadResponse,
            ErrorResponse
        )
    )
)]
pub struct ApiDoc;

// ============================================================================
// Application State
// ============================================================================

/// Application state shared across handlers.
pub struct AppState {
    /// Serving index snapshot holder.
    pub service: SearchService,
    /// Query text encoder.
    pub encoder: Arc<dyn Encoder>,
    /// Effective configuration.
    pub config: PassimConfig,
    /// Serializes reloads.
    pub reload_lock: tokio::sync::Mutex<()>,
}

impl AppState {
    /// Creates the shared state.
    pub fn new(service: SearchService, encoder: Arc<dyn Encoder>, config: PassimConfig) -> Self {
        Self {
            service,
            encoder,
            config,
            reload_lock: tokio::sync::Mutex::new(()),
        }
    }
}

/// OpenAPI document.
async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

/// Builds the application router with body limit, CORS and tracing layers.
pub fn router(state: Arc<AppState>) -> Router {
    let max_body_size = state.config.server.max_body_size;
    let cors_enabled = state.config.server.cors_enabled;

    let app = Router::new()
        .route("/health", get(health_check))
        .route("/search", post(search))
        .route("/search/vector", post(vector_search))
        .route("/admin/reload", post(reload_index))
        .route("/api-docs/openapi.json", get(openapi_json))
        .layer(DefaultBodyLimit::max(max_body_size))
        .with_state(state);

    let app = if cors_enabled {
        app.layer(CorsLayer::permissive())
    } else {
        app
    };
    app.layer(TraceLayer::new_for_http())
}

// ============================================================================
// Tests
// ============================================================================
