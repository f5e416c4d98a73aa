//! Request/Response types for the Passim REST API.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

// ============================================================================
// Search Types
// ============================================================================

/// Text search request.
#[derive(Debug, Deserialize, ToSchema)]
pub struct TextSearchRequest {
    /// Query text. Required; missing or blank yields 400.
    #[schema(example = "what is the boiling point of water")]
    pub query: Option<String>,
    /// Number of passages (defaults to `search.default_top_k`).
    #[schema(example = 3)]
    pub top_k: Option<usize>,
}

/// A passage returned by text search.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PassageResult {
    /// External document id.
    #[schema(example = "7067032")]
    pub id: String,
    /// Passage text.
    pub passage: String,
}

/// Vector search request.
#[derive(Debug, Deserialize, ToSchema)]
pub struct VectorSearchRequest {
    /// Query embedding.
    pub vector: Vec<f32>,
    /// Number of passages (defaults to `search.default_top_k`).
    #[schema(example = 10)]
    pub top_k: Option<usize>,
    /// Candidate pool size (defaults to the index's `ef_search`).
    #[schema(example = 128)]
    pub ef_search: Option<usize>,
}

/// A scored passage.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SearchHitResponse {
    /// External document id.
    pub id: String,
    /// Passage text.
    pub passage: String,
    /// Similarity (inner product) or squared distance (euclidean).
    pub score: f32,
}

/// Vector search response.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct VectorSearchResponse {
    /// Hits, best first.
    pub results: Vec<SearchHitResponse>,
    /// Server-side latency in milliseconds.
    pub took_ms: u64,
}

// ============================================================================
// Service Types
// ============================================================================

/// Health check response.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    /// Always "healthy" when the server answers.
    pub status: String,
    /// Server version.
    pub version: String,
    /// Nodes in the serving index.
    pub nodes: usize,
    /// Vector dimension.
    pub dimension: usize,
    /// Similarity metric.
    pub metric: String,
}

/// Index reload response.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ReloadResponse {
    /// "reloaded".
    pub status: String,
    /// Nodes in the new index.
    pub nodes: usize,
    /// Rows in the new passage table.
    pub rows: usize,
}

/// Error response.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    /// Error message.
    pub error: String,
}
