//! HTTP handlers for the Passim REST API.
//!
//! - `health`: health check
//! - `search`: text and vector search
//! - `admin`: index reload

pub mod admin;
pub mod health;
pub mod search;

pub use admin::reload_index;
pub use health::health_check;
pub use search::{search, vector_search};

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use passim_core::Error;

use crate::types::ErrorResponse;

/// Builds a JSON error response.
pub(crate) fn error_response(status: StatusCode, error: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
        }),
    )
        .into_response()
}

/// Maps a core error to its HTTP status.
pub(crate) fn status_for(err: &Error) -> StatusCode {
    match err {
        Error::DimensionMismatch { .. } | Error::InvalidParameter(_) => StatusCode::BAD_REQUEST,
        Error::Encoder(_) => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

pub(crate) fn core_error_response(err: &Error) -> Response {
    let status = status_for(err);
    if status.is_server_error() {
        tracing::error!(code = err.code(), error = %err, "Request failed");
    }
    error_response(status, err.to_string())
}
