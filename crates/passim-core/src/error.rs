//! Error types for `Passim`.
//!
//! A single error enum covers index construction, persistence, serving and
//! evaluation. Error codes follow the pattern `PASSIM-XXX`.

use thiserror::Error;

/// Result type alias for `Passim` operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in `Passim` operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Vector dimension does not match the index (PASSIM-001).
    ///
    /// Fatal to the call that raised it; the graph is left untouched.
    #[error("[PASSIM-001] Vector dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Expected dimension.
        expected: usize,
        /// Actual dimension.
        actual: usize,
    },

    /// Nonsensical parameter at construction or query entry (PASSIM-002).
    #[error("[PASSIM-002] Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Persisted index is malformed (PASSIM-003).
    ///
    /// Loading aborts and no partial graph is returned.
    #[error("[PASSIM-003] Index corrupted: {0}")]
    IndexCorrupted(String),

    /// Node id has no row in the passage table (PASSIM-004).
    #[error("[PASSIM-004] Node {id} has no passage row (table has {rows} rows)")]
    RowOutOfRange {
        /// Node id returned by the graph.
        id: usize,
        /// Number of rows in the passage table.
        rows: usize,
    },

    /// External encoder failed or is unreachable (PASSIM-005).
    #[error("[PASSIM-005] Encoder error: {0}")]
    Encoder(String),

    /// Configuration error (PASSIM-006).
    #[error("[PASSIM-006] Configuration error: {0}")]
    Config(String),

    /// Vector container is malformed or unreadable (PASSIM-007).
    #[error("[PASSIM-007] Vector source error: {0}")]
    Source(String),

    /// Text input (passages, qrels, runs) could not be parsed (PASSIM-008).
    #[error("[PASSIM-008] Parse error: {0}")]
    Parse(String),

    /// IO error (PASSIM-009).
    #[error("[PASSIM-009] IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Returns the error code (e.g., "PASSIM-001").
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::DimensionMismatch { .. } => "PASSIM-001",
            Self::InvalidParameter(_) => "PASSIM-002",
            Self::IndexCorrupted(_) => "PASSIM-003",
            Self::RowOutOfRange { .. } => "PASSIM-004",
            Self::Encoder(_) => "PASSIM-005",
            Self::Config(_) => "PASSIM-006",
            Self::Source(_) => "PASSIM-007",
            Self::Parse(_) => "PASSIM-008",
            Self::Io(_) => "PASSIM-009",
        }
    }

    /// Returns true if this error is recoverable.
    ///
    /// A corrupted index must be rebuilt; everything else can be retried or
    /// fixed by the caller.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        !matches!(self, Self::IndexCorrupted(_))
    }

    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidParameter(msg.into())
    }

    pub(crate) fn corrupted(msg: impl Into<String>) -> Self {
        Self::IndexCorrupted(msg.into())
    }
}

impl From<crate::config::ConfigError> for Error {
    fn from(err: crate::config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

impl From<csv::Error> for Error {
    fn from(err: csv::Error) -> Self {
        Self::Parse(err.to_string())
    }
}
