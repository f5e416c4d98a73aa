//! Text-to-vector encoder seam.
//!
//! Embedding models live outside this crate. Implementations call out to an
//! encoder service (see `passim-server`) or, in tests, map text to fixed
//! vectors.

use crate::error::Result;

/// Turns query text into an embedding vector.
///
/// Failures should be reported as [`crate::Error::Encoder`].
pub trait Encoder: Send + Sync {
    /// Embeds `text`.
    fn encode(&self, text: &str) -> Result<Vec<f32>>;

    /// Output dimension, when known up front.
    fn dimension(&self) -> Option<usize> {
        None
    }
}
