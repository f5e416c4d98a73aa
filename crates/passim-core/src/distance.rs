//! Distance metrics for vector similarity calculations.
//!
//! The graph always orders candidates by an internal distance where smaller
//! is better. Inner product is therefore stored as `-dot(a, b)` and flipped
//! back to a similarity when results leave the index.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Distance metric, fixed for the lifetime of one index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceMetric {
    /// Inner product (maximum inner product search).
    /// For normalized text embeddings this is cosine similarity.
    #[default]
    InnerProduct,

    /// Squared Euclidean distance.
    Euclidean,
}

impl DistanceMetric {
    /// Internal distance between two vectors (smaller is closer).
    ///
    /// Callers guarantee equal lengths; the graph checks dimensions at its
    /// public entry points.
    #[must_use]
    #[inline]
    pub fn distance(&self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            Self::InnerProduct => -dot_product(a, b),
            Self::Euclidean => squared_l2(a, b),
        }
    }

    /// Converts an internal distance into the score exposed to callers.
    ///
    /// Euclidean scores are squared distances (ascending is better), inner
    /// product scores are similarities (descending is better).
    #[must_use]
    #[inline]
    pub fn to_score(&self, internal: f32) -> f32 {
        match self {
            Self::InnerProduct => -internal,
            Self::Euclidean => internal,
        }
    }

    /// Returns whether higher exposed scores indicate more similarity.
    #[must_use]
    pub const fn higher_is_better(&self) -> bool {
        match self {
            Self::InnerProduct => true,
            Self::Euclidean => false,
        }
    }

    /// Stable on-disk tag.
    #[must_use]
    pub const fn as_u8(&self) -> u8 {
        match self {
            Self::InnerProduct => 0,
            Self::Euclidean => 1,
        }
    }

    /// Parses an on-disk tag.
    #[must_use]
    pub const fn from_u8(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(Self::InnerProduct),
            1 => Some(Self::Euclidean),
            _ => None,
        }
    }
}

impl fmt::Display for DistanceMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InnerProduct => f.write_str("inner_product"),
            Self::Euclidean => f.write_str("euclidean"),
        }
    }
}

impl FromStr for DistanceMetric {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "inner_product" | "ip" | "dot" => Ok(Self::InnerProduct),
            "euclidean" | "l2" => Ok(Self::Euclidean),
            other => Err(format!(
                "unknown metric '{other}', expected inner_product or euclidean"
            )),
        }
    }
}

#[inline]
fn dot_product(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

#[inline]
fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b)
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}
