//! HNSW construction and search parameters.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Default level-generator seed.
pub const DEFAULT_SEED: u64 = 0x5DEE_CE66_D1A4_B5B5;

/// Hard ceiling for the level cap; keeps the on-disk level count small.
pub const MAX_LEVEL_CAP: usize = 32;

/// Upper bound for M, so neighbor counts always fit the persisted `u32`.
pub const MAX_CONNECTIONS_LIMIT: usize = 4096;

/// Upper bound for `ef_construction` and `ef_search`; both are persisted as `u32`.
pub const MAX_EF: usize = 1 << 20;

/// HNSW index parameters for tuning performance and recall.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HnswParams {
    /// Maximum neighbors per node on levels above 0 (M). Level 0 allows `2*M`.
    pub max_connections: usize,
    /// Candidate list size during construction.
    pub ef_construction: usize,
    /// Default candidate list size during search.
    pub ef_search: usize,
    /// Highest level a node may be assigned.
    pub max_level: usize,
    /// Seed for the level generator. Same seed and input order give the same graph.
    pub seed: u64,
}

impl Default for HnswParams {
    fn default() -> Self {
        Self {
            max_connections: 16,
            ef_construction: 200,
            ef_search: 64,
            max_level: 16,
            seed: DEFAULT_SEED,
        }
    }
}

impl HnswParams {
    /// Creates parameters with the given M and `ef_construction`, other fields default.
    #[must_use]
    pub fn new(max_connections: usize, ef_construction: usize) -> Self {
        Self {
            max_connections,
            ef_construction,
            ..Self::default()
        }
    }

    /// Picks M and `ef_construction` from the embedding dimension.
    ///
    /// | Dimension | M | `ef_construction` |
    /// |-----------|---|-------------------|
    /// | ≤128 | 12 | 200 |
    /// | ≤512 | 16 | 200 |
    /// | >512 | 32 | 400 |
    #[must_use]
    pub fn auto(dimension: usize) -> Self {
        match dimension {
            0..=128 => Self::new(12, 200),
            129..=512 => Self::new(16, 200),
            _ => Self::new(32, 400),
        }
    }

    /// Sets the default search candidate list size.
    #[must_use]
    pub fn with_ef_search(mut self, ef_search: usize) -> Self {
        self.ef_search = ef_search;
        self
    }

    /// Sets the level generator seed.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Sets the level cap.
    #[must_use]
    pub fn with_max_level(mut self, max_level: usize) -> Self {
        self.max_level = max_level;
        self
    }

    /// Neighbor list capacity at `level`.
    #[must_use]
    #[inline]
    pub fn capacity(&self, level: usize) -> usize {
        if level == 0 {
            self.max_connections * 2
        } else {
            self.max_connections
        }
    }

    /// Level normalization constant `mL = 1 / ln(M)`.
    #[must_use]
    pub fn level_mult(&self) -> f64 {
        1.0 / (self.max_connections as f64).ln()
    }

    /// Rejects nonsensical configurations.
    ///
    /// `ef_search < k` is not checked here; search clamps it per call.
    pub fn validate(&self) -> Result<()> {
        if self.max_connections < 2 {
            return Err(Error::invalid(format!(
                "max_connections must be >= 2, got {}",
                self.max_connections
            )));
        }
        if self.max_connections > MAX_CONNECTIONS_LIMIT {
            return Err(Error::invalid(format!(
                "max_connections must be <= {MAX_CONNECTIONS_LIMIT}, got {}",
                self.max_connections
            )));
        }
        if self.ef_construction < self.max_connections {
            return Err(Error::invalid(format!(
                "ef_construction ({}) must be >= max_connections ({})",
                self.ef_construction, self.max_connections
            )));
        }
        if self.ef_construction > MAX_EF {
            return Err(Error::invalid(format!(
                "ef_construction must be <= {MAX_EF}, got {}",
                self.ef_construction
            )));
        }
        if self.ef_search == 0 {
            return Err(Error::invalid("ef_search must be > 0"));
        }
        if self.ef_search > MAX_EF {
            return Err(Error::invalid(format!(
                "ef_search must be <= {MAX_EF}, got {}",
                self.ef_search
            )));
        }
        if self.max_level > MAX_LEVEL_CAP {
            return Err(Error::invalid(format!(
                "max_level must be <= {MAX_LEVEL_CAP}, got {}",
                self.max_level
            )));
        }
        Ok(())
    }
}
