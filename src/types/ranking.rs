//! Ranking entries - the per-bucket ordered output.

use serde::{Deserialize, Serialize};

/// One position in a bucket's ranking.
///
/// Rankings are recomputed wholesale per bucket, never patched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankingEntry {
    /// Bucket this ranking belongs to
    pub bucket: String,

    /// Canonical key of the ranked artifact
    pub canonical_key: String,

    /// Computed quality score (0..=100)
    pub score: f64,

    /// 1-based rank within the bucket
    pub rank: u32,
}
