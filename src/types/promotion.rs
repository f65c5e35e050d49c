//! Promotion tiers and per-tier state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A storage tier in the promotion chain.
///
/// Order is fixed: later tiers assume a durable blob reference exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    /// Object blob store
    Blob,
    /// Relational metadata store
    Metadata,
    /// Full-text search index
    Search,
}

impl Tier {
    /// All tiers in promotion order.
    pub const ALL: [Tier; 3] = [Tier::Blob, Tier::Metadata, Tier::Search];

    /// Stable name for logging and persistence.
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Blob => "blob",
            Tier::Metadata => "metadata",
            Tier::Search => "search",
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Tier {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "blob" => Ok(Tier::Blob),
            "metadata" => Ok(Tier::Metadata),
            "search" => Ok(Tier::Search),
            other => Err(format!("unknown tier: {other}")),
        }
    }
}

/// Promotion status of one `(artifact, tier)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum PromotionStatus {
    /// Not yet attempted, or queued for retry
    Pending,
    /// Uploaded; never re-attempted
    Succeeded,
    /// Last attempt failed; retried on the next pass
    Failed { reason: String },
    /// Attempt ceiling reached; reported to the operator
    Abandoned { reason: String },
}

impl PromotionStatus {
    /// Whether this tier is done for good.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PromotionStatus::Succeeded | PromotionStatus::Abandoned { .. }
        )
    }
}

/// Persistent promotion state for one `(artifact, tier)` pair.
///
/// Written only by the promoter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromotionRecord {
    /// Canonical key of the artifact
    pub canonical_key: String,

    /// Bucket the artifact belongs to
    pub bucket: String,

    /// Storage tier
    pub tier: Tier,

    /// Current status
    pub status: PromotionStatus,

    /// Number of attempts so far
    pub attempts: u32,

    /// When the last attempt was made
    pub last_attempt_at: Option<DateTime<Utc>>,
}

impl PromotionRecord {
    /// Fresh pending record for a pair.
    pub fn pending(canonical_key: impl Into<String>, bucket: impl Into<String>, tier: Tier) -> Self {
        Self {
            canonical_key: canonical_key.into(),
            bucket: bucket.into(),
            tier,
            status: PromotionStatus::Pending,
            attempts: 0,
            last_attempt_at: None,
        }
    }
}
