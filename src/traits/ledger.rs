//! Persistent pipeline state: the dedup ledger and promotion records.
//!
//! These two stores are the only mutable shared state in the pipeline;
//! everything else flows by value between stages. Callers never touch
//! the underlying storage directly - only these contracts.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{PromotionResult, Result};
use crate::types::{PromotionRecord, Tier};

/// Outcome of a reservation attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReserveOutcome {
    /// This caller owns the pair for the run; downstream work proceeds
    Reserved,
    /// Another run (or worker) already processed or holds the pair
    Duplicate,
}

/// One row of the dedup ledger.
///
/// `processed_at` is set only after the artifact writer confirms a
/// complete write; an unconfirmed reservation older than the staleness
/// window is reclaimable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DedupLedgerEntry {
    /// Canonical key
    pub canonical_key: String,

    /// Ledger partition (bucket, or "global" under global scope)
    pub bucket: String,

    /// Content hash recorded at confirmation
    pub content_hash: Option<String>,

    /// When the reservation was taken
    pub reserved_at: DateTime<Utc>,

    /// When the artifact write was confirmed
    pub processed_at: Option<DateTime<Utc>>,
}

impl DedupLedgerEntry {
    /// Whether this entry is a confirmed acceptance.
    pub fn is_confirmed(&self) -> bool {
        self.processed_at.is_some()
    }

    /// Whether an unconfirmed reservation has gone stale.
    pub fn is_stale(&self, now: DateTime<Utc>, window: chrono::Duration) -> bool {
        !self.is_confirmed() && now - self.reserved_at > window
    }
}

/// Atomic dedup ledger, partitioned by bucket.
///
/// Under concurrent workers exactly one `check_and_reserve` call
/// observes `Reserved` for a given `(bucket, key)` pair; all others
/// observe `Duplicate` and skip downstream work. Entries are never
/// deleted automatically - `prune` is an explicit operation.
#[async_trait]
pub trait DedupLedger: Send + Sync {
    /// Atomically reserve a pair, reclaiming stale reservations.
    async fn check_and_reserve(
        &self,
        bucket: &str,
        canonical_key: &str,
        staleness: chrono::Duration,
    ) -> Result<ReserveOutcome>;

    /// Mark a reservation as processed after a confirmed artifact write.
    async fn confirm(&self, bucket: &str, canonical_key: &str, content_hash: &str) -> Result<()>;

    /// Drop an unconfirmed reservation so a later run can re-attempt.
    async fn release(&self, bucket: &str, canonical_key: &str) -> Result<()>;

    /// All entries for a bucket.
    async fn entries(&self, bucket: &str) -> Result<Vec<DedupLedgerEntry>>;

    /// Explicitly remove confirmed entries older than `older_than`.
    ///
    /// Returns the number of entries removed.
    async fn prune(&self, bucket: &str, older_than: DateTime<Utc>) -> Result<usize>;
}

/// Persistent store for per-`(artifact, tier)` promotion state.
///
/// Only the storage promoter writes records.
#[async_trait]
pub trait PromotionStore: Send + Sync {
    /// Load the record for a pair, if any.
    async fn get(&self, canonical_key: &str, tier: Tier) -> PromotionResult<Option<PromotionRecord>>;

    /// Insert or replace a record.
    async fn upsert(&self, record: &PromotionRecord) -> PromotionResult<()>;

    /// All records for an artifact, in tier order.
    async fn records_for(&self, canonical_key: &str) -> PromotionResult<Vec<PromotionRecord>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_staleness() {
        let entry = DedupLedgerEntry {
            canonical_key: "k".into(),
            bucket: "daily".into(),
            content_hash: None,
            reserved_at: Utc::now() - chrono::Duration::hours(2),
            processed_at: None,
        };

        assert!(entry.is_stale(Utc::now(), chrono::Duration::hours(1)));
        assert!(!entry.is_stale(Utc::now(), chrono::Duration::hours(3)));
    }

    #[test]
    fn test_confirmed_never_stale() {
        let entry = DedupLedgerEntry {
            canonical_key: "k".into(),
            bucket: "daily".into(),
            content_hash: Some("abc".into()),
            reserved_at: Utc::now() - chrono::Duration::days(30),
            processed_at: Some(Utc::now() - chrono::Duration::days(30)),
        };

        assert!(!entry.is_stale(Utc::now(), chrono::Duration::hours(1)));
    }
}
