//! In-memory ledger and promotion store for testing and development.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Mutex;

use crate::error::{PromotionResult, Result};
use crate::traits::ledger::{DedupLedger, DedupLedgerEntry, PromotionStore, ReserveOutcome};
use crate::types::{PromotionRecord, Tier};

/// In-memory dedup ledger.
///
/// Atomicity comes from holding the map lock across the
/// check-and-insert. Data is lost on restart - use `SqliteLedger`
/// (feature `sqlite`) in production.
pub struct MemoryLedger {
    entries: Mutex<HashMap<(String, String), DedupLedgerEntry>>,
}

impl Default for MemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryLedger {
    /// Create a new empty ledger.
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Total entries across all buckets.
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    /// Whether the ledger is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Confirmed entries in a bucket.
    pub fn confirmed_count(&self, bucket: &str) -> usize {
        self.entries
            .lock()
            .unwrap()
            .values()
            .filter(|e| e.bucket == bucket && e.is_confirmed())
            .count()
    }
}

#[async_trait]
impl DedupLedger for MemoryLedger {
    async fn check_and_reserve(
        &self,
        bucket: &str,
        canonical_key: &str,
        staleness: chrono::Duration,
    ) -> Result<ReserveOutcome> {
        let mut entries = self.entries.lock().unwrap();
        let now = Utc::now();
        let slot = (bucket.to_string(), canonical_key.to_string());

        if let Some(existing) = entries.get(&slot) {
            if !existing.is_stale(now, staleness) {
                return Ok(ReserveOutcome::Duplicate);
            }
            // Stale unconfirmed reservation from a crashed run: reclaim.
        }

        entries.insert(
            slot,
            DedupLedgerEntry {
                canonical_key: canonical_key.to_string(),
                bucket: bucket.to_string(),
                content_hash: None,
                reserved_at: now,
                processed_at: None,
            },
        );
        Ok(ReserveOutcome::Reserved)
    }

    async fn confirm(&self, bucket: &str, canonical_key: &str, content_hash: &str) -> Result<()> {
        let mut entries = self.entries.lock().unwrap();
        let slot = (bucket.to_string(), canonical_key.to_string());
        match entries.get_mut(&slot) {
            Some(entry) => {
                entry.content_hash = Some(content_hash.to_string());
                entry.processed_at = Some(Utc::now());
                Ok(())
            }
            None => Err(crate::error::PipelineError::Ledger(
                format!("confirm without reservation: {bucket}/{canonical_key}").into(),
            )),
        }
    }

    async fn release(&self, bucket: &str, canonical_key: &str) -> Result<()> {
        let mut entries = self.entries.lock().unwrap();
        let slot = (bucket.to_string(), canonical_key.to_string());
        if let Some(entry) = entries.get(&slot) {
            if !entry.is_confirmed() {
                entries.remove(&slot);
            }
        }
        Ok(())
    }

    async fn entries(&self, bucket: &str) -> Result<Vec<DedupLedgerEntry>> {
        Ok(self
            .entries
            .lock()
            .unwrap()
            .values()
            .filter(|e| e.bucket == bucket)
            .cloned()
            .collect())
    }

    async fn prune(&self, bucket: &str, older_than: DateTime<Utc>) -> Result<usize> {
        let mut entries = self.entries.lock().unwrap();
        let before = entries.len();
        entries.retain(|_, e| {
            !(e.bucket == bucket
                && e.processed_at.map(|at| at < older_than).unwrap_or(false))
        });
        Ok(before - entries.len())
    }
}

/// In-memory promotion record store.
pub struct MemoryPromotionStore {
    records: Mutex<HashMap<(String, Tier), PromotionRecord>>,
}

impl Default for MemoryPromotionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryPromotionStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self {
            records: Mutex::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl PromotionStore for MemoryPromotionStore {
    async fn get(
        &self,
        canonical_key: &str,
        tier: Tier,
    ) -> PromotionResult<Option<PromotionRecord>> {
        Ok(self
            .records
            .lock()
            .unwrap()
            .get(&(canonical_key.to_string(), tier))
            .cloned())
    }

    async fn upsert(&self, record: &PromotionRecord) -> PromotionResult<()> {
        self.records.lock().unwrap().insert(
            (record.canonical_key.clone(), record.tier),
            record.clone(),
        );
        Ok(())
    }

    async fn records_for(&self, canonical_key: &str) -> PromotionResult<Vec<PromotionRecord>> {
        let records = self.records.lock().unwrap();
        Ok(Tier::ALL
            .iter()
            .filter_map(|tier| records.get(&(canonical_key.to_string(), *tier)).cloned())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: fn() -> chrono::Duration = || chrono::Duration::hours(1);

    #[tokio::test]
    async fn test_exactly_one_reservation() {
        let ledger = MemoryLedger::new();

        let first = ledger
            .check_and_reserve("daily", "src:1", WINDOW())
            .await
            .unwrap();
        let second = ledger
            .check_and_reserve("daily", "src:1", WINDOW())
            .await
            .unwrap();

        assert_eq!(first, ReserveOutcome::Reserved);
        assert_eq!(second, ReserveOutcome::Duplicate);
    }

    #[tokio::test]
    async fn test_bucket_scoped() {
        let ledger = MemoryLedger::new();

        ledger
            .check_and_reserve("daily", "src:1", WINDOW())
            .await
            .unwrap();
        let weekly = ledger
            .check_and_reserve("weekly", "src:1", WINDOW())
            .await
            .unwrap();

        assert_eq!(weekly, ReserveOutcome::Reserved);
    }

    #[tokio::test]
    async fn test_confirmed_survives_staleness() {
        let ledger = MemoryLedger::new();

        ledger
            .check_and_reserve("daily", "src:1", WINDOW())
            .await
            .unwrap();
        ledger.confirm("daily", "src:1", "hash").await.unwrap();

        // Even with a zero window, a confirmed entry stays a duplicate.
        let outcome = ledger
            .check_and_reserve("daily", "src:1", chrono::Duration::zero())
            .await
            .unwrap();
        assert_eq!(outcome, ReserveOutcome::Duplicate);
    }

    #[tokio::test]
    async fn test_stale_reservation_reclaimed() {
        let ledger = MemoryLedger::new();

        ledger
            .check_and_reserve("daily", "src:1", WINDOW())
            .await
            .unwrap();

        // Unconfirmed and the window is zero: the next caller reclaims it.
        let outcome = ledger
            .check_and_reserve("daily", "src:1", chrono::Duration::zero())
            .await
            .unwrap();
        assert_eq!(outcome, ReserveOutcome::Reserved);
    }

    #[tokio::test]
    async fn test_release_frees_reservation() {
        let ledger = MemoryLedger::new();

        ledger
            .check_and_reserve("daily", "src:1", WINDOW())
            .await
            .unwrap();
        ledger.release("daily", "src:1").await.unwrap();

        let outcome = ledger
            .check_and_reserve("daily", "src:1", WINDOW())
            .await
            .unwrap();
        assert_eq!(outcome, ReserveOutcome::Reserved);
    }

    #[tokio::test]
    async fn test_release_keeps_confirmed() {
        let ledger = MemoryLedger::new();

        ledger
            .check_and_reserve("daily", "src:1", WINDOW())
            .await
            .unwrap();
        ledger.confirm("daily", "src:1", "hash").await.unwrap();
        ledger.release("daily", "src:1").await.unwrap();

        assert_eq!(ledger.confirmed_count("daily"), 1);
    }

    #[tokio::test]
    async fn test_prune_confirmed_only() {
        let ledger = MemoryLedger::new();

        ledger
            .check_and_reserve("daily", "old", WINDOW())
            .await
            .unwrap();
        ledger.confirm("daily", "old", "h1").await.unwrap();
        ledger
            .check_and_reserve("daily", "reserved", WINDOW())
            .await
            .unwrap();

        let removed = ledger
            .prune("daily", Utc::now() + chrono::Duration::seconds(1))
            .await
            .unwrap();

        assert_eq!(removed, 1);
        assert_eq!(ledger.entries("daily").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_reservations() {
        use std::sync::Arc;

        let ledger = Arc::new(MemoryLedger::new());
        let mut handles = Vec::new();
        for _ in 0..16 {
            let ledger = Arc::clone(&ledger);
            handles.push(tokio::spawn(async move {
                ledger
                    .check_and_reserve("daily", "src:1", chrono::Duration::hours(1))
                    .await
                    .unwrap()
            }));
        }

        let mut reserved = 0;
        for handle in handles {
            if handle.await.unwrap() == ReserveOutcome::Reserved {
                reserved += 1;
            }
        }
        assert_eq!(reserved, 1);
    }

    #[tokio::test]
    async fn test_promotion_store_roundtrip() {
        let store = MemoryPromotionStore::new();
        let record = PromotionRecord::pending("src:1", "daily", Tier::Blob);

        store.upsert(&record).await.unwrap();
        let loaded = store.get("src:1", Tier::Blob).await.unwrap().unwrap();
        assert_eq!(loaded.attempts, 0);

        assert!(store.get("src:1", Tier::Search).await.unwrap().is_none());
        assert_eq!(store.records_for("src:1").await.unwrap().len(), 1);
    }
}
