//! Storage promotion - pushing artifacts through the tier chain.
//!
//! Tier order is fixed (blob before metadata before search) because
//! later tiers assume a durable blob reference. Per `(artifact, tier)`
//! the state machine is:
//!
//! ```text
//! pending -> succeeded
//! pending -> failed -> pending (next pass)
//! failed  -> abandoned (attempt ceiling)
//! ```
//!
//! Only the promoter writes `PromotionRecord`s.

use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::{PromotionError, Result};
use crate::traits::ledger::PromotionStore;
use crate::traits::sinks::{BlobStore, MetadataStore, SearchDoc, SearchIndex};
use crate::types::{Artifact, PromotionRecord, PromotionStatus, Tier};

/// Drives artifacts through the storage tiers.
pub struct StoragePromoter {
    blob: Arc<dyn BlobStore>,
    metadata: Arc<dyn MetadataStore>,
    search: Arc<dyn SearchIndex>,
    records: Arc<dyn PromotionStore>,
    attempt_ceiling: u32,
}

/// Final per-tier state after one promotion pass over an artifact.
#[derive(Debug, Clone)]
pub struct PromotionReport {
    /// Canonical key of the artifact
    pub canonical_key: String,

    /// Records for the tiers touched this pass, in tier order
    pub records: Vec<PromotionRecord>,
}

impl PromotionReport {
    /// Whether every tier has succeeded.
    pub fn is_fully_promoted(&self) -> bool {
        self.records.len() == Tier::ALL.len()
            && self
                .records
                .iter()
                .all(|r| r.status == PromotionStatus::Succeeded)
    }

    /// Tiers that hit the attempt ceiling, with their last reason.
    pub fn abandoned(&self) -> Vec<&PromotionRecord> {
        self.records
            .iter()
            .filter(|r| matches!(r.status, PromotionStatus::Abandoned { .. }))
            .collect()
    }
}

impl StoragePromoter {
    /// Create a promoter over the three sinks and a record store.
    pub fn new(
        blob: Arc<dyn BlobStore>,
        metadata: Arc<dyn MetadataStore>,
        search: Arc<dyn SearchIndex>,
        records: Arc<dyn PromotionStore>,
    ) -> Self {
        Self {
            blob,
            metadata,
            search,
            records,
            attempt_ceiling: 5,
        }
    }

    /// Set the per-tier attempt ceiling.
    pub fn with_attempt_ceiling(mut self, ceiling: u32) -> Self {
        self.attempt_ceiling = ceiling.max(1);
        self
    }

    /// Run one promotion pass for an artifact.
    ///
    /// Already-succeeded tiers are a guaranteed no-op (checked before
    /// any sink call). The first non-succeeded tier that fails stops
    /// the pass; the skipped tiers keep their state and retry together
    /// next pass.
    pub async fn promote(&self, artifact: &Artifact) -> Result<PromotionReport> {
        let key = artifact.metadata.canonical_key.as_str();
        let mut report = PromotionReport {
            canonical_key: key.to_string(),
            records: Vec::with_capacity(Tier::ALL.len()),
        };

        for tier in Tier::ALL {
            let mut record = self
                .records
                .get(key, tier)
                .await
                .map_err(crate::error::PipelineError::Promotion)?
                .unwrap_or_else(|| {
                    PromotionRecord::pending(key, artifact.metadata.bucket.clone(), tier)
                });

            match &record.status {
                PromotionStatus::Succeeded => {
                    report.records.push(record);
                    continue;
                }
                PromotionStatus::Abandoned { reason } => {
                    // Terminal: operator follow-up required; later tiers
                    // cannot proceed past a missing earlier tier.
                    debug!(key, tier = %tier, %reason, "tier abandoned, skipping pass");
                    report.records.push(record);
                    break;
                }
                PromotionStatus::Pending | PromotionStatus::Failed { .. } => {}
            }

            record.attempts += 1;
            record.last_attempt_at = Some(Utc::now());

            match self.push_tier(artifact, tier).await {
                Ok(()) => {
                    record.status = PromotionStatus::Succeeded;
                    self.records
                        .upsert(&record)
                        .await
                        .map_err(crate::error::PipelineError::Promotion)?;
                    debug!(key, tier = %tier, "tier promoted");
                    report.records.push(record);
                }
                Err(e) => {
                    let reason = e.to_string();
                    record.status = if record.attempts >= self.attempt_ceiling {
                        warn!(key, tier = %tier, %reason, attempts = record.attempts, "tier abandoned");
                        PromotionStatus::Abandoned { reason }
                    } else {
                        warn!(key, tier = %tier, %reason, attempts = record.attempts, "tier failed");
                        PromotionStatus::Failed { reason }
                    };
                    self.records
                        .upsert(&record)
                        .await
                        .map_err(crate::error::PipelineError::Promotion)?;
                    report.records.push(record);
                    break;
                }
            }
        }

        Ok(report)
    }

    async fn push_tier(&self, artifact: &Artifact, tier: Tier) -> std::result::Result<(), PromotionError> {
        let key = artifact.metadata.canonical_key.as_str();
        let bucket = artifact.metadata.bucket.as_str();

        match tier {
            Tier::Blob => {
                // A populated blob store with a lost record still
                // converges without re-uploading.
                if self.blob.exists(bucket, key).await? {
                    return Ok(());
                }
                self.blob
                    .put(bucket, key, artifact.document.clone().into_bytes())
                    .await
            }
            Tier::Metadata => self.metadata.upsert(key, &artifact.metadata).await,
            Tier::Search => {
                self.search
                    .index_document(key, &SearchDoc::from_artifact(artifact))
                    .await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::MemoryPromotionStore;
    use crate::stores::memory::{MemoryBlobStore, MemoryMetadataStore, MemorySearchIndex};
    use crate::testing::FlakyBlobStore;
    use chrono::Utc;
    use std::collections::BTreeMap;

    fn artifact(key: &str) -> Artifact {
        Artifact {
            path: std::path::PathBuf::from("/tmp/unused"),
            document: "# Doc\nBody".into(),
            metadata: crate::types::ArtifactMetadata {
                canonical_key: key.to_string(),
                bucket: "daily".into(),
                source: "src".into(),
                title: Some("Doc".into()),
                url: None,
                tags: vec!["rust".into()],
                engagement: BTreeMap::new(),
                authority: 0.5,
                published_at: None,
                first_seen_at: Utc::now(),
                content_hash: "h".into(),
                score: 10.0,
                metadata_revision: 1,
                media: vec![],
            },
        }
    }

    struct Sinks {
        blob: Arc<MemoryBlobStore>,
        metadata: Arc<MemoryMetadataStore>,
        search: Arc<MemorySearchIndex>,
        records: Arc<MemoryPromotionStore>,
    }

    fn sinks() -> Sinks {
        Sinks {
            blob: Arc::new(MemoryBlobStore::new()),
            metadata: Arc::new(MemoryMetadataStore::new()),
            search: Arc::new(MemorySearchIndex::new()),
            records: Arc::new(MemoryPromotionStore::new()),
        }
    }

    #[tokio::test]
    async fn test_full_promotion() {
        let s = sinks();
        let promoter = StoragePromoter::new(
            s.blob.clone(),
            s.metadata.clone(),
            s.search.clone(),
            s.records.clone(),
        );

        let report = promoter.promote(&artifact("src:1")).await.unwrap();
        assert!(report.is_fully_promoted());
        assert_eq!(s.blob.put_calls(), 1);
        assert_eq!(s.metadata.upsert_calls(), 1);
        assert_eq!(s.search.index_calls(), 1);
    }

    #[tokio::test]
    async fn test_succeeded_tier_never_called_again() {
        let s = sinks();
        let promoter = StoragePromoter::new(
            s.blob.clone(),
            s.metadata.clone(),
            s.search.clone(),
            s.records.clone(),
        );

        let a = artifact("src:1");
        promoter.promote(&a).await.unwrap();
        promoter.promote(&a).await.unwrap();
        promoter.promote(&a).await.unwrap();

        // One network call per tier, ever.
        assert_eq!(s.blob.put_calls(), 1);
        assert_eq!(s.blob.exists_calls(), 1);
        assert_eq!(s.metadata.upsert_calls(), 1);
        assert_eq!(s.search.index_calls(), 1);
    }

    #[tokio::test]
    async fn test_blob_failure_skips_later_tiers_until_success() {
        let s = sinks();
        // First put fails, the retry on the next pass succeeds.
        let flaky = Arc::new(FlakyBlobStore::new(s.blob.clone(), 1));
        let promoter = StoragePromoter::new(
            flaky,
            s.metadata.clone(),
            s.search.clone(),
            s.records.clone(),
        );

        let a = artifact("src:1");
        let first = promoter.promote(&a).await.unwrap();
        assert!(!first.is_fully_promoted());
        assert_eq!(first.records.len(), 1);
        assert_eq!(s.metadata.upsert_calls(), 0);
        assert_eq!(s.search.index_calls(), 0);

        let second = promoter.promote(&a).await.unwrap();
        assert!(second.is_fully_promoted());
        assert_eq!(s.metadata.upsert_calls(), 1);
        assert_eq!(s.search.index_calls(), 1);
    }

    #[tokio::test]
    async fn test_abandoned_after_ceiling() {
        let s = sinks();
        let flaky = Arc::new(FlakyBlobStore::new(s.blob.clone(), u32::MAX));
        let promoter = StoragePromoter::new(
            flaky,
            s.metadata.clone(),
            s.search.clone(),
            s.records.clone(),
        )
        .with_attempt_ceiling(2);

        let a = artifact("src:1");
        promoter.promote(&a).await.unwrap();
        let second = promoter.promote(&a).await.unwrap();
        assert_eq!(second.abandoned().len(), 1);

        // Abandoned is terminal: no further attempts.
        let third = promoter.promote(&a).await.unwrap();
        assert_eq!(third.abandoned().len(), 1);
        let record = s.records.get("src:1", Tier::Blob).await.unwrap().unwrap();
        assert_eq!(record.attempts, 2);
    }

    #[tokio::test]
    async fn test_existing_blob_counts_as_success() {
        let s = sinks();
        s.blob
            .put("daily", "src:1", b"already there".to_vec())
            .await
            .unwrap();
        let puts_before = s.blob.put_calls();

        let promoter = StoragePromoter::new(
            s.blob.clone(),
            s.metadata.clone(),
            s.search.clone(),
            s.records.clone(),
        );
        let report = promoter.promote(&artifact("src:1")).await.unwrap();

        assert!(report.is_fully_promoted());
        assert_eq!(s.blob.put_calls(), puts_before);
    }
}
