//! Run orchestration - stream, dedup, archive, rank, promote.

use futures::StreamExt;
use governor::{Quota, RateLimiter};
use nonzero_ext::nonzero;
use std::num::NonZeroU32;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::canonical::canonicalize;
use crate::error::{PipelineError, Result};
use crate::promote::StoragePromoter;
use crate::retry::retry;
use crate::scoring::{quality_score, rank_bucket, ScoringConfig};
use crate::traits::ledger::{DedupLedger, ReserveOutcome};
use crate::traits::media::{MediaFetcher, MediaOutcome};
use crate::traits::source::SourceAdapter;
use crate::types::{
    Artifact, ArtifactMetadata, CanonicalRecord, PipelineConfig, RunParams, SourceItem, Tier,
};
use crate::writer::ArtifactWriter;

type SourceRateLimiter = RateLimiter<
    String,
    governor::state::keyed::DefaultKeyedStateStore<String>,
    governor::clock::DefaultClock,
>;

/// A promotion that hit its attempt ceiling, for operator follow-up.
#[derive(Debug, Clone)]
pub struct AbandonedPromotion {
    /// Canonical key of the artifact
    pub canonical_key: String,

    /// Tier that was abandoned
    pub tier: Tier,

    /// Last failure reason
    pub reason: String,
}

/// Result of one pipeline run.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    /// Bucket the run wrote into
    pub bucket: String,

    /// Items accepted and written as new artifacts
    pub accepted: usize,

    /// Items skipped as ledger duplicates
    pub duplicates: usize,

    /// Items rejected for missing identifiers
    pub invalid: usize,

    /// Items that failed to fetch or write after retries
    pub failed: usize,

    /// Items not started because the run was cancelled
    pub cancelled: usize,

    /// Artifacts with every tier promoted after this run's pass
    pub fully_promoted: usize,

    /// Artifacts in the bucket's recomputed ranking
    pub ranked: usize,

    /// Promotions that reached the attempt ceiling
    pub abandoned: Vec<AbandonedPromotion>,
}

impl RunSummary {
    /// Whether the run finished without abandoned promotions.
    ///
    /// Drives the caller's exit status.
    pub fn is_clean(&self) -> bool {
        self.abandoned.is_empty()
    }
}

/// Per-item outcome inside the worker pool.
enum ItemOutcome {
    Accepted,
    Duplicate,
    Invalid(String),
    Failed(String),
    Cancelled,
}

/// The ingestion pipeline facade.
///
/// Owns the run lifecycle: bounded worker concurrency, per-source rate
/// limiting, failure isolation, ranking recompute, and the promotion
/// pass. The ledger and promotion store are the only mutable shared
/// state; everything else flows by value between stages.
#[derive(Clone)]
pub struct Pipeline {
    ledger: Arc<dyn DedupLedger>,
    writer: ArtifactWriter,
    media: Arc<dyn MediaFetcher>,
    promoter: Arc<StoragePromoter>,
    limiter: Arc<SourceRateLimiter>,
    config: Arc<PipelineConfig>,
    scoring: Arc<ScoringConfig>,
}

impl Pipeline {
    /// Create a pipeline over its collaborators.
    pub fn new(
        ledger: Arc<dyn DedupLedger>,
        writer: ArtifactWriter,
        media: Arc<dyn MediaFetcher>,
        promoter: StoragePromoter,
        config: PipelineConfig,
    ) -> Self {
        let rate = NonZeroU32::new(config.source_rate_per_second).unwrap_or(nonzero!(1u32));
        let scoring =
            ScoringConfig::default().with_half_life_hours(config.recency_half_life_hours);
        let promoter =
            Arc::new(promoter.with_attempt_ceiling(config.promotion_attempt_ceiling));
        Self {
            ledger,
            writer,
            media,
            promoter,
            limiter: Arc::new(RateLimiter::keyed(Quota::per_second(rate))),
            config: Arc::new(config),
            scoring: Arc::new(scoring),
        }
    }

    /// Run the pipeline for one source and bucket.
    pub async fn run(&self, source: &dyn SourceAdapter, params: &RunParams) -> Result<RunSummary> {
        self.run_with_cancellation(source, params, CancellationToken::new())
            .await
    }

    /// Run with an externally controlled cancellation token.
    ///
    /// Cancellation stops new items from starting; in-flight items
    /// finish to their next safe checkpoint (reservation released or
    /// artifact confirmed) before the pool drains.
    pub async fn run_with_cancellation(
        &self,
        source: &dyn SourceAdapter,
        params: &RunParams,
        cancel: CancellationToken,
    ) -> Result<RunSummary> {
        info!(
            source = source.name(),
            bucket = %params.bucket,
            "run starting"
        );

        let mut summary = RunSummary {
            bucket: params.bucket.clone(),
            ..Default::default()
        };

        let mut stream = source.fetch(params).await?;
        let semaphore = Arc::new(Semaphore::new(self.config.concurrency));
        let mut workers: JoinSet<ItemOutcome> = JoinSet::new();
        let mut consumed = 0usize;

        while let Some(next) = stream.next().await {
            let item = match next {
                Ok(item) => item,
                Err(e) => {
                    warn!(error = %e, "source item failed");
                    summary.failed += 1;
                    continue;
                }
            };
            // An item already pulled when cancellation lands is still
            // accounted for.
            if cancel.is_cancelled() {
                debug!("cancellation observed, draining workers");
                summary.cancelled += 1;
                break;
            }
            if let Some(max) = self.config.max_items {
                if consumed >= max {
                    break;
                }
            }
            consumed += 1;

            let permit = semaphore
                .clone()
                .acquire_owned()
                .await
                .expect("semaphore never closed");
            let pipeline = self.clone();
            let cancel = cancel.clone();
            let bucket = params.bucket.clone();
            workers.spawn(async move {
                let _permit = permit;
                pipeline.process_item(item, bucket, cancel).await
            });
        }

        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok(ItemOutcome::Accepted) => summary.accepted += 1,
                Ok(ItemOutcome::Duplicate) => summary.duplicates += 1,
                Ok(ItemOutcome::Invalid(reason)) => {
                    debug!(%reason, "item invalid");
                    summary.invalid += 1;
                }
                Ok(ItemOutcome::Failed(reason)) => {
                    warn!(%reason, "item failed");
                    summary.failed += 1;
                }
                Ok(ItemOutcome::Cancelled) => summary.cancelled += 1,
                Err(e) => {
                    warn!(error = %e, "worker panicked");
                    summary.failed += 1;
                }
            }
        }

        // Scores and rankings are recomputed wholesale for the bucket,
        // then every artifact (new and previously failed) gets a
        // promotion pass.
        self.rank_and_promote(&params.bucket, &mut summary).await?;

        info!(
            bucket = %summary.bucket,
            accepted = summary.accepted,
            duplicates = summary.duplicates,
            invalid = summary.invalid,
            failed = summary.failed,
            cancelled = summary.cancelled,
            ranked = summary.ranked,
            abandoned = summary.abandoned.len(),
            "run complete"
        );

        Ok(summary)
    }

    /// Process one item end to end: canonicalize, reserve, localize
    /// media, write, confirm.
    async fn process_item(
        &self,
        mut item: SourceItem,
        bucket: String,
        cancel: CancellationToken,
    ) -> ItemOutcome {
        // Safe checkpoint: nothing reserved yet.
        if cancel.is_cancelled() {
            return ItemOutcome::Cancelled;
        }

        // The run's bucket is authoritative over whatever the adapter
        // stamped on the item.
        if item.bucket != bucket {
            debug!(item_bucket = %item.bucket, run_bucket = %bucket, "item bucket normalized");
            item.bucket = bucket;
        }

        let record = match canonicalize(&item) {
            Ok(record) => record,
            Err(PipelineError::InvalidItem { reason }) => return ItemOutcome::Invalid(reason),
            Err(e) => return ItemOutcome::Failed(e.to_string()),
        };

        let ledger_bucket = self
            .config
            .dedup_scope
            .ledger_bucket(&record.bucket)
            .to_string();

        match self
            .ledger
            .check_and_reserve(
                &ledger_bucket,
                &record.canonical_key,
                self.config.reservation_staleness,
            )
            .await
        {
            Ok(ReserveOutcome::Reserved) => {}
            Ok(ReserveOutcome::Duplicate) => {
                debug!(key = %record.canonical_key, bucket = %ledger_bucket, "duplicate");
                return ItemOutcome::Duplicate;
            }
            Err(e) => return ItemOutcome::Failed(e.to_string()),
        }

        // Reservation held: run to completion (confirm or release),
        // regardless of cancellation.
        match self.write_artifact(&item, &record).await {
            Ok(_) => {
                if let Err(e) = self
                    .ledger
                    .confirm(&ledger_bucket, &record.canonical_key, &record.content_hash)
                    .await
                {
                    return ItemOutcome::Failed(e.to_string());
                }
                ItemOutcome::Accepted
            }
            Err(e) => {
                if let Err(release_err) = self
                    .ledger
                    .release(&ledger_bucket, &record.canonical_key)
                    .await
                {
                    warn!(key = %record.canonical_key, error = %release_err, "release failed");
                }
                ItemOutcome::Failed(e.to_string())
            }
        }
    }

    /// Localize media and write the artifact, with bounded retries on
    /// the write itself.
    async fn write_artifact(&self, item: &SourceItem, record: &CanonicalRecord) -> Result<Artifact> {
        let mut media: Vec<MediaOutcome> = Vec::with_capacity(item.media_urls.len());
        for url in &item.media_urls {
            // Outbound requests are rate limited per logical source so
            // one throttling source never starves the others.
            self.limiter.until_key_ready(&item.source).await;
            media.push(self.media.fetch(url).await);
        }

        let mut metadata = ArtifactMetadata {
            canonical_key: record.canonical_key.clone(),
            bucket: record.bucket.clone(),
            source: item.source.clone(),
            title: item.title.clone(),
            url: item.url.clone(),
            tags: sorted(&item.tags),
            engagement: item.engagement.clone(),
            authority: item.authority,
            published_at: item.published_at,
            first_seen_at: record.first_seen_at,
            content_hash: record.content_hash.clone(),
            score: 0.0,
            metadata_revision: 1,
            media: Vec::new(),
        };
        metadata.score = quality_score(&metadata, &self.scoring, chrono::Utc::now());

        retry(
            &self.config.write_retry,
            |e: &PipelineError| matches!(e, PipelineError::Write { .. }),
            || self.writer.write(record, &item.body, metadata.clone(), &media),
        )
        .await
    }

    /// Recompute scores and the bucket ranking, then run a promotion
    /// pass over every artifact in the bucket.
    async fn rank_and_promote(&self, bucket: &str, summary: &mut RunSummary) -> Result<()> {
        let mut artifacts = self.writer.load_bucket(bucket).await?;
        if artifacts.is_empty() {
            return Ok(());
        }

        let now = chrono::Utc::now();
        for artifact in &mut artifacts {
            let fresh = quality_score(&artifact.metadata, &self.scoring, now);
            if (fresh - artifact.metadata.score).abs() > f64::EPSILON {
                self.writer.update_score(artifact, fresh).await?;
            }
        }

        let metadata: Vec<ArtifactMetadata> =
            artifacts.iter().map(|a| a.metadata.clone()).collect();
        let ranking = rank_bucket(bucket, &metadata, &self.scoring, now);
        summary.ranked = ranking.len();
        self.writer.write_ranking(bucket, &ranking).await?;

        for artifact in &artifacts {
            let report = self.promoter.promote(artifact).await?;
            if report.is_fully_promoted() {
                summary.fully_promoted += 1;
            }
            for record in report.abandoned() {
                let reason = match &record.status {
                    crate::types::PromotionStatus::Abandoned { reason } => reason.clone(),
                    _ => String::new(),
                };
                summary.abandoned.push(AbandonedPromotion {
                    canonical_key: record.canonical_key.clone(),
                    tier: record.tier,
                    reason,
                });
            }
        }

        Ok(())
    }
}

fn sorted(tags: &[String]) -> Vec<String> {
    let mut tags = tags.to_vec();
    tags.sort_unstable();
    tags.dedup();
    tags
}
