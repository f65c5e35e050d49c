//! Configuration types for the pipeline.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::retry::RetryPolicy;

/// Dedup scope policy for a source integration.
///
/// The same logical item may legitimately be `new` in two buckets (a
/// tool trending both "daily" and "weekly"). Sources that want exactly
/// one copy ever use `Global`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DedupScope {
    /// Dedup per `(bucket, canonical_key)` pair
    #[default]
    PerBucket,
    /// Dedup per `canonical_key` across all buckets
    Global,
}

impl DedupScope {
    /// Ledger partition used for a run's bucket under this scope.
    pub fn ledger_bucket<'a>(&self, bucket: &'a str) -> &'a str {
        match self {
            DedupScope::PerBucket => bucket,
            DedupScope::Global => "global",
        }
    }
}

/// Media fetching limits, consumed by `HttpMediaFetcher`.
#[derive(Debug, Clone)]
pub struct MediaConfig {
    /// Maximum bytes per asset; larger downloads are skipped
    pub max_bytes: u64,

    /// Per-URL fetch timeout
    pub timeout: Duration,

    /// Retry policy for transient media failures
    pub retry: RetryPolicy,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            max_bytes: 10 * 1024 * 1024,
            timeout: Duration::from_secs(20),
            retry: RetryPolicy::default(),
        }
    }
}

impl MediaConfig {
    /// Set the maximum asset size.
    pub fn with_max_bytes(mut self, max_bytes: u64) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    /// Set the per-URL timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the retry policy.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

/// Configuration for a pipeline instance.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Number of concurrent item workers
    pub concurrency: usize,

    /// Cap on items consumed from the source per run (None = all)
    pub max_items: Option<usize>,

    /// Dedup scope policy
    pub dedup_scope: DedupScope,

    /// Unconfirmed ledger reservations older than this are reclaimable
    pub reservation_staleness: chrono::Duration,

    /// Sustained request rate per logical source, per second
    pub source_rate_per_second: u32,

    /// Retry policy for artifact writes
    pub write_retry: RetryPolicy,

    /// Promotion attempts per tier before `Abandoned`
    pub promotion_attempt_ceiling: u32,

    /// Recency decay half-life for scoring, in hours
    pub recency_half_life_hours: f64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            concurrency: 8,
            max_items: None,
            dedup_scope: DedupScope::PerBucket,
            reservation_staleness: chrono::Duration::hours(1),
            source_rate_per_second: 4,
            write_retry: RetryPolicy::default(),
            promotion_attempt_ceiling: 5,
            recency_half_life_hours: 48.0,
        }
    }
}

impl PipelineConfig {
    /// Create a new config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set worker concurrency.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Cap the number of items consumed per run.
    pub fn with_max_items(mut self, max_items: usize) -> Self {
        self.max_items = Some(max_items);
        self
    }

    /// Set the dedup scope policy.
    pub fn with_dedup_scope(mut self, scope: DedupScope) -> Self {
        self.dedup_scope = scope;
        self
    }

    /// Set the reservation staleness window.
    pub fn with_reservation_staleness(mut self, window: chrono::Duration) -> Self {
        self.reservation_staleness = window;
        self
    }

    /// Set the per-source request rate.
    pub fn with_source_rate(mut self, per_second: u32) -> Self {
        self.source_rate_per_second = per_second.max(1);
        self
    }

    /// Set the promotion attempt ceiling.
    pub fn with_promotion_attempt_ceiling(mut self, ceiling: u32) -> Self {
        self.promotion_attempt_ceiling = ceiling.max(1);
        self
    }

    /// Set the recency half-life in hours.
    pub fn with_recency_half_life_hours(mut self, hours: f64) -> Self {
        self.recency_half_life_hours = hours;
        self
    }
}

/// Parameters for one logical run.
#[derive(Debug, Clone)]
pub struct RunParams {
    /// Bucket the run writes into (e.g. "daily")
    pub bucket: String,

    /// Source-specific options passed through to the adapter
    pub options: std::collections::HashMap<String, String>,
}

impl RunParams {
    /// Create params for a bucket.
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            options: std::collections::HashMap::new(),
        }
    }

    /// Add a source-specific option.
    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }
}
