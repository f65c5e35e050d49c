//! Quality scoring and ranking.
//!
//! Pure functions over artifact metadata. For a fixed input set and
//! reference time the output is identical across invocations, including
//! tie-break order.

use chrono::{DateTime, Utc};

use crate::types::{ArtifactMetadata, RankingEntry};

/// Scoring weights and decay parameters.
#[derive(Debug, Clone)]
pub struct ScoringConfig {
    /// Recency decay half-life in hours
    pub half_life_hours: f64,

    /// Share of the score driven by engagement (the rest is recency)
    pub engagement_weight: f64,

    /// Engagement count at which the engagement component saturates
    pub engagement_saturation: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            half_life_hours: 48.0,
            engagement_weight: 0.6,
            engagement_saturation: 10_000.0,
        }
    }
}

impl ScoringConfig {
    /// Config with the given half-life.
    pub fn with_half_life_hours(mut self, hours: f64) -> Self {
        self.half_life_hours = hours.max(f64::EPSILON);
        self
    }
}

/// Compute the quality score for one artifact, in 0..=100.
///
/// Log-scaled engagement and exponentially decayed recency, blended by
/// `engagement_weight`, then multiplied by the source authority. Items
/// with no `published_at` decay from `first_seen_at`.
pub fn quality_score(
    metadata: &ArtifactMetadata,
    config: &ScoringConfig,
    now: DateTime<Utc>,
) -> f64 {
    let total = metadata
        .engagement
        .values()
        .fold(0u64, |acc, v| acc.saturating_add(*v));
    let engagement = (1.0 + total as f64).ln() / (1.0 + config.engagement_saturation).ln();
    let engagement = engagement.min(1.0);

    let published = metadata.published_at.unwrap_or(metadata.first_seen_at);
    let age_hours = (now - published).num_seconds().max(0) as f64 / 3600.0;
    let recency = 0.5f64.powf(age_hours / config.half_life_hours);

    let blended = config.engagement_weight * engagement
        + (1.0 - config.engagement_weight) * recency;

    (blended * metadata.authority.clamp(0.0, 1.0) * 100.0).clamp(0.0, 100.0)
}

/// Recompute the full ranking for a bucket.
///
/// Wholesale recompute, never incremental: ordered by score descending,
/// ties broken by canonical key lexical order.
pub fn rank_bucket(
    bucket: &str,
    artifacts: &[ArtifactMetadata],
    config: &ScoringConfig,
    now: DateTime<Utc>,
) -> Vec<RankingEntry> {
    let mut scored: Vec<(String, f64)> = artifacts
        .iter()
        .map(|m| (m.canonical_key.clone(), quality_score(m, config, now)))
        .collect();

    scored.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.0.cmp(&b.0))
    });

    scored
        .into_iter()
        .enumerate()
        .map(|(i, (canonical_key, score))| RankingEntry {
            bucket: bucket.to_string(),
            canonical_key,
            score,
            rank: (i + 1) as u32,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::BTreeMap;

    fn metadata(key: &str, engagement: u64, age_hours: i64, authority: f64) -> ArtifactMetadata {
        let now = Utc::now();
        let mut counters = BTreeMap::new();
        counters.insert("stars".to_string(), engagement);
        ArtifactMetadata {
            canonical_key: key.to_string(),
            bucket: "daily".into(),
            source: "src".into(),
            title: None,
            url: None,
            tags: vec![],
            engagement: counters,
            authority,
            published_at: Some(now - chrono::Duration::hours(age_hours)),
            first_seen_at: now,
            content_hash: "h".into(),
            score: 0.0,
            metadata_revision: 1,
            media: vec![],
        }
    }

    #[test]
    fn test_score_bounded() {
        let config = ScoringConfig::default();
        let now = Utc::now();

        let max = metadata("k", u64::MAX / 2, 0, 1.0);
        let min = metadata("k", 0, 1_000_000, 0.0);

        assert!(quality_score(&max, &config, now) <= 100.0);
        assert!(quality_score(&min, &config, now) >= 0.0);
    }

    #[test]
    fn test_engagement_overflow_saturates() {
        let config = ScoringConfig::default();
        let mut m = metadata("k", u64::MAX, 0, 1.0);
        m.engagement.insert("forks".to_string(), u64::MAX);

        let score = quality_score(&m, &config, Utc::now());
        assert!((0.0..=100.0).contains(&score));
    }

    #[test]
    fn test_newer_outranks_older_all_else_equal() {
        let config = ScoringConfig::default();
        let now = Utc::now();

        let newer = metadata("a", 100, 1, 0.8);
        let older = metadata("b", 100, 72, 0.8);

        assert!(quality_score(&newer, &config, now) > quality_score(&older, &config, now));
    }

    #[test]
    fn test_more_engagement_scores_higher() {
        let config = ScoringConfig::default();
        let now = Utc::now();

        let popular = metadata("a", 5000, 24, 0.8);
        let quiet = metadata("b", 3, 24, 0.8);

        assert!(quality_score(&popular, &config, now) > quality_score(&quiet, &config, now));
    }

    #[test]
    fn test_ranking_deterministic_with_tie_break() {
        let config = ScoringConfig::default();
        let now = Utc::now();

        // Identical signals: scores tie, keys decide the order.
        let artifacts = vec![
            metadata("src:zebra", 10, 5, 0.5),
            metadata("src:alpha", 10, 5, 0.5),
            metadata("src:mid", 10, 5, 0.5),
        ];

        let first = rank_bucket("daily", &artifacts, &config, now);
        let second = rank_bucket("daily", &artifacts, &config, now);

        assert_eq!(first, second);
        assert_eq!(first[0].canonical_key, "src:alpha");
        assert_eq!(first[1].canonical_key, "src:mid");
        assert_eq!(first[2].canonical_key, "src:zebra");
        assert_eq!(first[0].rank, 1);
        assert_eq!(first[2].rank, 3);
    }

    #[test]
    fn test_ranking_orders_by_score() {
        let config = ScoringConfig::default();
        let now = Utc::now();

        let artifacts = vec![
            metadata("src:quiet", 1, 48, 0.5),
            metadata("src:hot", 8000, 2, 0.9),
        ];

        let ranking = rank_bucket("daily", &artifacts, &config, now);
        assert_eq!(ranking[0].canonical_key, "src:hot");
        assert!(ranking[0].score > ranking[1].score);
    }

    proptest! {
        #[test]
        fn prop_score_always_in_range(
            engagement in 0u64..10_000_000,
            age_hours in 0i64..100_000,
            authority in 0.0f64..=1.0,
        ) {
            let config = ScoringConfig::default();
            let now = Utc::now();
            let m = metadata("k", engagement, age_hours, authority);
            let score = quality_score(&m, &config, now);
            prop_assert!((0.0..=100.0).contains(&score));
        }
    }
}
