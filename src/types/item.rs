//! Source items and canonical records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A raw fetched item as handed over by a source adapter.
///
/// Ephemeral: owned by the adapter until it enters the pipeline, then
/// consumed by canonicalization. Per-site parsing happens upstream;
/// the pipeline only sees this structured form.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceItem {
    /// Logical source name (e.g. "github-trending"). Also the
    /// rate-limiting key.
    pub source: String,

    /// Stable external identifier if the source provides one
    /// (e.g. "rust-lang/rust", an arXiv id)
    pub external_id: Option<String>,

    /// Item URL if available
    pub url: Option<String>,

    /// Item title if available
    pub title: Option<String>,

    /// Raw content body (text or markdown)
    pub body: String,

    /// Free-form tags (topics, categories)
    #[serde(default)]
    pub tags: Vec<String>,

    /// Engagement counters by name (stars, comments, upvotes, ...)
    #[serde(default)]
    pub engagement: BTreeMap<String, u64>,

    /// Source authority weight in 0.0..=1.0 (default 0.5)
    pub authority: f64,

    /// When the content was originally published, if known
    pub published_at: Option<DateTime<Utc>>,

    /// When the item was fetched
    pub fetched_at: DateTime<Utc>,

    /// Logical dedup bucket (e.g. "daily", "weekly", a feed name)
    pub bucket: String,

    /// Media URLs referenced by the item (images, attachments)
    #[serde(default)]
    pub media_urls: Vec<String>,
}

impl SourceItem {
    /// Create a new item with minimal fields.
    pub fn new(
        source: impl Into<String>,
        bucket: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            source: source.into(),
            external_id: None,
            url: None,
            title: None,
            body: body.into(),
            tags: Vec::new(),
            engagement: BTreeMap::new(),
            authority: 0.5,
            published_at: None,
            fetched_at: Utc::now(),
            bucket: bucket.into(),
            media_urls: Vec::new(),
        }
    }

    /// Set the stable external identifier.
    pub fn with_external_id(mut self, id: impl Into<String>) -> Self {
        self.external_id = Some(id.into());
        self
    }

    /// Set the item URL.
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Set the title.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Add a tag.
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    /// Set an engagement counter.
    pub fn with_engagement(mut self, name: impl Into<String>, count: u64) -> Self {
        self.engagement.insert(name.into(), count);
        self
    }

    /// Set the source authority weight.
    pub fn with_authority(mut self, authority: f64) -> Self {
        self.authority = authority;
        self
    }

    /// Set the publication timestamp.
    pub fn with_published_at(mut self, at: DateTime<Utc>) -> Self {
        self.published_at = Some(at);
        self
    }

    /// Add a media URL.
    pub fn with_media_url(mut self, url: impl Into<String>) -> Self {
        self.media_urls.push(url.into());
        self
    }

    /// Total engagement across all counters.
    pub fn total_engagement(&self) -> u64 {
        self.engagement.values().sum()
    }

    /// Check if this item has content.
    pub fn has_content(&self) -> bool {
        !self.body.trim().is_empty()
    }
}

/// Stable identity and content fingerprint of a source item.
///
/// `canonical_key` is unique within a bucket's ledger. A changed
/// `content_hash` under a stable key is an edit, never a new identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalRecord {
    /// Stable identifier derived from the item's natural identifier
    pub canonical_key: String,

    /// SHA-256 over the normalized content projection
    pub content_hash: String,

    /// Dedup bucket the item arrived in
    pub bucket: String,

    /// When this identity was first observed
    pub first_seen_at: DateTime<Utc>,
}
