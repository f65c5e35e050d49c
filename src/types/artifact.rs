//! Artifacts - the durable local representation of an accepted item.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Outcome of localizing one media asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum MediaStatus {
    /// Stored under the artifact's media directory
    Downloaded,
    /// Rejected before download by the size guard
    SkippedTooLarge { size: u64 },
    /// Download failed; document falls back to the remote URL
    Failed { reason: String },
}

/// One media asset referenced by an artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaEntry {
    /// Original remote URL
    pub url: String,

    /// Path relative to the artifact directory, when downloaded
    pub local_path: Option<String>,

    /// Byte size on disk, when downloaded
    pub bytes: Option<u64>,

    /// Content type as reported by the server
    pub content_type: Option<String>,

    /// Localization outcome
    pub status: MediaStatus,
}

impl MediaEntry {
    /// Whether the asset was localized.
    pub fn is_downloaded(&self) -> bool {
        matches!(self.status, MediaStatus::Downloaded)
    }
}

/// Structured metadata stored alongside an artifact's document body.
///
/// Immutable after creation except for score recomputation, which bumps
/// `metadata_revision` instead of rewriting history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactMetadata {
    /// Canonical key of the item
    pub canonical_key: String,

    /// Bucket the artifact belongs to
    pub bucket: String,

    /// Logical source name
    pub source: String,

    /// Item title if available
    pub title: Option<String>,

    /// Original item URL if available
    pub url: Option<String>,

    /// Tags, sorted for stable output
    pub tags: Vec<String>,

    /// Engagement counters by name
    pub engagement: BTreeMap<String, u64>,

    /// Source authority weight in 0.0..=1.0
    pub authority: f64,

    /// When the content was originally published, if known
    pub published_at: Option<DateTime<Utc>>,

    /// When this identity was first accepted
    pub first_seen_at: DateTime<Utc>,

    /// SHA-256 over the normalized content projection
    pub content_hash: String,

    /// Computed quality score (0..=100)
    pub score: f64,

    /// Bumped on every score recomputation
    pub metadata_revision: u32,

    /// Per-asset media outcomes
    #[serde(default)]
    pub media: Vec<MediaEntry>,
}

impl ArtifactMetadata {
    /// Count of successfully localized media assets.
    pub fn downloaded_media(&self) -> usize {
        self.media.iter().filter(|m| m.is_downloaded()).count()
    }

    /// Count of media assets that could not be localized.
    pub fn failed_media(&self) -> usize {
        self.media.len() - self.downloaded_media()
    }
}

/// A fully written artifact: document body, metadata, media files.
#[derive(Debug, Clone)]
pub struct Artifact {
    /// Final directory on disk
    pub path: PathBuf,

    /// Document body as written to `document.md`
    pub document: String,

    /// Parsed `metadata.json`
    pub metadata: ArtifactMetadata,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata_with_media(media: Vec<MediaEntry>) -> ArtifactMetadata {
        ArtifactMetadata {
            canonical_key: "src:1".into(),
            bucket: "daily".into(),
            source: "src".into(),
            title: None,
            url: None,
            tags: vec![],
            engagement: BTreeMap::new(),
            authority: 0.5,
            published_at: None,
            first_seen_at: Utc::now(),
            content_hash: "abc".into(),
            score: 0.0,
            metadata_revision: 1,
            media,
        }
    }

    #[test]
    fn test_media_counts() {
        let metadata = metadata_with_media(vec![
            MediaEntry {
                url: "https://a/1.png".into(),
                local_path: Some("media/1.png".into()),
                bytes: Some(10),
                content_type: Some("image/png".into()),
                status: MediaStatus::Downloaded,
            },
            MediaEntry {
                url: "https://a/2.png".into(),
                local_path: None,
                bytes: None,
                content_type: None,
                status: MediaStatus::Failed {
                    reason: "timeout".into(),
                },
            },
        ]);

        assert_eq!(metadata.downloaded_media(), 1);
        assert_eq!(metadata.failed_media(), 1);
    }
}
