//! Media fetcher trait - per-URL download outcomes.

use async_trait::async_trait;

use crate::types::{MediaEntry, MediaStatus};

/// A downloaded media asset, in memory before the writer persists it.
#[derive(Debug, Clone)]
pub struct FetchedMedia {
    /// Original remote URL
    pub url: String,

    /// Filename derived from the URL path
    pub file_name: String,

    /// Asset bytes
    pub bytes: Vec<u8>,

    /// Content type reported by the server
    pub content_type: Option<String>,
}

/// Per-URL outcome of a media fetch.
///
/// One failed asset never fails the parent artifact; the writer records
/// the outcome and the document keeps the remote URL as fallback.
#[derive(Debug, Clone)]
pub enum MediaOutcome {
    /// Asset retrieved within limits
    Downloaded(FetchedMedia),
    /// Rejected by the size guard before buffering
    SkippedTooLarge { url: String, size: u64 },
    /// Fetch failed after bounded retries
    Failed { url: String, reason: String },
}

impl MediaOutcome {
    /// The remote URL this outcome is about.
    pub fn url(&self) -> &str {
        match self {
            MediaOutcome::Downloaded(media) => &media.url,
            MediaOutcome::SkippedTooLarge { url, .. } => url,
            MediaOutcome::Failed { url, .. } => url,
        }
    }

    /// Convert to a metadata entry; `local_path` is set by the writer
    /// once the bytes are on disk.
    pub fn to_entry(&self, local_path: Option<String>) -> MediaEntry {
        match self {
            MediaOutcome::Downloaded(media) => MediaEntry {
                url: media.url.clone(),
                local_path,
                bytes: Some(media.bytes.len() as u64),
                content_type: media.content_type.clone(),
                status: MediaStatus::Downloaded,
            },
            MediaOutcome::SkippedTooLarge { url, size } => MediaEntry {
                url: url.clone(),
                local_path: None,
                bytes: None,
                content_type: None,
                status: MediaStatus::SkippedTooLarge { size: *size },
            },
            MediaOutcome::Failed { url, reason } => MediaEntry {
                url: url.clone(),
                local_path: None,
                bytes: None,
                content_type: None,
                status: MediaStatus::Failed {
                    reason: reason.clone(),
                },
            },
        }
    }
}

/// Downloads auxiliary binary assets referenced by an artifact.
///
/// Each URL is fetched independently with its own timeout and retry
/// budget. Implementations never return an error - failures are data.
#[async_trait]
pub trait MediaFetcher: Send + Sync {
    /// Fetch one asset.
    async fn fetch(&self, url: &str) -> MediaOutcome;

    /// Fetch a list of assets, one outcome per URL, order preserved.
    async fn fetch_all(&self, urls: &[String]) -> Vec<MediaOutcome> {
        let mut outcomes = Vec::with_capacity(urls.len());
        for url in urls {
            outcomes.push(self.fetch(url).await);
        }
        outcomes
    }

    /// Fetcher name (for logging/debugging).
    fn name(&self) -> &str {
        "unknown"
    }
}
