//! HTTP media fetcher with size guard and bounded retries.

use async_trait::async_trait;
use futures::StreamExt;
use tracing::{debug, warn};
use url::Url;

use crate::error::{FetchError, FetchResult};
use crate::retry::retry;
use crate::traits::media::{FetchedMedia, MediaFetcher, MediaOutcome};
use crate::types::MediaConfig;

/// Fetches media assets over HTTP.
///
/// Each URL gets its own timeout and retry budget; the size guard
/// rejects oversized bodies before buffering them (Content-Length when
/// present, streamed byte counting otherwise).
pub struct HttpMediaFetcher {
    client: reqwest::Client,
    config: MediaConfig,
}

impl HttpMediaFetcher {
    /// Create a fetcher with the given limits.
    pub fn new(config: MediaConfig) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(config.timeout)
                .build()
                .expect("reqwest client with static config"),
            config,
        }
    }

    /// Use a custom HTTP client (timeout still applied per request).
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    async fn fetch_once(&self, url: &str) -> FetchResult<FetchedMedia> {
        debug!(url = %url, "media fetch starting");
        let response = self
            .client
            .get(url)
            .timeout(self.config.timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    FetchError::Timeout {
                        url: url.to_string(),
                    }
                } else {
                    FetchError::Http(Box::new(e))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        // Reject on the declared length before reading anything.
        if let Some(length) = response.content_length() {
            if length > self.config.max_bytes {
                return Err(FetchError::TooLarge {
                    size: length,
                    max: self.config.max_bytes,
                });
            }
        }

        let content_type = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        // Servers lie about Content-Length; count while streaming too.
        let mut bytes = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| FetchError::Http(Box::new(e)))?;
            if (bytes.len() + chunk.len()) as u64 > self.config.max_bytes {
                return Err(FetchError::TooLarge {
                    size: (bytes.len() + chunk.len()) as u64,
                    max: self.config.max_bytes,
                });
            }
            bytes.extend_from_slice(&chunk);
        }

        Ok(FetchedMedia {
            url: url.to_string(),
            file_name: file_name_for(url),
            bytes,
            content_type,
        })
    }
}

#[async_trait]
impl MediaFetcher for HttpMediaFetcher {
    async fn fetch(&self, url: &str) -> MediaOutcome {
        if Url::parse(url).is_err() {
            return MediaOutcome::Failed {
                url: url.to_string(),
                reason: "invalid URL".to_string(),
            };
        }

        let result = retry(&self.config.retry, FetchError::is_transient, || {
            self.fetch_once(url)
        })
        .await;

        match result {
            Ok(media) => MediaOutcome::Downloaded(media),
            Err(FetchError::TooLarge { size, .. }) => {
                debug!(url = %url, size, "media skipped by size guard");
                MediaOutcome::SkippedTooLarge {
                    url: url.to_string(),
                    size,
                }
            }
            Err(e) => {
                warn!(url = %url, error = %e, "media fetch failed");
                MediaOutcome::Failed {
                    url: url.to_string(),
                    reason: e.to_string(),
                }
            }
        }
    }

    fn name(&self) -> &str {
        "http"
    }
}

/// Derive a local filename from the URL's last path segment.
fn file_name_for(url: &str) -> String {
    let segment = Url::parse(url)
        .ok()
        .and_then(|u| {
            u.path_segments()
                .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
                .map(|s| s.to_string())
        })
        .unwrap_or_default();

    let cleaned: String = segment
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();

    if cleaned.is_empty() || cleaned.trim_matches('.').is_empty() {
        "asset".to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_name_from_url() {
        assert_eq!(file_name_for("https://cdn.example.com/img/logo.png"), "logo.png");
        assert_eq!(file_name_for("https://cdn.example.com/img/"), "img");
        assert_eq!(file_name_for("https://cdn.example.com/"), "asset");
        assert_eq!(
            file_name_for("https://cdn.example.com/a%20b.png"),
            "a_20b.png"
        );
    }

    #[tokio::test]
    async fn test_invalid_url_fails_without_network() {
        let fetcher = HttpMediaFetcher::new(MediaConfig::default());
        let outcome = fetcher.fetch("not a url").await;
        assert!(matches!(outcome, MediaOutcome::Failed { .. }));
    }
}
