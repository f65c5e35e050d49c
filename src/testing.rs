//! Testing utilities including mock implementations.
//!
//! Useful for testing integrations without network calls: a scripted
//! source adapter, a scripted media fetcher, and fault-injecting sink
//! wrappers. All mocks track calls for assertions.

use async_trait::async_trait;
use futures::StreamExt;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use crate::error::{FetchError, FetchResult, PromotionResult};
use crate::traits::media::{FetchedMedia, MediaFetcher, MediaOutcome};
use crate::traits::sinks::BlobStore;
use crate::traits::source::{ItemStream, SourceAdapter};
use crate::types::{RunParams, SourceItem};

/// A scripted source adapter.
///
/// Yields its configured items in order on every `fetch` call, which
/// makes it restartable by construction.
#[derive(Default)]
pub struct MockSource {
    items: Vec<SourceItem>,
    /// Errors yielded after the items (to exercise adapter failures)
    trailing_errors: Vec<String>,
    fetch_calls: Arc<AtomicU32>,
}

impl MockSource {
    /// Create an empty source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an item to yield.
    pub fn with_item(mut self, item: SourceItem) -> Self {
        self.items.push(item);
        self
    }

    /// Add a transient error yielded after all items.
    pub fn with_trailing_error(mut self, reason: impl Into<String>) -> Self {
        self.trailing_errors.push(reason.into());
        self
    }

    /// Number of `fetch` invocations so far.
    pub fn fetch_calls(&self) -> u32 {
        self.fetch_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SourceAdapter for MockSource {
    async fn fetch(&self, _params: &RunParams) -> FetchResult<ItemStream> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        let items = self.items.clone();
        let errors = self.trailing_errors.clone();

        let stream = async_stream::stream! {
            for item in items {
                yield Ok(item);
            }
            for reason in errors {
                yield Err(FetchError::Http(reason.into()));
            }
        };
        Ok(stream.boxed())
    }

    fn name(&self) -> &str {
        "mock"
    }
}

/// A scripted media fetcher.
///
/// Unconfigured URLs succeed with a small deterministic payload;
/// specific URLs can be scripted to fail or get skipped.
#[derive(Default)]
pub struct MockMediaFetcher {
    outcomes: RwLock<HashMap<String, MediaOutcome>>,
    calls: Mutex<Vec<String>>,
}

impl MockMediaFetcher {
    /// Create a fetcher where every URL succeeds.
    pub fn new() -> Self {
        Self::default()
    }

    /// Script an outcome for a URL.
    pub fn with_outcome(self, url: impl Into<String>, outcome: MediaOutcome) -> Self {
        self.outcomes.write().unwrap().insert(url.into(), outcome);
        self
    }

    /// Script a failure for a URL.
    pub fn with_failure(self, url: impl Into<String>, reason: impl Into<String>) -> Self {
        let url = url.into();
        let outcome = MediaOutcome::Failed {
            url: url.clone(),
            reason: reason.into(),
        };
        self.with_outcome(url, outcome)
    }

    /// URLs fetched so far, in order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl MediaFetcher for MockMediaFetcher {
    async fn fetch(&self, url: &str) -> MediaOutcome {
        self.calls.lock().unwrap().push(url.to_string());

        if let Some(outcome) = self.outcomes.read().unwrap().get(url) {
            return outcome.clone();
        }

        let file_name = url
            .rsplit('/')
            .find(|s| !s.is_empty())
            .unwrap_or("asset")
            .to_string();
        MediaOutcome::Downloaded(FetchedMedia {
            url: url.to_string(),
            file_name,
            bytes: url.as_bytes().to_vec(),
            content_type: Some("application/octet-stream".into()),
        })
    }

    fn name(&self) -> &str {
        "mock"
    }
}

/// Blob store wrapper that fails the first `failures` puts.
///
/// `exists` passes through untouched, so promotion retry paths can be
/// exercised deterministically.
pub struct FlakyBlobStore {
    inner: Arc<dyn BlobStore>,
    remaining_failures: AtomicU32,
}

impl FlakyBlobStore {
    /// Wrap a store, failing the first `failures` put calls.
    pub fn new(inner: Arc<dyn BlobStore>, failures: u32) -> Self {
        Self {
            inner,
            remaining_failures: AtomicU32::new(failures),
        }
    }
}

#[async_trait]
impl BlobStore for FlakyBlobStore {
    async fn put(&self, namespace: &str, key: &str, bytes: Vec<u8>) -> PromotionResult<()> {
        let remaining = self.remaining_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            // Saturating: u32::MAX means "fail forever".
            if remaining != u32::MAX {
                self.remaining_failures.fetch_sub(1, Ordering::SeqCst);
            }
            return Err(crate::error::PromotionError::Blob(
                "injected blob failure".into(),
            ));
        }
        self.inner.put(namespace, key, bytes).await
    }

    async fn exists(&self, namespace: &str, key: &str) -> PromotionResult<bool> {
        self.inner.exists(namespace, key).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_source_restartable() {
        let source = MockSource::new()
            .with_item(SourceItem::new("s", "daily", "one").with_external_id("1"))
            .with_item(SourceItem::new("s", "daily", "two").with_external_id("2"));

        let params = RunParams::new("daily");
        for _ in 0..2 {
            let items: Vec<_> = source.fetch(&params).await.unwrap().collect().await;
            assert_eq!(items.len(), 2);
            assert!(items.iter().all(|i| i.is_ok()));
        }
        assert_eq!(source.fetch_calls(), 2);
    }

    #[tokio::test]
    async fn test_mock_media_default_and_scripted() {
        let fetcher = MockMediaFetcher::new().with_failure("https://cdn/broken.png", "boom");

        let outcomes = fetcher
            .fetch_all(&[
                "https://cdn/fine.png".to_string(),
                "https://cdn/broken.png".to_string(),
            ])
            .await;

        assert!(matches!(outcomes[0], MediaOutcome::Downloaded(_)));
        assert!(matches!(outcomes[1], MediaOutcome::Failed { .. }));
        assert_eq!(fetcher.calls().len(), 2);
    }
}
