//! Source adapter trait - the boundary to per-site scrapers.

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::error::FetchResult;
use crate::types::{RunParams, SourceItem};

/// Stream of items produced by a source adapter.
pub type ItemStream = BoxStream<'static, FetchResult<SourceItem>>;

/// A source of raw items for one logical run.
///
/// Adapters own all site-specific concerns (HTML parsing, auth,
/// pagination). The contract:
/// - `fetch` is restartable: re-invoking with the same params is safe
/// - the stream is lazy and finite
/// - the pipeline may stop consuming at any point
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Start fetching items for a run.
    async fn fetch(&self, params: &RunParams) -> FetchResult<ItemStream>;

    /// Adapter name (for logging/debugging).
    fn name(&self) -> &str {
        "unknown"
    }
}
