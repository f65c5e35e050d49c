//! Typed errors for the ingestion pipeline.
//!
//! Uses `thiserror` for library errors (not `anyhow`) to provide
//! strongly-typed, composable error handling.

use thiserror::Error;

/// Errors that can occur while processing a run.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Fetch from a source or media URL failed
    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),

    /// Item is missing a usable natural identifier
    #[error("invalid item: {reason}")]
    InvalidItem { reason: String },

    /// Artifact write failed after retries
    #[error("write failed for {canonical_key}: {reason}")]
    Write {
        canonical_key: String,
        reason: String,
    },

    /// Ledger operation failed
    #[error("ledger error: {0}")]
    Ledger(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Storage promotion failed
    #[error("promotion failed: {0}")]
    Promotion(#[from] PromotionError),

    /// Run was cancelled
    #[error("run cancelled")]
    Cancelled,

    /// Configuration error (aborts the run)
    #[error("config error: {0}")]
    Config(String),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Local filesystem error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors that can occur while fetching over the network.
///
/// Fetch errors are transient by default and go through the shared
/// retry policy; the exceptions are `TooLarge` and `InvalidUrl`.
#[derive(Debug, Error)]
pub enum FetchError {
    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Non-success HTTP status
    #[error("HTTP status {status} for {url}")]
    Status { status: u16, url: String },

    /// Connection or read timeout
    #[error("timeout fetching: {url}")]
    Timeout { url: String },

    /// Body exceeds the configured size cap
    #[error("body too large: {size} bytes (max {max})")]
    TooLarge { size: u64, max: u64 },

    /// Invalid URL format
    #[error("invalid URL: {url}")]
    InvalidUrl { url: String },
}

impl FetchError {
    /// Whether a retry could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            FetchError::Http(_) | FetchError::Timeout { .. } => true,
            // 5xx and 429 are worth retrying; other statuses are not
            FetchError::Status { status, .. } => *status >= 500 || *status == 429,
            FetchError::TooLarge { .. } | FetchError::InvalidUrl { .. } => false,
        }
    }
}

/// Errors raised by storage tier sinks during promotion.
#[derive(Debug, Error)]
pub enum PromotionError {
    /// Blob store rejected the upload
    #[error("blob store error: {0}")]
    Blob(String),

    /// Metadata store upsert failed
    #[error("metadata store error: {0}")]
    Metadata(String),

    /// Search index rejected the document
    #[error("search index error: {0}")]
    Search(String),

    /// Promotion state could not be loaded or saved
    #[error("promotion store error: {0}")]
    Store(String),
}

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Result type alias for network fetches.
pub type FetchResult<T> = std::result::Result<T, FetchError>;

/// Result type alias for promotion operations.
pub type PromotionResult<T> = std::result::Result<T, PromotionError>;
