//! Shared Scraper Ingestion Pipeline
//!
//! A source-agnostic ingestion library: adapters fetch items from
//! anywhere (trending repos, paper feeds, forums), the pipeline
//! canonicalizes them, drops duplicates through an atomic ledger,
//! archives accepted items as local artifacts with their media, scores
//! and ranks each bucket, and promotes artifacts into downstream
//! storage tiers.
//!
//! # Design Philosophy
//!
//! **"Sources differ, the pipeline doesn't"**
//!
//! - Adapters own fetching and parsing, the pipeline owns everything after
//! - Identity is canonical: one key per item, derived the same way everywhere
//! - Failures are isolated: a bad item, asset, or tier never sinks the run
//! - Every stage is resumable (reservations, promotion records, reruns)
//!
//! # Usage
//!
//! ```rust,ignore
//! use harvest::{
//!     ArtifactWriter, HttpMediaFetcher, MemoryLedger, Pipeline, PipelineConfig,
//!     RunParams, StoragePromoter,
//! };
//! use std::sync::Arc;
//!
//! let ledger = Arc::new(MemoryLedger::new());
//! let writer = ArtifactWriter::new("/var/lib/harvest");
//! let media = Arc::new(HttpMediaFetcher::new(Default::default()));
//! let promoter = StoragePromoter::new(blob, metadata, search, records);
//!
//! let pipeline = Pipeline::new(ledger, writer, media, promoter, PipelineConfig::default());
//! let summary = pipeline.run(&github_trending, &RunParams::new("daily")).await?;
//! if !summary.is_clean() {
//!     // abandoned promotions need operator follow-up
//! }
//! ```
//!
//! # Modules
//!
//! - [`traits`] - Core trait abstractions (SourceAdapter, DedupLedger, MediaFetcher, sinks)
//! - [`types`] - Items, artifacts, promotion records, configuration
//! - [`pipeline`] - Run orchestration with bounded concurrency
//! - [`canonical`] - Canonical keys and content hashing
//! - [`ledger`] - Dedup ledger implementations (memory, sqlite)
//! - [`writer`] - Staged atomic artifact layout on local disk
//! - [`media`] - HTTP media localization
//! - [`scoring`] - Quality scoring and bucket ranking
//! - [`promote`] - Storage tier promotion state machine
//! - [`stores`] - Storage tier sink implementations
//! - [`testing`] - Mock implementations for testing

pub mod canonical;
pub mod error;
pub mod ledger;
pub mod media;
pub mod pipeline;
pub mod promote;
pub mod retry;
pub mod scoring;
pub mod stores;
pub mod testing;
pub mod traits;
pub mod types;
pub mod writer;

// Re-export core types at crate root
pub use canonical::{canonicalize, slugify};
pub use error::{FetchError, PipelineError, PromotionError};
pub use ledger::{MemoryLedger, MemoryPromotionStore};
#[cfg(feature = "sqlite")]
pub use ledger::SqliteLedger;
pub use media::HttpMediaFetcher;
pub use pipeline::{AbandonedPromotion, Pipeline, RunSummary};
pub use promote::{PromotionReport, StoragePromoter};
pub use retry::{retry, RetryPolicy};
pub use scoring::{quality_score, rank_bucket, ScoringConfig};
pub use stores::{MemoryBlobStore, MemoryMetadataStore, MemorySearchIndex};
pub use traits::{
    ledger::{DedupLedger, DedupLedgerEntry, PromotionStore, ReserveOutcome},
    media::{FetchedMedia, MediaFetcher, MediaOutcome},
    sinks::{BlobStore, MetadataStore, SearchDoc, SearchIndex},
    source::{ItemStream, SourceAdapter},
};
pub use types::{
    Artifact, ArtifactMetadata, CanonicalRecord, DedupScope, MediaConfig, MediaEntry,
    MediaStatus, PipelineConfig, PromotionRecord, PromotionStatus, RankingEntry, RunParams,
    SourceItem, Tier,
};
pub use writer::{render_document, ArtifactWriter};
