//! Core trait abstractions at the pipeline's seams.

pub mod ledger;
pub mod media;
pub mod sinks;
pub mod source;

pub use ledger::{DedupLedger, DedupLedgerEntry, PromotionStore, ReserveOutcome};
pub use media::{FetchedMedia, MediaFetcher, MediaOutcome};
pub use sinks::{BlobStore, MetadataStore, SearchDoc, SearchIndex};
pub use source::{ItemStream, SourceAdapter};
