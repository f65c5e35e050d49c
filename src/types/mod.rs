//! Data types shared across the pipeline.

pub mod artifact;
pub mod config;
pub mod item;
pub mod promotion;
pub mod ranking;

pub use artifact::{Artifact, ArtifactMetadata, MediaEntry, MediaStatus};
pub use config::{DedupScope, MediaConfig, PipelineConfig, RunParams};
pub use item::{CanonicalRecord, SourceItem};
pub use promotion::{PromotionRecord, PromotionStatus, Tier};
pub use ranking::RankingEntry;
