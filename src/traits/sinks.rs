//! Storage tier sinks consumed by the promoter.
//!
//! Three focused traits rather than one monolith, so deployments can
//! mix backends per tier. All sinks are expected to be idempotent on
//! their own keys; the promoter additionally guards with promotion
//! records so a `Succeeded` tier never sees another call.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::PromotionResult;
use crate::types::{Artifact, ArtifactMetadata};

/// Object blob store.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Upload bytes under `namespace/key`.
    async fn put(&self, namespace: &str, key: &str, bytes: Vec<u8>) -> PromotionResult<()>;

    /// Check for an existing blob without downloading it.
    async fn exists(&self, namespace: &str, key: &str) -> PromotionResult<bool>;
}

/// Relational metadata store, keyed by canonical key so repeated
/// promotion attempts converge instead of duplicating rows.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// Insert or update the metadata row for an artifact.
    async fn upsert(&self, canonical_key: &str, metadata: &ArtifactMetadata) -> PromotionResult<()>;
}

/// Searchable projection of an artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchDoc {
    /// Artifact title, if any
    pub title: Option<String>,

    /// Full document text
    pub body: String,

    /// Tags for faceting
    pub tags: Vec<String>,

    /// Bucket for scoping queries
    pub bucket: String,
}

impl SearchDoc {
    /// Build the searchable projection of an artifact.
    pub fn from_artifact(artifact: &Artifact) -> Self {
        Self {
            title: artifact.metadata.title.clone(),
            body: artifact.document.clone(),
            tags: artifact.metadata.tags.clone(),
            bucket: artifact.metadata.bucket.clone(),
        }
    }
}

/// Full-text search index with overwrite semantics: re-indexing the
/// same key replaces the previous document.
#[async_trait]
pub trait SearchIndex: Send + Sync {
    /// Index (or re-index) a document.
    async fn index_document(&self, canonical_key: &str, doc: &SearchDoc) -> PromotionResult<()>;
}
