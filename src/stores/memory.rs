//! In-memory tier sinks for testing and local development.
//!
//! Each sink tracks call counts so tests can assert promotion
//! idempotency (a succeeded tier must never see another call).

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use crate::error::PromotionResult;
use crate::traits::sinks::{BlobStore, MetadataStore, SearchDoc, SearchIndex};
use crate::types::ArtifactMetadata;

/// In-memory blob store.
pub struct MemoryBlobStore {
    blobs: Mutex<HashMap<(String, String), Vec<u8>>>,
    put_calls: AtomicU32,
    exists_calls: AtomicU32,
}

impl Default for MemoryBlobStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBlobStore {
    /// Create a new empty blob store.
    pub fn new() -> Self {
        Self {
            blobs: Mutex::new(HashMap::new()),
            put_calls: AtomicU32::new(0),
            exists_calls: AtomicU32::new(0),
        }
    }

    /// Number of stored blobs.
    pub fn blob_count(&self) -> usize {
        self.blobs.lock().unwrap().len()
    }

    /// Total `put` calls observed.
    pub fn put_calls(&self) -> u32 {
        self.put_calls.load(Ordering::SeqCst)
    }

    /// Total `exists` calls observed.
    pub fn exists_calls(&self) -> u32 {
        self.exists_calls.load(Ordering::SeqCst)
    }

    /// Fetch a stored blob (test helper).
    pub fn get(&self, namespace: &str, key: &str) -> Option<Vec<u8>> {
        self.blobs
            .lock()
            .unwrap()
            .get(&(namespace.to_string(), key.to_string()))
            .cloned()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(&self, namespace: &str, key: &str, bytes: Vec<u8>) -> PromotionResult<()> {
        self.put_calls.fetch_add(1, Ordering::SeqCst);
        self.blobs
            .lock()
            .unwrap()
            .insert((namespace.to_string(), key.to_string()), bytes);
        Ok(())
    }

    async fn exists(&self, namespace: &str, key: &str) -> PromotionResult<bool> {
        self.exists_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .blobs
            .lock()
            .unwrap()
            .contains_key(&(namespace.to_string(), key.to_string())))
    }
}

/// In-memory metadata store keyed by canonical key.
pub struct MemoryMetadataStore {
    rows: Mutex<HashMap<String, ArtifactMetadata>>,
    upsert_calls: AtomicU32,
}

impl Default for MemoryMetadataStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryMetadataStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self {
            rows: Mutex::new(HashMap::new()),
            upsert_calls: AtomicU32::new(0),
        }
    }

    /// Number of rows (upserts converge, so this equals distinct keys).
    pub fn row_count(&self) -> usize {
        self.rows.lock().unwrap().len()
    }

    /// Total `upsert` calls observed.
    pub fn upsert_calls(&self) -> u32 {
        self.upsert_calls.load(Ordering::SeqCst)
    }

    /// Fetch a stored row (test helper).
    pub fn get(&self, canonical_key: &str) -> Option<ArtifactMetadata> {
        self.rows.lock().unwrap().get(canonical_key).cloned()
    }
}

#[async_trait]
impl MetadataStore for MemoryMetadataStore {
    async fn upsert(&self, canonical_key: &str, metadata: &ArtifactMetadata) -> PromotionResult<()> {
        self.upsert_calls.fetch_add(1, Ordering::SeqCst);
        self.rows
            .lock()
            .unwrap()
            .insert(canonical_key.to_string(), metadata.clone());
        Ok(())
    }
}

/// In-memory search index with overwrite semantics.
pub struct MemorySearchIndex {
    docs: Mutex<HashMap<String, SearchDoc>>,
    index_calls: AtomicU32,
}

impl Default for MemorySearchIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl MemorySearchIndex {
    /// Create a new empty index.
    pub fn new() -> Self {
        Self {
            docs: Mutex::new(HashMap::new()),
            index_calls: AtomicU32::new(0),
        }
    }

    /// Number of indexed documents.
    pub fn doc_count(&self) -> usize {
        self.docs.lock().unwrap().len()
    }

    /// Total `index_document` calls observed.
    pub fn index_calls(&self) -> u32 {
        self.index_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SearchIndex for MemorySearchIndex {
    async fn index_document(&self, canonical_key: &str, doc: &SearchDoc) -> PromotionResult<()> {
        self.index_calls.fetch_add(1, Ordering::SeqCst);
        self.docs
            .lock()
            .unwrap()
            .insert(canonical_key.to_string(), doc.clone());
        Ok(())
    }
}
