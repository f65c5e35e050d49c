//! Storage tier sink implementations.

pub mod memory;

pub use memory::{MemoryBlobStore, MemoryMetadataStore, MemorySearchIndex};
