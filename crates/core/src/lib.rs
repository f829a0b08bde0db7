//! # flowplan core
//!
//! Domain types, traits, and error definitions for the flowplan topic
//! routing and prompt assembly pipeline. Implementations live in their
//! respective crates:
//!
//! - `flowplan-catalog` builds the chunk registry
//! - `flowplan-retrieval` implements [`Embedder`] and [`VectorStore`]
//! - `flowplan-planner` routes queries and assembles prompts

pub mod chunk;
pub mod embedding;
pub mod error;
pub mod topic;
pub mod vector_store;

// Re-export key types at crate root for ergonomics
pub use chunk::{
    Chunk, ChunkCategory, ChunkKey, ChunkMetadata, ChunkRole, Origin, fingerprint, normalize_text,
};
pub use embedding::Embedder;
pub use error::{
    AssemblyError, CentroidError, EmbeddingError, Error, RegistryError, Result, RoutingError,
    Section, VectorStoreError,
};
pub use topic::Topic;
pub use vector_store::{Candidate, IndexRecord, VectorStore};
