//! Vector store trait: nearest-neighbor search over embedded signatures.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::chunk::ChunkMetadata;
use crate::error::VectorStoreError;

/// One nearest-neighbor hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub chunk_id: String,
    /// Distance to the query vector; lower is closer.
    pub distance: f32,
    pub metadata: ChunkMetadata,
}

/// A vector plus its metadata, as written by index construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexRecord {
    pub id: String,
    pub vector: Vec<f32>,
    pub metadata: ChunkMetadata,
}

/// A persistent collection of `(vector, metadata)` pairs keyed by chunk id.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Collection identifier; centroid artifacts are keyed by it.
    fn collection(&self) -> &str;

    /// Return up to `top_k` candidates ordered by ascending distance.
    async fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<Candidate>, VectorStoreError>;

    /// Insert or replace records by id.
    async fn upsert(&self, records: Vec<IndexRecord>) -> Result<(), VectorStoreError>;
}
