//! Retrieval backends for flowplan.
//!
//! - [`InMemoryVectorStore`]: brute-force cosine store implementing `VectorStore`
//! - [`OpenAiEmbedder`]: OpenAI-compatible `Embedder`
//! - [`CentroidStore`]: per-topic centroids loaded from a keyed JSON artifact

pub mod centroid;
pub mod in_memory;
pub mod openai;
pub mod vector;

pub use centroid::{CentroidArtifact, CentroidStore};
pub use in_memory::InMemoryVectorStore;
pub use openai::OpenAiEmbedder;
pub use vector::{cosine_distance, cosine_similarity, mean_vector};
