//! Embedder trait: the abstraction over embedding services.
//!
//! The router embeds exactly one string per call (the raw query). Offline
//! jobs embed chunk signatures, never bodies.

use async_trait::async_trait;

use crate::error::EmbeddingError;

/// An embedding service producing one fixed-dimension vector per input.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embedding model identifier; centroid artifacts are keyed by it.
    fn model_id(&self) -> &str;

    /// Embed `texts`, returning one vector per input, in input order.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError>;

    /// Embed a single text.
    async fn embed_one(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let mut vectors = self.embed(&[text.to_string()]).await?;
        if vectors.len() != 1 {
            return Err(EmbeddingError::CountMismatch {
                expected: 1,
                got: vectors.len(),
            });
        }
        Ok(vectors.remove(0))
    }
}
