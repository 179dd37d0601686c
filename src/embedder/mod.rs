/// Embedder trait and shared types for text embedding.
pub mod azure;
pub mod mock;

use async_trait::async_trait;
use thiserror::Error;

use crate::openai::ModelError;

/// Errors that can occur during embedding operations.
#[derive(Error, Debug)]
pub enum EmbedderError {
    #[error("embedding service error: {0}")]
    Remote(#[from] ModelError),

    #[error("embedding service returned no vector")]
    NoVector,
}

/// Trait for text embedding implementations.
///
/// All implementations must be `Send + Sync` to allow concurrent use
/// behind `Arc`.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a whole text into a single vector (no chunking).
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedderError>;

    /// Return the dimensionality of the embedding vectors.
    fn dimensions(&self) -> usize;
}
