/// Mock embedder for testing purposes.
///
/// Generates deterministic embeddings based on text hash.
use std::collections::HashMap;
use std::hash::{DefaultHasher, Hash, Hasher};

use async_trait::async_trait;

use super::{Embedder, EmbedderError};

/// A mock embedder that produces deterministic vectors from text hashes.
///
/// Useful for running the pipeline without an embedding deployment.
/// Texts registered with [`MockEmbedder::with_fixed`] map to a chosen vector,
/// which lets tests place a query at a known distance from indexed records.
pub struct MockEmbedder {
    pub dimensions: usize,
    fixed: HashMap<String, Vec<f32>>,
}

impl MockEmbedder {
    /// Create a new `MockEmbedder` with the given dimensionality.
    #[must_use]
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            fixed: HashMap::new(),
        }
    }

    /// Always return `vector` for exactly `text`.
    #[must_use]
    pub fn with_fixed(mut self, text: &str, vector: Vec<f32>) -> Self {
        self.fixed.insert(text.to_string(), vector);
        self
    }

    fn hashed(&self, text: &str) -> Vec<f32> {
        let mut hasher = DefaultHasher::new();
        text.hash(&mut hasher);
        let bytes = hasher.finish().to_le_bytes();

        let mut embedding: Vec<f32> = (0..self.dimensions)
            .map(|i| f32::from(bytes[i % 8]) / 255.0)
            .collect();

        // L2 normalize
        let norm_sq: f32 = embedding.iter().map(|v| v * v).sum();
        if norm_sq > 0.0 {
            let inv = 1.0 / norm_sq.sqrt();
            for v in &mut embedding {
                *v *= inv;
            }
        }
        embedding
    }
}

impl Default for MockEmbedder {
    fn default() -> Self {
        Self::new(1536)
    }
}

#[async_trait]
impl Embedder for MockEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedderError> {
        if let Some(v) = self.fixed.get(text) {
            return Ok(v.clone());
        }
        Ok(self.hashed(text))
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}
