/// Remote embedder backed by an Azure OpenAI embedding deployment.
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use super::{Embedder, EmbedderError};
use crate::openai::AzureOpenAiClient;

pub struct AzureEmbedder {
    client: Arc<AzureOpenAiClient>,
    dimensions: usize,
}

impl AzureEmbedder {
    /// `dimensions` must match the deployment's output and the index schema.
    pub fn new(client: Arc<AzureOpenAiClient>, dimensions: usize) -> Self {
        Self { client, dimensions }
    }
}

#[async_trait]
impl Embedder for AzureEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedderError> {
        let vector = self
            .client
            .embeddings(&[text])
            .await?
            .into_iter()
            .next()
            .filter(|v| !v.is_empty())
            .ok_or(EmbedderError::NoVector)?;
        debug!("embedded {} chars into {} dims", text.len(), vector.len());
        Ok(vector)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}
