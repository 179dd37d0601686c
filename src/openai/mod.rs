//! Azure OpenAI REST client.
//!
//! One client is built per process and shared by every request; it serves
//! both the chat deployment and the embedding deployment.
pub mod types;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::debug;

use crate::config::OpenAiConfig;
pub use types::{ChatMessage, Choice, ContentPart, ImageUrl, MessageContent, Role};
use types::{ChatCompletionRequest, ChatCompletionResponse, EmbeddingRequest, EmbeddingResponse};

/// Errors from the language model service.
#[derive(Error, Debug)]
pub enum ModelError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("service returned {status}: {body}")]
    Status { status: u16, body: String },
}

/// Chat completion seam used by the answerer.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Send a chat exchange and return all choices from the response.
    async fn complete(
        &self,
        messages: &[ChatMessage],
        max_output_tokens: u32,
    ) -> Result<Vec<Choice>, ModelError>;
}

#[derive(Clone)]
pub struct AzureOpenAiClient {
    http: Client,
    endpoint: String,
    api_key: String,
    api_version: String,
    chat_deployment: String,
    embedding_deployment: String,
}

impl AzureOpenAiClient {
    pub fn new(config: &OpenAiConfig) -> Self {
        Self {
            http: Client::new(),
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            api_version: config.api_version.clone(),
            chat_deployment: config.chat_deployment.clone(),
            embedding_deployment: config.embedding_deployment.clone(),
        }
    }

    fn deployment_url(&self, deployment: &str, operation: &str) -> String {
        format!(
            "{}/openai/deployments/{}/{}?api-version={}",
            self.endpoint, deployment, operation, self.api_version
        )
    }

    async fn post_json<B, R>(&self, url: &str, body: &B) -> Result<R, ModelError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let res = self
            .http
            .post(url)
            .header("api-key", &self.api_key)
            .json(body)
            .send()
            .await?;

        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(ModelError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(res.json().await?)
    }

    /// Embed each input; the returned vectors follow input order.
    pub async fn embeddings(&self, inputs: &[&str]) -> Result<Vec<Vec<f32>>, ModelError> {
        let url = self.deployment_url(&self.embedding_deployment, "embeddings");
        let response: EmbeddingResponse = self
            .post_json(&url, &EmbeddingRequest { input: inputs })
            .await?;
        debug!("embedding response with {} vectors", response.data.len());
        Ok(response.data.into_iter().map(|d| d.embedding).collect())
    }

    pub async fn chat_completions(
        &self,
        messages: &[ChatMessage],
        max_tokens: u32,
    ) -> Result<Vec<Choice>, ModelError> {
        let url = self.deployment_url(&self.chat_deployment, "chat/completions");
        let response: ChatCompletionResponse = self
            .post_json(
                &url,
                &ChatCompletionRequest {
                    messages,
                    max_tokens,
                },
            )
            .await?;
        debug!("chat completion with {} choices", response.choices.len());
        Ok(response.choices)
    }
}

#[async_trait]
impl ChatModel for AzureOpenAiClient {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        max_output_tokens: u32,
    ) -> Result<Vec<Choice>, ModelError> {
        self.chat_completions(messages, max_output_tokens).await
    }
}
