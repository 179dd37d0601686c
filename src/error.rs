//! Request-level error taxonomy.
//!
//! Each stage reports its own leaf error; the pipeline tags it with the
//! stage that failed. Callers only ever see one generic error body.
use axum::{Json, http::StatusCode, response::IntoResponse};
use serde_json::json;
use thiserror::Error;

use crate::embedder::EmbedderError;
use crate::openai::ModelError;
use crate::pipeline::retriever::IndexError;
use crate::storage::StorageError;

/// Message returned to callers for every failure.
pub const GENERIC_ERROR_MESSAGE: &str = "Error processing the request.";

#[derive(Debug, Error)]
pub enum RagError {
    #[error("embedding failed: {0}")]
    EmbeddingFailed(#[source] EmbedderError),

    #[error("retrieval failed: {0}")]
    RetrievalFailed(#[source] IndexError),

    #[error("image fetch failed for {path}: {source}")]
    StorageFailed {
        path: String,
        #[source]
        source: StorageError,
    },

    #[error("completion failed: {0}")]
    CompletionFailed(#[source] ModelError),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("request cancelled")]
    Cancelled,

    #[error("request deadline exceeded")]
    DeadlineExceeded,
}

impl RagError {
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Stable tag for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::EmbeddingFailed(_) => "embedding_failed",
            Self::RetrievalFailed(_) => "retrieval_failed",
            Self::StorageFailed { .. } => "storage_failed",
            Self::CompletionFailed(_) => "completion_failed",
            Self::InvalidInput(_) => "invalid_input",
            Self::Cancelled => "cancelled",
            Self::DeadlineExceeded => "deadline_exceeded",
        }
    }
}

impl IntoResponse for RagError {
    fn into_response(self) -> axum::response::Response {
        let body = Json(json!({ "error": GENERIC_ERROR_MESSAGE }));
        (StatusCode::INTERNAL_SERVER_ERROR, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_tags() {
        assert_eq!(RagError::invalid_input("x").kind(), "invalid_input");
        assert_eq!(RagError::Cancelled.kind(), "cancelled");
        assert_eq!(
            RagError::CompletionFailed(ModelError::Status {
                status: 429,
                body: String::new(),
            })
            .kind(),
            "completion_failed"
        );
    }

    #[test]
    fn test_display_keeps_detail() {
        let err = RagError::StorageFailed {
            path: "a.png".to_string(),
            source: StorageError::NotFound("a.png".to_string()),
        };
        assert!(err.to_string().contains("a.png"));
    }

    #[test]
    fn test_response_is_generic_500() {
        let resp = RagError::invalid_input("missing message").into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
