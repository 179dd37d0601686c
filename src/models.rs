//! Request-scoped data model shared by the pipeline stages.
//!
//! Every value here is created and dropped within a single request.
use serde::{Deserialize, Serialize};

/// Incoming user question.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Query {
    pub message: String,
}

impl Query {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// One candidate returned by the vector index.
///
/// Field names on the wire follow the document shape written by the
/// ingestion function (`file_name`, `is_contain_image`, ...).
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RetrievedRecord {
    pub file_name: String,
    pub content: String,
    #[serde(rename = "is_contain_image", default)]
    pub contains_image: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_blob_path: Option<String>,
    #[serde(rename = "SimilarityScore", alias = "similarity_score")]
    pub similarity_score: f64,
}

impl RetrievedRecord {
    /// Blob path to fetch, if this record declares an image.
    pub fn image_path(&self) -> Option<&str> {
        if !self.contains_image {
            return None;
        }
        self.image_blob_path.as_deref().filter(|p| !p.is_empty())
    }
}

/// System prompt plus the base64 images collected for one request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GroundingContext {
    pub system_prompt: String,
    pub images: Vec<String>,
}

/// Text returned to the caller.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Answer {
    #[serde(rename = "aiMessage")]
    pub text: String,
}
