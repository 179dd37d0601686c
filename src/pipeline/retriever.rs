//! Similarity retrieval with thresholding.
use std::cmp::Ordering;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::RetrievedRecord;

/// Default maximum number of records passed on to the assembler.
pub const TOP_K: usize = 10;

/// Default similarity a record must strictly exceed.
pub const SIMILARITY_THRESHOLD: f64 = 0.50;

#[derive(Error, Debug)]
pub enum IndexError {
    #[error("index query failed: {0}")]
    Query(String),

    #[error("query vector has {got} dimensions, index expects {expected}")]
    DimensionMismatch { expected: usize, got: usize },
}

impl IndexError {
    pub fn query<E: std::fmt::Display>(err: E) -> Self {
        Self::Query(err.to_string())
    }
}

/// A similarity index over the document corpus.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Return up to `top_k` records with similarity above `min_similarity`, best first.
    async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        min_similarity: f64,
    ) -> Result<Vec<RetrievedRecord>, IndexError>;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetrievalPolicy {
    pub top_k: usize,
    pub min_similarity: f64,
}

impl Default for RetrievalPolicy {
    fn default() -> Self {
        Self {
            top_k: TOP_K,
            min_similarity: SIMILARITY_THRESHOLD,
        }
    }
}

pub struct Retriever {
    index: Arc<dyn VectorIndex>,
    policy: RetrievalPolicy,
}

impl Retriever {
    pub fn new(index: Arc<dyn VectorIndex>, policy: RetrievalPolicy) -> Self {
        Self { index, policy }
    }

    pub fn policy(&self) -> RetrievalPolicy {
        self.policy
    }

    /// Query the index and enforce the threshold, ordering and cap on the result.
    ///
    /// An empty result is a valid outcome.
    pub async fn retrieve(&self, vector: &[f32]) -> Result<Vec<RetrievedRecord>, IndexError> {
        let records = self
            .index
            .query(vector, self.policy.top_k, self.policy.min_similarity)
            .await?;
        Ok(apply_policy(records, self.policy))
    }
}

fn apply_policy(mut records: Vec<RetrievedRecord>, policy: RetrievalPolicy) -> Vec<RetrievedRecord> {
    // NaN scores fail the comparison and are dropped here
    records.retain(|r| r.similarity_score > policy.min_similarity);
    records.sort_by(|a, b| {
        b.similarity_score
            .partial_cmp(&a.similarity_score)
            .unwrap_or(Ordering::Equal)
    });
    records.truncate(policy.top_k);
    records
}
