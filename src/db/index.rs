use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex as TokioMutex;
use tokio::task;

use super::Db;
use crate::models::RetrievedRecord;
use crate::pipeline::retriever::{IndexError, VectorIndex};

/// [`VectorIndex`] backed by the sqlite-vec database.
#[derive(Clone)]
pub struct SqliteVecIndex {
    db: Arc<TokioMutex<Db>>,
}

impl SqliteVecIndex {
    pub fn new(db: Arc<TokioMutex<Db>>) -> Self {
        Self { db }
    }

    pub fn db(&self) -> &Arc<TokioMutex<Db>> {
        &self.db
    }
}

#[async_trait]
impl VectorIndex for SqliteVecIndex {
    async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        min_similarity: f64,
    ) -> Result<Vec<RetrievedRecord>, IndexError> {
        let db = Arc::clone(&self.db);
        let vector = vector.to_vec();

        // The scan is synchronous SQLite work; keep it off the async workers
        task::spawn_blocking(move || {
            let db = db.blocking_lock();
            if vector.len() != db.dimensions() {
                return Err(IndexError::DimensionMismatch {
                    expected: db.dimensions(),
                    got: vector.len(),
                });
            }
            db.search(&vector, top_k, min_similarity)
                .map_err(IndexError::query)
        })
        .await
        .map_err(IndexError::query)?
    }
}
