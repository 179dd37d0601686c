//! Object storage for record images.
//!
//! Two backends: Azure Blob Storage (SharedKey or SAS over HTTPS) and a local
//! directory tree with the same path layout.
pub mod azure_blob;
pub mod local;

use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use thiserror::Error;

use crate::config::{StorageBackend, StorageConfig};
pub use azure_blob::{AzureBlobStore, BlobCredential};
pub use local::LocalObjectStore;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("object not found: {0}")]
    NotFound(String),

    #[error("storage misconfigured: {0}")]
    Config(String),

    #[error("invalid object path: {0:?}")]
    InvalidPath(String),

    #[error("storage returned {status} for {path}")]
    Status { status: u16, path: String },

    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Raw bytes of the object at `path`.
    async fn fetch(&self, path: &str) -> Result<Vec<u8>, StorageError>;

    /// The object at `path`, standard base64 encoded.
    async fn fetch_base64(&self, path: &str) -> Result<String, StorageError> {
        let bytes = self.fetch(path).await?;
        Ok(STANDARD.encode(bytes))
    }
}

/// Build the configured backend.
pub fn from_config(config: &StorageConfig) -> Result<Arc<dyn ObjectStore>, StorageError> {
    Ok(match config.backend {
        StorageBackend::Azure => Arc::new(AzureBlobStore::from_config(config)?),
        StorageBackend::Local => Arc::new(LocalObjectStore::new(&config.local_root)),
    })
}
