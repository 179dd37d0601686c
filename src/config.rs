/// Configuration module for ragground.
///
/// Handles loading, validating, and providing default configuration values.
/// Values come from an optional JSON file and are then overlaid with the
/// environment variables used by the Azure deployment.
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

// ── Default value functions ──────────────────────────────────────────

fn default_bind() -> String {
    "127.0.0.1:3000".to_string()
}

fn default_db_path() -> String {
    "./vectors.db".to_string()
}

fn default_top_k() -> usize {
    10
}

fn default_min_similarity() -> f64 {
    0.50
}

fn default_dimensions() -> usize {
    1536
}

fn default_api_version() -> String {
    "2024-02-01".to_string()
}

fn default_max_output_tokens() -> u32 {
    4096
}

fn default_storage_backend() -> StorageBackend {
    StorageBackend::Azure
}

fn default_local_root() -> String {
    "./blobs".to_string()
}

fn default_max_images_to_model() -> usize {
    1
}

fn default_request_timeout_secs() -> u64 {
    120
}

/// Upper bound accepted for `pipeline.request_timeout_secs`.
pub const MAX_REQUEST_TIMEOUT_SECS: u64 = 3600;

// ── Config structs ───────────────────────────────────────────────────

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub index: IndexConfig,

    #[serde(default)]
    pub openai: OpenAiConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub pipeline: PipelineConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

/// Vector index settings. `top_k` and `min_similarity` are the retrieval policy.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct IndexConfig {
    #[serde(default = "default_db_path")]
    pub db_path: String,

    #[serde(default = "default_dimensions")]
    pub dimensions: usize,

    #[serde(default = "default_top_k")]
    pub top_k: usize,

    #[serde(default = "default_min_similarity")]
    pub min_similarity: f64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct OpenAiConfig {
    #[serde(default)]
    pub endpoint: String,

    #[serde(default, skip_serializing)]
    pub api_key: String,

    #[serde(default)]
    pub chat_deployment: String,

    #[serde(default)]
    pub embedding_deployment: String,

    #[serde(default = "default_api_version")]
    pub api_version: String,

    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Azure,
    Local,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct StorageConfig {
    #[serde(default = "default_storage_backend")]
    pub backend: StorageBackend,

    #[serde(default)]
    pub account: String,

    /// Base64 account access key, used for SharedKey request signing.
    #[serde(default, skip_serializing)]
    pub account_key: String,

    #[serde(default, skip_serializing)]
    pub sas_token: String,

    #[serde(default)]
    pub container: String,

    /// Overrides `https://{account}.blob.core.windows.net` (emulators, sovereign clouds).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    /// Root directory for the `local` backend.
    #[serde(default = "default_local_root")]
    pub local_root: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PipelineConfig {
    /// How many of the assembled images are forwarded to the chat model.
    #[serde(default = "default_max_images_to_model")]
    pub max_images_to_model: usize,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Reject empty or whitespace-only messages before embedding.
    #[serde(default)]
    pub reject_blank_message: bool,
}

// ── Default impls ────────────────────────────────────────────────────

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            dimensions: default_dimensions(),
            top_k: default_top_k(),
            min_similarity: default_min_similarity(),
        }
    }
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            api_key: String::new(),
            chat_deployment: String::new(),
            embedding_deployment: String::new(),
            api_version: default_api_version(),
            max_output_tokens: default_max_output_tokens(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: default_storage_backend(),
            account: String::new(),
            account_key: String::new(),
            sas_token: String::new(),
            container: String::new(),
            endpoint: None,
            local_root: default_local_root(),
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_images_to_model: default_max_images_to_model(),
            request_timeout_secs: default_request_timeout_secs(),
            reject_blank_message: false,
        }
    }
}

// ── Config implementation ────────────────────────────────────────────

impl Config {
    /// Load configuration from a JSON file, then overlay the process environment.
    ///
    /// A missing file is not an error: defaults are used and the environment
    /// is expected to supply the endpoints and credentials.
    pub fn load(config_path: &str) -> Result<Self> {
        let mut cfg = Self::load_file(config_path)?;
        cfg.apply_env(|key| std::env::var(key).ok());
        Ok(cfg)
    }

    fn load_file(config_path: &str) -> Result<Self> {
        let path = if config_path.is_empty() {
            "config.json"
        } else {
            config_path
        };

        if !Path::new(path).exists() {
            info!("{path} not found, using defaults");
            return Ok(Self::default());
        }

        let data = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config: {path}"))?;

        let cfg: Config =
            serde_json::from_str(&data).with_context(|| format!("invalid JSON in {path}"))?;

        info!("Loaded configuration from {path}");
        Ok(cfg)
    }

    /// Overlay values from an environment lookup. Empty values are ignored.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("AZURE_OPENAI_ENDPOINT") {
            self.openai.endpoint = v;
        }
        if let Some(v) = get("AZURE_OPENAI_API_KEY") {
            self.openai.api_key = v;
        }
        if let Some(v) = get("AZURE_OPENAI_DEPLOYMENT_ID") {
            self.openai.chat_deployment = v;
        }
        if let Some(v) = get("AZURE_OPENAI_VEC_DEPLOYMENT_ID") {
            self.openai.embedding_deployment = v;
        }
        if let Some(v) = get("AZURE_OPENAI_API_VERSION") {
            self.openai.api_version = v;
        }
        if let Some(v) = get("AZURE_STORAGE_ACCOUNT_NAME") {
            self.storage.account = v;
        }
        if let Some(v) = get("AZURE_STORAGE_ACCOUNT_ACCESS_KEY") {
            self.storage.account_key = v;
        }
        if let Some(v) = get("AZURE_STORAGE_SAS_TOKEN") {
            self.storage.sas_token = v;
        }
        if let Some(v) = get("AZURE_STORAGE_CONTAINER_NAME") {
            self.storage.container = v;
        }
        if let Some(v) = get("RAG_INDEX_PATH") {
            self.index.db_path = v;
        }
        if let Some(v) = get("RAG_BIND_ADDR") {
            self.server.bind = v;
        }
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(self.index.top_k > 0, "index.top_k must be positive");
        anyhow::ensure!(
            self.index.dimensions > 0,
            "index.dimensions must be positive"
        );
        anyhow::ensure!(
            (-1.0..=1.0).contains(&self.index.min_similarity),
            "index.min_similarity must be within [-1, 1]"
        );
        anyhow::ensure!(
            self.openai.max_output_tokens > 0,
            "openai.max_output_tokens must be positive"
        );
        anyhow::ensure!(
            (1..=MAX_REQUEST_TIMEOUT_SECS).contains(&self.pipeline.request_timeout_secs),
            "pipeline.request_timeout_secs must be between 1 and {MAX_REQUEST_TIMEOUT_SECS}"
        );

        let mut missing = Vec::new();
        if self.openai.endpoint.is_empty() {
            missing.push("AZURE_OPENAI_ENDPOINT");
        }
        if self.openai.api_key.is_empty() {
            missing.push("AZURE_OPENAI_API_KEY");
        }
        if self.openai.chat_deployment.is_empty() {
            missing.push("AZURE_OPENAI_DEPLOYMENT_ID");
        }
        if self.openai.embedding_deployment.is_empty() {
            missing.push("AZURE_OPENAI_VEC_DEPLOYMENT_ID");
        }
        if self.storage.backend == StorageBackend::Azure {
            if self.storage.account.is_empty() && self.storage.endpoint.is_none() {
                missing.push("AZURE_STORAGE_ACCOUNT_NAME");
            }
            if self.storage.container.is_empty() {
                missing.push("AZURE_STORAGE_CONTAINER_NAME");
            }
            if self.storage.account_key.is_empty() && self.storage.sas_token.is_empty() {
                missing.push("AZURE_STORAGE_ACCOUNT_ACCESS_KEY or AZURE_STORAGE_SAS_TOKEN");
            }
            if !self.storage.account_key.is_empty() && self.storage.account.is_empty() {
                missing.push("AZURE_STORAGE_ACCOUNT_NAME");
            }
        }
        if !missing.is_empty() {
            warn!("Missing required settings: {}", missing.join(", "));
            anyhow::bail!("missing required settings: {}", missing.join(", "));
        }

        Ok(())
    }
}

// ── Tests ────────────────────────────────────────────────────────────
