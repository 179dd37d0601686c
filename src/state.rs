use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::Mutex as TokioMutex;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::Config;
use crate::db::{Db, SqliteVecIndex};
use crate::embedder::azure::AzureEmbedder;
use crate::openai::AzureOpenAiClient;
use crate::pipeline::{PipelineSettings, RagPipeline};
use crate::storage;

/// Process-wide state shared by every request handler.
///
/// Remote clients are built once here and reused across requests.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<RagPipeline>,
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(pipeline: Arc<RagPipeline>) -> Self {
        Self {
            pipeline,
            shutdown: CancellationToken::new(),
        }
    }

    /// Wire the production collaborators from a validated config.
    ///
    /// 1. One Azure OpenAI client serves both embeddings and chat
    /// 2. The sqlite-vec index is opened (and created if missing)
    /// 3. The configured object store backend is built
    pub async fn initialize(config: &Config) -> Result<Arc<Self>> {
        let client = Arc::new(AzureOpenAiClient::new(&config.openai));
        let embedder = Arc::new(AzureEmbedder::new(client.clone(), config.index.dimensions));

        let db = Db::open(&config.index.db_path, config.index.dimensions)
            .with_context(|| format!("Failed to open vector index at {}", config.index.db_path))?;
        let record_count = db.count_records().context("Failed to read vector index")?;
        info!("Vector index holds {record_count} records");
        let index = Arc::new(SqliteVecIndex::new(Arc::new(TokioMutex::new(db))));

        let store = storage::from_config(&config.storage).context("Failed to set up object storage")?;

        let pipeline = RagPipeline::new(
            embedder,
            index,
            store,
            client,
            PipelineSettings::from(config),
        );
        Ok(Arc::new(Self::new(Arc::new(pipeline))))
    }
}
