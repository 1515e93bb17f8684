//! Application wiring: clients are built once and shared by the pipelines.

use std::sync::Arc;

use crate::error::AppError;
use crate::models::{Config, Secrets, VectorDriver};
use crate::services::{
    ChatCompletion, CompletionClient, Embedder, IngestionPipeline, QueryPipeline, TextChunker,
    VectorStore, create_embedder, create_store,
};
use crate::sources::LocalSource;

/// Shared state for the HTTP server and the CLI.
pub struct AppContext {
    pub config: Config,
    pub embedder: Arc<dyn Embedder>,
    pub store: Arc<dyn VectorStore>,
    pub ingest: Arc<IngestionPipeline>,
    pub query: Arc<QueryPipeline>,
}

impl AppContext {
    /// Build every client from configuration and environment secrets.
    ///
    /// Fails before touching the network or the model when the completion
    /// API key is missing.
    pub async fn build(config: Config, secrets: &Secrets) -> Result<Self, AppError> {
        let api_key = secrets.require_completion_key(&config)?.to_string();
        let completion = Arc::new(CompletionClient::new(&config.completion, api_key)?);

        config.ensure_dirs()?;
        let store = open_store(&config, secrets).await?;
        let embedder = create_embedder(&config.embedding, secrets)?;

        tracing::info!(
            driver = %store.driver(),
            embedding = %embedder.model_id(),
            completion = %completion.model(),
            "application ready"
        );

        Ok(Self::from_parts(config, embedder, store, completion))
    }

    /// Assemble a context from already-built clients.
    pub fn from_parts(
        config: Config,
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn VectorStore>,
        completion: Arc<dyn ChatCompletion>,
    ) -> Self {
        let ingest = Arc::new(ingestion_pipeline(
            &config,
            Arc::clone(&embedder),
            Arc::clone(&store),
        ));
        let query = Arc::new(QueryPipeline::new(
            Arc::clone(&embedder),
            Arc::clone(&store),
            completion,
            &config.retrieval,
        ));

        Self {
            config,
            embedder,
            store,
            ingest,
            query,
        }
    }
}

/// Open the configured vector store.
pub async fn open_store(config: &Config, secrets: &Secrets) -> Result<Arc<dyn VectorStore>, AppError> {
    if config.vector_store.driver == VectorDriver::Postgres {
        secrets.require_database_url(config)?;
    }
    let store = create_store(
        &config.vector_store,
        &config.sqlite_path(),
        config.embedding.dimension as usize,
        secrets,
    )
    .await?;
    Ok(store)
}

pub fn ingestion_pipeline(
    config: &Config,
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
) -> IngestionPipeline {
    let source = LocalSource::new(
        config.storage.upload_dir.clone(),
        &config.storage.extensions,
    );
    IngestionPipeline::new(source, TextChunker::new(&config.chunking), embedder, store)
}
