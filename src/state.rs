use std::sync::Arc;
use std::time::Duration;

use crate::core::config::{AppConfig, AppPaths};
use crate::core::errors::ApiError;
use crate::llm::{LlmProvider, OpenAiCompatProvider};
use crate::rag::{IngestionPipeline, QueryExpander, RagEngine, SqliteVectorStore, VectorStore};

/// Global application state shared across all routes.
pub struct AppState {
    pub paths: AppPaths,
    pub config: AppConfig,
    pub provider: Arc<dyn LlmProvider>,
    pub store: Arc<dyn VectorStore>,
    pub engine: RagEngine,
    pub pipeline: IngestionPipeline,
    /// Ingestion is clear-then-rebuild with no transactional isolation;
    /// concurrent runs would interleave destructively, so the handler
    /// serializes them here.
    pub ingest_lock: tokio::sync::Mutex<()>,
}

impl AppState {
    /// Builds configuration (fatal on error), the vector store and the RAG
    /// services. Runs before the server binds.
    pub async fn initialize(paths: AppPaths) -> Result<Arc<Self>, ApiError> {
        let config = AppConfig::load(&paths)?;

        let provider: Arc<dyn LlmProvider> = Arc::new(OpenAiCompatProvider::new(&config.llm));
        let store: Arc<dyn VectorStore> = Arc::new(
            SqliteVectorStore::new(&paths, config.llm.embedding_dimension).await?,
        );

        let embed_timeout = Duration::from_secs(config.llm.request_timeout_secs);
        let engine = RagEngine::new(
            provider.clone(),
            store.clone(),
            QueryExpander::with_default_synonyms(),
            config.rag.clone(),
            embed_timeout,
        );
        let pipeline = IngestionPipeline::new(
            provider.clone(),
            store.clone(),
            config.rag.clone(),
            embed_timeout,
        );

        Ok(Arc::new(AppState {
            paths,
            config,
            provider,
            store,
            engine,
            pipeline,
            ingest_lock: tokio::sync::Mutex::new(()),
        }))
    }
}
