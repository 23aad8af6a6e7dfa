use std::sync::Arc;

use common::{
    error::AppError,
    storage::store::StorageManager,
    utils::{config::AppConfig, embedding::EmbeddingProvider, llm::Generator},
};
use ingestion_pipeline::{IngestionConfig, IngestionPipeline};
use retrieval_pipeline::{MultiDocumentQueryEngine, QueryEngine, StoreCache};

#[derive(Clone)]
pub struct ApiState {
    pub config: AppConfig,
    pub storage: StorageManager,
    pub ingestion: Arc<IngestionPipeline>,
    pub query_engine: Arc<QueryEngine>,
    pub multi_engine: Arc<MultiDocumentQueryEngine>,
    pub embedding_backend: &'static str,
    pub embedding_model: Option<String>,
}

impl ApiState {
    /// Wires the ingestion pipeline and both query engines around one shared
    /// index cache.
    pub fn new(
        config: &AppConfig,
        storage: StorageManager,
        embedding_provider: Arc<EmbeddingProvider>,
        generator: Arc<dyn Generator>,
    ) -> Result<Self, AppError> {
        let cache = Arc::new(StoreCache::new(
            storage.clone(),
            config.vector_store_prefix.clone(),
        ));

        let ingestion = IngestionPipeline::new(
            Arc::clone(&cache),
            embedding_provider.clone(),
            &IngestionConfig::from_app_config(config),
        )?;
        let query_engine = QueryEngine::new(
            Arc::clone(&cache),
            embedding_provider.clone(),
            Arc::clone(&generator),
        );
        let multi_engine =
            MultiDocumentQueryEngine::new(cache, embedding_provider.clone(), generator);

        Ok(Self {
            config: config.clone(),
            storage,
            ingestion: Arc::new(ingestion),
            query_engine: Arc::new(query_engine),
            multi_engine: Arc::new(multi_engine),
            embedding_backend: embedding_provider.backend_label(),
            embedding_model: embedding_provider.model_code(),
        })
    }

    pub fn generation_model(&self) -> &str {
        self.query_engine.generator().model()
    }
}
