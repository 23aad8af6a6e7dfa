mod config;
mod services;

pub use config::{IngestionConfig, IngestionTuning};
#[allow(clippy::module_name_repetitions)]
pub use services::{DefaultPipelineServices, PipelineServices};

use std::{
    path::Path,
    sync::Arc,
    time::{Duration, Instant},
};

use common::{
    error::AppError,
    storage::types::{text_chunk::ChunkMetadata, MaterialMetadata},
    utils::embedding::Embedder,
};
use retrieval_pipeline::{validate_material_id, StoreCache, VectorIndex};
use serde::Serialize;
use tracing::{debug, info};

/// Summary of a successful vectorize call.
#[derive(Debug, Clone, Serialize)]
pub struct VectorizeOutcome {
    pub material_id: String,
    pub num_chunks: usize,
    /// Characters, not bytes, of the extracted text.
    pub total_characters: usize,
    pub storage_location: String,
}

/// Write side of the engine: turns documents into committed vector indexes
/// and removes them again.
#[allow(clippy::module_name_repetitions)]
pub struct IngestionPipeline {
    cache: Arc<StoreCache>,
    services: Arc<dyn PipelineServices>,
}

impl IngestionPipeline {
    pub fn new(
        cache: Arc<StoreCache>,
        embedder: Arc<dyn Embedder>,
        pipeline_config: &IngestionConfig,
    ) -> Result<Self, AppError> {
        let services = DefaultPipelineServices::new(pipeline_config, embedder)?;
        Ok(Self::with_services(cache, Arc::new(services)))
    }

    pub fn with_services(cache: Arc<StoreCache>, services: Arc<dyn PipelineServices>) -> Self {
        Self { cache, services }
    }

    fn duration_millis(duration: Duration) -> u64 {
        u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
    }

    /// Extracts, chunks and embeds the document at `file_path`, replacing any
    /// index previously stored for `material_id`.
    ///
    /// The previous index stays in place until the new one is persisted, and
    /// a failure at any stage leaves storage and cache untouched.
    #[tracing::instrument(skip_all, fields(material_id = %material_id, file_path = %file_path.display()))]
    pub async fn vectorize(
        &self,
        material_id: &str,
        file_path: &Path,
        metadata: MaterialMetadata,
    ) -> Result<VectorizeOutcome, AppError> {
        validate_material_id(material_id)?;
        let guard = self.cache.write_lock(material_id).await;
        let pipeline_started = Instant::now();

        let stage_start = Instant::now();
        let text = self.services.extract_text(file_path).await?;
        let total_characters = text.chars().count();
        let extract_duration = stage_start.elapsed();

        let chunk_metadata = ChunkMetadata::new(
            material_id.to_string(),
            file_path.display().to_string(),
            metadata,
        );
        let chunks = self.services.chunk_text(&text, &chunk_metadata);
        if chunks.len() <= 1 {
            debug!(
                total_characters,
                chunks = chunks.len(),
                "short document; indexing as-is"
            );
        }

        let stage_start = Instant::now();
        let chunks = self.services.embed_chunks(chunks).await?;
        let embed_duration = stage_start.elapsed();

        let stage_start = Instant::now();
        let index = VectorIndex::build(material_id, chunks)?;
        let (index, storage_location) = self.cache.commit(&guard, index).await?;
        let persist_duration = stage_start.elapsed();

        info!(
            num_chunks = index.len(),
            total_characters,
            %storage_location,
            total_ms = Self::duration_millis(pipeline_started.elapsed()),
            extract_ms = Self::duration_millis(extract_duration),
            embed_ms = Self::duration_millis(embed_duration),
            persist_ms = Self::duration_millis(persist_duration),
            "vectorization finished"
        );

        Ok(VectorizeOutcome {
            material_id: material_id.to_string(),
            num_chunks: index.len(),
            total_characters,
            storage_location,
        })
    }

    /// Removes the index of `material_id` from cache and storage. Returns
    /// whether anything existed.
    #[tracing::instrument(skip_all, fields(material_id = %material_id))]
    pub async fn delete(&self, material_id: &str) -> Result<bool, AppError> {
        validate_material_id(material_id)?;
        let guard = self.cache.write_lock(material_id).await;
        let existed = self.cache.remove(&guard).await?;
        info!(existed, "vector index deleted");
        Ok(existed)
    }
}
