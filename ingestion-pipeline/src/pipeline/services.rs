use std::{path::Path, sync::Arc};

use async_trait::async_trait;
use common::{
    error::AppError,
    storage::types::text_chunk::{ChunkMetadata, TextChunk},
    utils::embedding::Embedder,
};

use super::config::IngestionConfig;
use crate::utils::{chunking::Chunker, file_text_extraction::extract_text_from_file};

/// The stages of turning a document into embedded chunks.
#[async_trait]
pub trait PipelineServices: Send + Sync {
    async fn extract_text(&self, file_path: &Path) -> Result<String, AppError>;

    fn chunk_text(&self, text: &str, metadata: &ChunkMetadata) -> Vec<TextChunk>;

    /// Attaches an embedding to every chunk, keeping their order.
    async fn embed_chunks(&self, chunks: Vec<TextChunk>) -> Result<Vec<TextChunk>, AppError>;
}

pub struct DefaultPipelineServices {
    chunker: Chunker,
    embedder: Arc<dyn Embedder>,
}

impl DefaultPipelineServices {
    pub fn new(config: &IngestionConfig, embedder: Arc<dyn Embedder>) -> Result<Self, AppError> {
        let chunker = Chunker::new(config.tuning.chunk_size, config.tuning.chunk_overlap)?;
        Ok(Self { chunker, embedder })
    }
}

#[async_trait]
impl PipelineServices for DefaultPipelineServices {
    async fn extract_text(&self, file_path: &Path) -> Result<String, AppError> {
        extract_text_from_file(file_path).await
    }

    fn chunk_text(&self, text: &str, metadata: &ChunkMetadata) -> Vec<TextChunk> {
        let chunks: Vec<TextChunk> = self.chunker.chunk(text, metadata).collect();
        let minimum = self.chunker.minimum_chunks(text.chars().count());
        if chunks.len() < minimum {
            tracing::warn!(
                produced = chunks.len(),
                minimum,
                "chunker produced fewer chunks than expected"
            );
        }
        chunks
    }

    async fn embed_chunks(&self, chunks: Vec<TextChunk>) -> Result<Vec<TextChunk>, AppError> {
        let texts: Vec<String> = chunks.iter().map(|chunk| chunk.chunk.clone()).collect();
        let embeddings = self.embedder.embed_batch(texts).await?;
        if embeddings.len() != chunks.len() {
            return Err(AppError::Embedding(format!(
                "received {} embeddings for {} chunks",
                embeddings.len(),
                chunks.len()
            )));
        }

        Ok(chunks
            .into_iter()
            .zip(embeddings)
            .map(|(chunk, embedding)| chunk.with_embedding(embedding))
            .collect())
    }
}
