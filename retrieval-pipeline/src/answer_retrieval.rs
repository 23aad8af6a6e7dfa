use std::sync::Arc;

use common::{
    error::AppError,
    storage::types::text_chunk::{SourceChunk, TextChunk},
    utils::{embedding::Embedder, llm::Generator},
};
use serde::Serialize;
use tracing::{debug, instrument};

use crate::{store_cache::StoreCache, vector_index::validate_material_id};

pub static SINGLE_MATERIAL_INSTRUCTIONS: &str = "Use the following pieces of context from the study material to answer the question at the end.
If you don't know the answer based on the context, just say that you don't know, don't try to make up an answer.
Always provide specific references to the material when possible.";

pub static MULTI_MATERIAL_INSTRUCTIONS: &str = "Use the following pieces of context from multiple study materials to answer the question.
Answer only from the provided context. If you don't know the answer, just say so rather than making one up.
When answering, try to reference which material the information comes from.";

#[derive(Debug, Clone, Serialize)]
pub struct QueryAnswer {
    pub answer: String,
    pub sources: Vec<SourceChunk>,
    pub material_id: String,
}

/// Places the retrieved chunk texts ahead of the question.
pub fn create_user_message(instructions: &str, context: &str, question: &str) -> String {
    format!(
        "{instructions}

Context Information:
==================
{context}

User Question:
==================
{question}
"
    )
}

/// Joins chunk texts in retrieval order, separated by blank lines.
pub fn chunks_to_context(chunks: &[TextChunk]) -> String {
    chunks
        .iter()
        .map(|chunk| chunk.chunk.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Like [`chunks_to_context`] but labels every chunk with its material so the
/// model can attribute statements.
pub fn chunks_to_attributed_context(chunks: &[TextChunk]) -> String {
    chunks
        .iter()
        .map(|chunk| {
            let label = chunk
                .metadata
                .extra
                .get("title")
                .map_or_else(
                    || chunk.material_id().to_string(),
                    |title| format!("{title} ({})", chunk.material_id()),
                );
            format!("[Material: {label}]\n{}", chunk.chunk)
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Shared checks for single and multi-material queries. Temperature is passed
/// through unclamped; only non-finite values are rejected.
pub fn validate_query(question: &str, k: usize, temperature: f32) -> Result<(), AppError> {
    if question.trim().is_empty() {
        return Err(AppError::Validation("question must not be empty".into()));
    }
    if k == 0 {
        return Err(AppError::Validation(
            "number of results must be at least 1".into(),
        ));
    }
    if !temperature.is_finite() {
        return Err(AppError::Validation(format!(
            "temperature must be a finite number, got {temperature}"
        )));
    }
    Ok(())
}

/// Answers questions grounded in a single material.
#[derive(Clone)]
pub struct QueryEngine {
    cache: Arc<StoreCache>,
    embedder: Arc<dyn Embedder>,
    generator: Arc<dyn Generator>,
}

impl QueryEngine {
    pub fn new(
        cache: Arc<StoreCache>,
        embedder: Arc<dyn Embedder>,
        generator: Arc<dyn Generator>,
    ) -> Self {
        Self {
            cache,
            embedder,
            generator,
        }
    }

    pub fn generator(&self) -> &Arc<dyn Generator> {
        &self.generator
    }

    #[instrument(skip_all, fields(material_id = %material_id, k = k, temperature = temperature))]
    pub async fn query(
        &self,
        material_id: &str,
        question: &str,
        k: usize,
        temperature: f32,
    ) -> Result<QueryAnswer, AppError> {
        validate_material_id(material_id)?;
        validate_query(question, k, temperature)?;

        let index = self.cache.get(material_id).await.ok_or_else(|| {
            AppError::VectorStoreNotFound(format!(
                "Material {material_id} not found or not vectorized"
            ))
        })?;

        let query_embedding = self.embedder.embed(question).await?;
        let hits = index.search(&query_embedding, k)?;
        debug!(
            retrieved = hits.len(),
            nearest_distance = hits.first().map(|(_, distance)| *distance),
            "retrieved context chunks"
        );

        let chunks: Vec<TextChunk> = hits.into_iter().map(|(chunk, _)| chunk).collect();
        let prompt = create_user_message(
            SINGLE_MATERIAL_INSTRUCTIONS,
            &chunks_to_context(&chunks),
            question,
        );
        let answer = self.generator.generate(&prompt, temperature).await?;

        Ok(QueryAnswer {
            answer,
            sources: chunks.iter().map(SourceChunk::from).collect(),
            material_id: material_id.to_string(),
        })
    }
}
