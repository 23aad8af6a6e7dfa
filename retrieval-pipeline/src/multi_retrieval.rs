use std::sync::Arc;

use common::{
    error::AppError,
    storage::types::text_chunk::{SourceChunk, TextChunk},
    utils::{embedding::Embedder, llm::Generator},
};
use serde::Serialize;
use tracing::{debug, info, instrument};

use crate::{
    answer_retrieval::{
        chunks_to_attributed_context, create_user_message, validate_query,
        MULTI_MATERIAL_INSTRUCTIONS,
    },
    store_cache::StoreCache,
    vector_index::{validate_material_id, VectorIndex},
};

/// Identifier given to the throwaway index that pools hits across materials.
const POOLED_INDEX_ID: &str = "pooled";

/// Number of missing ids spelled out in a not-found message.
const MISSING_IDS_IN_MESSAGE: usize = 3;

#[derive(Debug, Clone, Serialize)]
pub struct MultiQueryAnswer {
    pub answer: String,
    pub sources: Vec<SourceChunk>,
    /// Materials that contributed at least one chunk, in request order.
    pub materials_searched: Vec<String>,
    /// Requested materials without a stored index.
    pub missing_materials: Vec<String>,
}

/// Answers one question across several materials with a single generation.
///
/// Each material is searched on its own, the hits are pooled into an
/// ephemeral [`VectorIndex`] built from the already-embedded chunks, and the
/// pooled index is searched once more for the final context. Materials that
/// were never vectorized are reported rather than failing the request.
#[derive(Clone)]
pub struct MultiDocumentQueryEngine {
    cache: Arc<StoreCache>,
    embedder: Arc<dyn Embedder>,
    generator: Arc<dyn Generator>,
}

impl MultiDocumentQueryEngine {
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

    #[instrument(skip_all, fields(requested = material_ids.len(), k = k, temperature = temperature))]
    pub async fn query_many(
        &self,
        material_ids: &[String],
        question: &str,
        k: usize,
        temperature: f32,
    ) -> Result<MultiQueryAnswer, AppError> {
        validate_query(question, k, temperature)?;
        let requested = dedup_in_order(material_ids);
        if requested.is_empty() {
            return Err(AppError::Validation(
                "at least one material_id is required".into(),
            ));
        }
        for material_id in &requested {
            validate_material_id(material_id)?;
        }

        let mut indexes: Vec<(&String, Arc<VectorIndex>)> = Vec::new();
        let mut missing: Vec<String> = Vec::new();
        for material_id in &requested {
            match self.cache.get(material_id).await {
                Some(index) => indexes.push((material_id, index)),
                None => missing.push(material_id.clone()),
            }
        }

        if indexes.is_empty() {
            return Err(AppError::VectorStoreNotFound(not_found_message(&missing)));
        }
        let resolved = indexes.len();

        let query_embedding = self.embedder.embed(question).await?;

        let mut pooled: Vec<TextChunk> = Vec::new();
        for (material_id, index) in &indexes {
            let hits = index.search(&query_embedding, k)?;
            debug!(%material_id, hits = hits.len(), "searched material");
            pooled.extend(hits.into_iter().map(|(mut chunk, _)| {
                chunk.metadata.material_id.clone_from(*material_id);
                chunk
            }));
        }

        let pooled = VectorIndex::build(POOLED_INDEX_ID, pooled)?;
        let context_size = k.saturating_mul(requested.len());
        let chunks: Vec<TextChunk> = pooled
            .search(&query_embedding, context_size)?
            .into_iter()
            .map(|(chunk, _)| chunk)
            .collect();

        let materials_searched: Vec<String> = requested
            .iter()
            .filter(|id| chunks.iter().any(|chunk| chunk.material_id() == id.as_str()))
            .cloned()
            .collect();

        info!(
            resolved,
            missing = missing.len(),
            pooled_chunks = pooled.len(),
            context_chunks = chunks.len(),
            "pooled multi-material context"
        );

        let prompt = create_user_message(
            MULTI_MATERIAL_INSTRUCTIONS,
            &chunks_to_attributed_context(&chunks),
            question,
        );
        let answer = self.generator.generate(&prompt, temperature).await?;

        Ok(MultiQueryAnswer {
            answer,
            sources: chunks.iter().map(SourceChunk::from).collect(),
            materials_searched,
            missing_materials: missing,
        })
    }
}

fn dedup_in_order(material_ids: &[String]) -> Vec<String> {
    let mut seen: Vec<String> = Vec::with_capacity(material_ids.len());
    for id in material_ids {
        if !seen.contains(id) {
            seen.push(id.clone());
        }
    }
    seen
}

fn not_found_message(missing: &[String]) -> String {
    let mut listed = missing
        .iter()
        .take(MISSING_IDS_IN_MESSAGE)
        .cloned()
        .collect::<Vec<_>>()
        .join(", ");
    if missing.len() > MISSING_IDS_IN_MESSAGE {
        listed.push_str(&format!(" and {} more", missing.len() - MISSING_IDS_IN_MESSAGE));
    }
    format!(
        "None of the requested materials have been vectorized ({listed}). Vectorize them before querying."
    )
}

#[cfg(test)]
mod tests {
    use common::{
        storage::{
            store::StorageManager,
            types::{text_chunk::ChunkMetadata, MaterialMetadata},
        },
        utils::{embedding::EmbeddingProvider, llm::testing::ScriptedGenerator},
    };

    use async_trait::async_trait;

    use super::*;

    struct UnreachableEmbedder;

    #[async_trait]
    impl Embedder for UnreachableEmbedder {
        fn dimension(&self) -> usize {
            64
        }

        async fn embed(&self, _text: &str) -> Result<Vec<f32>, AppError> {
            Err(AppError::Embedding("provider unreachable".into()))
        }
    }

    struct Fixture {
        engine: MultiDocumentQueryEngine,
        generator: Arc<ScriptedGenerator>,
    }

    async fn commit(cache: &StoreCache, embedder: &EmbeddingProvider, id: &str, texts: &[&str]) {
        let mut chunks = Vec::new();
        for (i, text) in texts.iter().enumerate() {
            let mut extra = MaterialMetadata::new();
            extra.insert("title".into(), format!("Title {id}"));
            chunks.push(
                TextChunk::new(
                    i,
                    (*text).to_string(),
                    ChunkMetadata::new(id.into(), format!("{id}.txt"), extra),
                )
                .with_embedding(embedder.embed(text).await.expect("embed")),
            );
        }
        let guard = cache.write_lock(id).await;
        cache
            .commit(&guard, VectorIndex::build(id, chunks).expect("build"))
            .await
            .expect("commit");
    }

    async fn fixture() -> Fixture {
        let embedder = Arc::new(EmbeddingProvider::new_hashed(64));
        let cache = Arc::new(StoreCache::new(StorageManager::in_memory(), "vector_store"));
        commit(
            &cache,
            &embedder,
            "A",
            &[
                "Newton's second law relates force and acceleration.",
                "Momentum is conserved in closed systems.",
            ],
        )
        .await;
        commit(
            &cache,
            &embedder,
            "C",
            &["Acceleration is the rate of change of velocity."],
        )
        .await;

        let generator = Arc::new(ScriptedGenerator::new("Fused answer."));
        let engine = MultiDocumentQueryEngine::new(cache, embedder, generator.clone());
        Fixture { engine, generator }
    }

    fn ids(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| (*v).to_string()).collect()
    }

    #[tokio::test]
    async fn test_partial_resolution_reports_missing() {
        let fx = fixture().await;
        let answer = fx
            .engine
            .query_many(&ids(&["A", "B"]), "What is acceleration?", 2, 0.3)
            .await
            .expect("partial query succeeds");

        assert_eq!(answer.materials_searched, vec!["A".to_string()]);
        assert_eq!(answer.missing_materials, vec!["B".to_string()]);
        assert_eq!(answer.answer, "Fused answer.");
        assert!(answer
            .sources
            .iter()
            .all(|source| source.metadata["material_id"] == "A"));
    }

    #[tokio::test]
    async fn test_all_missing_fails_with_descriptive_error() {
        let fx = fixture().await;
        let result = fx
            .engine
            .query_many(&ids(&["X", "Y", "Z", "W"]), "Anything?", 2, 0.3)
            .await;

        match result {
            Err(AppError::VectorStoreNotFound(message)) => {
                assert!(message.contains("X, Y, Z"));
                assert!(message.contains("1 more"));
                assert!(message.contains("Vectorize"));
            }
            other => panic!("expected not-found error, got {other:?}"),
        }
        assert!(fx.generator.calls().is_empty());
    }

    #[tokio::test]
    async fn test_unresolved_materials_fail_before_embedding() {
        let cache = Arc::new(StoreCache::new(StorageManager::in_memory(), "vector_store"));
        let generator = Arc::new(ScriptedGenerator::new("unused"));
        let engine =
            MultiDocumentQueryEngine::new(cache, Arc::new(UnreachableEmbedder), generator.clone());

        let result = engine
            .query_many(&ids(&["X", "Y"]), "Anything?", 2, 0.3)
            .await;

        match result {
            Err(err) => assert_eq!(err.kind(), "vector_store_not_found"),
            Ok(answer) => panic!("expected not-found error, got {answer:?}"),
        }
        assert!(generator.calls().is_empty());
    }

    #[tokio::test]
    async fn test_pools_context_across_materials() {
        let fx = fixture().await;
        let answer = fx
            .engine
            .query_many(&ids(&["A", "C", "A"]), "acceleration", 1, 0.0)
            .await
            .expect("query succeeds");

        // One hit per material, context sized k * distinct requested ids.
        assert_eq!(answer.sources.len(), 2);
        assert_eq!(
            answer.materials_searched,
            vec!["A".to_string(), "C".to_string()]
        );
        assert!(answer.missing_materials.is_empty());

        let calls = fx.generator.calls();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].0.contains("[Material: Title A (A)]"));
        assert!(calls[0].0.contains("[Material: Title C (C)]"));
        assert!(calls[0].0.contains("reference which material"));
    }

    #[tokio::test]
    async fn test_rejects_empty_id_list() {
        let fx = fixture().await;
        let result = fx.engine.query_many(&[], "question", 3, 0.3).await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[test]
    fn test_dedup_keeps_first_occurrence_order() {
        assert_eq!(dedup_in_order(&ids(&["b", "a", "b", "c", "a"])), ids(&["b", "a", "c"]));
    }
}
