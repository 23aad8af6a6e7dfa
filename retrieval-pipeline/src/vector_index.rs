use std::cmp::Ordering;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use common::{error::AppError, storage::store::StorageManager, storage::types::text_chunk::TextChunk};
use serde::{Deserialize, Serialize};

/// Bumped whenever the persisted layout changes incompatibly.
pub const INDEX_FORMAT_VERSION: u32 = 1;

/// Searchable structure over one material's chunk embeddings.
///
/// Chunks keep their insertion order; search is an exact scan ranked by
/// squared L2 distance with ties resolved by that order.
#[derive(Debug, Clone)]
pub struct VectorIndex {
    material_id: String,
    dimension: usize,
    chunks: Vec<TextChunk>,
}

#[derive(Serialize, Deserialize)]
struct PersistedIndex {
    format_version: u32,
    material_id: String,
    dimension: usize,
    created_at: DateTime<Utc>,
    chunks: Vec<TextChunk>,
}

impl VectorIndex {
    /// Builds a fresh index. Every chunk must carry an embedding and all
    /// embeddings must share one dimension.
    pub fn build(material_id: impl Into<String>, chunks: Vec<TextChunk>) -> Result<Self, AppError> {
        let material_id = material_id.into();
        let dimension = chunks.first().map_or(0, |chunk| chunk.embedding.len());

        for chunk in &chunks {
            if chunk.embedding.is_empty() {
                return Err(AppError::Embedding(format!(
                    "chunk {} of material {} has no embedding",
                    chunk.index,
                    chunk.material_id()
                )));
            }
            if chunk.embedding.len() != dimension {
                return Err(AppError::Embedding(format!(
                    "chunk {} of material {} has {} dimensions, expected {dimension}",
                    chunk.index,
                    chunk.material_id(),
                    chunk.embedding.len()
                )));
            }
        }

        Ok(Self {
            material_id,
            dimension,
            chunks,
        })
    }

    pub fn material_id(&self) -> &str {
        &self.material_id
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn chunks(&self) -> &[TextChunk] {
        &self.chunks
    }

    pub fn total_characters(&self) -> usize {
        self.chunks.iter().map(TextChunk::char_len).sum()
    }

    /// Distinct owning material ids, in order of first appearance.
    pub fn material_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = Vec::new();
        for chunk in &self.chunks {
            if !ids.iter().any(|id| id == chunk.material_id()) {
                ids.push(chunk.material_id().to_string());
            }
        }
        ids
    }

    /// Returns up to `k` chunks nearest to `query`, closest first.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<(TextChunk, f32)>, AppError> {
        if self.chunks.is_empty() || k == 0 {
            return Ok(Vec::new());
        }
        if query.len() != self.dimension {
            return Err(AppError::Embedding(format!(
                "query vector has {} dimensions but index {} uses {}",
                query.len(),
                self.material_id,
                self.dimension
            )));
        }

        let mut ranked: Vec<(usize, f32)> = self
            .chunks
            .iter()
            .enumerate()
            .map(|(position, chunk)| (position, squared_l2(query, &chunk.embedding)))
            .collect();

        ranked.sort_by(|a, b| match a.1.total_cmp(&b.1) {
            Ordering::Equal => a.0.cmp(&b.0),
            other => other,
        });

        Ok(ranked
            .into_iter()
            .take(k)
            .map(|(position, distance)| (self.chunks[position].clone(), distance))
            .collect())
    }

    /// Serializes vectors, chunk text and metadata to `location`.
    pub async fn persist(&self, storage: &StorageManager, location: &str) -> Result<(), AppError> {
        let envelope = PersistedIndex {
            format_version: INDEX_FORMAT_VERSION,
            material_id: self.material_id.clone(),
            dimension: self.dimension,
            created_at: Utc::now(),
            chunks: self.chunks.clone(),
        };
        let body = serde_json::to_vec(&envelope)?;
        storage.put(location, Bytes::from(body)).await?;
        Ok(())
    }

    /// Loads an index written by [`VectorIndex::persist`].
    ///
    /// An absent object yields `VectorStoreNotFound`; unreadable or
    /// inconsistent data yields a serialization or internal error.
    pub async fn load(
        storage: &StorageManager,
        location: &str,
        material_id: &str,
    ) -> Result<Self, AppError> {
        let bytes = match storage.get(location).await {
            Ok(bytes) => bytes,
            Err(object_store::Error::NotFound { .. }) => {
                return Err(AppError::VectorStoreNotFound(format!(
                    "no stored index for material {material_id}"
                )))
            }
            Err(err) => return Err(err.into()),
        };

        let envelope: PersistedIndex = serde_json::from_slice(&bytes)?;
        if envelope.format_version != INDEX_FORMAT_VERSION {
            return Err(AppError::InternalError(format!(
                "stored index for {material_id} has unsupported format version {}",
                envelope.format_version
            )));
        }
        if envelope.material_id != material_id {
            return Err(AppError::InternalError(format!(
                "stored index at {location} belongs to {}, expected {material_id}",
                envelope.material_id
            )));
        }

        let index = Self::build(envelope.material_id, envelope.chunks)?;
        if !index.is_empty() && index.dimension != envelope.dimension {
            return Err(AppError::InternalError(format!(
                "stored index for {material_id} declares {} dimensions but holds {}",
                envelope.dimension, index.dimension
            )));
        }
        Ok(index)
    }
}

fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let diff = x - y;
            diff * diff
        })
        .sum()
}

/// Rejects ids that cannot name exactly one storage object.
pub fn validate_material_id(material_id: &str) -> Result<(), AppError> {
    let trimmed = material_id.trim();
    if trimmed.is_empty() {
        return Err(AppError::Validation("material_id must not be empty".into()));
    }
    if trimmed != material_id
        || material_id == "."
        || material_id == ".."
        || material_id.contains(['/', '\\'])
        || material_id.chars().any(char::is_control)
    {
        return Err(AppError::Validation(format!(
            "material_id '{material_id}' contains unsupported characters"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use common::storage::types::{text_chunk::ChunkMetadata, MaterialMetadata};

    use super::*;

    fn chunk(material_id: &str, index: usize, text: &str, embedding: Vec<f32>) -> TextChunk {
        TextChunk::new(
            index,
            text.into(),
            ChunkMetadata::new(material_id.into(), "notes.txt".into(), MaterialMetadata::new()),
        )
        .with_embedding(embedding)
    }

    fn sample_index() -> VectorIndex {
        VectorIndex::build(
            "bio-101",
            vec![
                chunk("bio-101", 0, "cells", vec![1.0, 0.0, 0.0]),
                chunk("bio-101", 1, "genes", vec![0.0, 1.0, 0.0]),
                chunk("bio-101", 2, "proteins", vec![0.0, 0.0, 1.0]),
            ],
        )
        .expect("index builds")
    }

    #[test]
    fn test_build_rejects_missing_embedding() {
        let result = VectorIndex::build(
            "m",
            vec![
                chunk("m", 0, "a", vec![1.0, 0.0]),
                TextChunk::new(
                    1,
                    "b".into(),
                    ChunkMetadata::new("m".into(), "p".into(), MaterialMetadata::new()),
                ),
            ],
        );
        assert!(matches!(result, Err(AppError::Embedding(_))));
    }

    #[test]
    fn test_build_rejects_dimension_mismatch() {
        let result = VectorIndex::build(
            "m",
            vec![chunk("m", 0, "a", vec![1.0, 0.0]), chunk("m", 1, "b", vec![1.0])],
        );
        assert!(matches!(result, Err(AppError::Embedding(_))));
    }

    #[test]
    fn test_search_orders_by_distance() {
        let index = sample_index();
        let results = index.search(&[0.1, 0.9, 0.0], 2).expect("search");

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].0.chunk, "genes");
        assert!(results[0].1 <= results[1].1);
    }

    #[test]
    fn test_search_breaks_ties_by_insertion_order() {
        let index = VectorIndex::build(
            "m",
            vec![
                chunk("m", 0, "first", vec![1.0, 0.0]),
                chunk("m", 1, "second", vec![0.0, 1.0]),
                chunk("m", 2, "third", vec![1.0, 0.0]),
            ],
        )
        .expect("index builds");

        let results = index.search(&[0.0, 0.0], 3).expect("search");
        let order: Vec<&str> = results.iter().map(|(c, _)| c.chunk.as_str()).collect();
        assert_eq!(order, vec!["first", "second", "third"]);
    }

    #[test]
    fn test_search_caps_at_available_chunks() {
        let index = sample_index();
        assert_eq!(index.search(&[0.0, 0.0, 0.0], 10).expect("search").len(), 3);
        assert!(index.search(&[0.0, 0.0, 0.0], 0).expect("search").is_empty());
    }

    #[test]
    fn test_search_rejects_wrong_query_dimension() {
        let index = sample_index();
        assert!(matches!(
            index.search(&[1.0, 0.0], 1),
            Err(AppError::Embedding(_))
        ));
    }

    #[test]
    fn test_empty_index_searches_to_nothing() {
        let index = VectorIndex::build("pooled", Vec::new()).expect("empty index");
        assert!(index.is_empty());
        assert!(index.search(&[1.0], 3).expect("search").is_empty());
    }

    #[test]
    fn test_material_ids_are_distinct_in_order() {
        let index = VectorIndex::build(
            "pooled",
            vec![
                chunk("b", 0, "x", vec![1.0]),
                chunk("a", 0, "y", vec![1.0]),
                chunk("b", 1, "z", vec![1.0]),
            ],
        )
        .expect("index builds");
        assert_eq!(index.material_ids(), vec!["b".to_string(), "a".to_string()]);
        assert_eq!(index.total_characters(), 3);
    }

    #[tokio::test]
    async fn test_persist_and_load_round_trip() {
        let storage = StorageManager::in_memory();
        let index = sample_index();
        index
            .persist(&storage, "vector_store/bio-101.index.json")
            .await
            .expect("persist");

        let loaded = VectorIndex::load(&storage, "vector_store/bio-101.index.json", "bio-101")
            .await
            .expect("load");
        assert_eq!(loaded.len(), 3);
        assert_eq!(loaded.dimension(), 3);
        assert_eq!(loaded.chunks(), index.chunks());
    }

    #[tokio::test]
    async fn test_load_missing_is_not_found() {
        let storage = StorageManager::in_memory();
        let result = VectorIndex::load(&storage, "vector_store/none.index.json", "none").await;
        assert!(matches!(result, Err(AppError::VectorStoreNotFound(_))));
    }

    #[tokio::test]
    async fn test_load_rejects_corrupt_data() {
        let storage = StorageManager::in_memory();
        storage
            .put("vector_store/bad.index.json", Bytes::from_static(b"not json"))
            .await
            .expect("put");

        let result = VectorIndex::load(&storage, "vector_store/bad.index.json", "bad").await;
        assert!(matches!(result, Err(AppError::Serialization(_))));
    }

    #[tokio::test]
    async fn test_load_rejects_foreign_material() {
        let storage = StorageManager::in_memory();
        sample_index()
            .persist(&storage, "vector_store/other.index.json")
            .await
            .expect("persist");

        let result = VectorIndex::load(&storage, "vector_store/other.index.json", "other").await;
        assert!(matches!(result, Err(AppError::InternalError(_))));
    }

    #[test]
    fn test_validate_material_id() {
        assert!(validate_material_id("65f1c0a2e4b0").is_ok());
        assert!(validate_material_id("").is_err());
        assert!(validate_material_id(" padded").is_err());
        assert!(validate_material_id("../escape").is_err());
        assert!(validate_material_id("..").is_err());
    }
}
