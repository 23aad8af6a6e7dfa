use serde::{Deserialize, Serialize};

use super::MaterialMetadata;

pub const MATERIAL_ID_KEY: &str = "material_id";
pub const SOURCE_PATH_KEY: &str = "source_path";

/// Metadata carried by every chunk. The owning material id is always present,
/// independent of which retrieval path produced the chunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub material_id: String,
    pub source_path: String,
    #[serde(flatten)]
    pub extra: MaterialMetadata,
}

impl ChunkMetadata {
    /// Reserved keys in `extra` are dropped so they can never shadow the
    /// engine-owned fields once flattened.
    pub fn new(material_id: String, source_path: String, mut extra: MaterialMetadata) -> Self {
        extra.remove(MATERIAL_ID_KEY);
        extra.remove(SOURCE_PATH_KEY);
        Self {
            material_id,
            source_path,
            extra,
        }
    }

    /// Flat view used in citation payloads.
    pub fn to_map(&self) -> MaterialMetadata {
        let mut map = self.extra.clone();
        map.insert(MATERIAL_ID_KEY.to_string(), self.material_id.clone());
        map.insert(SOURCE_PATH_KEY.to_string(), self.source_path.clone());
        map
    }
}

/// A bounded span of one material's text, the unit of retrieval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextChunk {
    /// Position of the chunk within its material, starting at zero.
    pub index: usize,
    pub chunk: String,
    #[serde(default)]
    pub embedding: Vec<f32>,
    pub metadata: ChunkMetadata,
}

impl TextChunk {
    pub fn new(index: usize, chunk: String, metadata: ChunkMetadata) -> Self {
        Self {
            index,
            chunk,
            embedding: Vec::new(),
            metadata,
        }
    }

    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = embedding;
        self
    }

    pub fn material_id(&self) -> &str {
        &self.metadata.material_id
    }

    pub fn char_len(&self) -> usize {
        self.chunk.chars().count()
    }
}

/// Citation entry returned alongside generated answers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceChunk {
    pub content: String,
    pub metadata: MaterialMetadata,
}

impl From<&TextChunk> for SourceChunk {
    fn from(chunk: &TextChunk) -> Self {
        Self {
            content: chunk.chunk.clone(),
            metadata: chunk.metadata.to_map(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata() -> ChunkMetadata {
        let mut extra = MaterialMetadata::new();
        extra.insert("title".into(), "Cell Biology".into());
        extra.insert("material_id".into(), "spoofed".into());
        ChunkMetadata::new("mat-1".into(), "/uploads/cells.pdf".into(), extra)
    }

    #[test]
    fn test_reserved_keys_cannot_be_overridden() {
        let meta = metadata();
        assert_eq!(meta.material_id, "mat-1");
        assert!(!meta.extra.contains_key("material_id"));

        let map = meta.to_map();
        assert_eq!(map.get("material_id").map(String::as_str), Some("mat-1"));
        assert_eq!(map.get("title").map(String::as_str), Some("Cell Biology"));
        assert_eq!(
            map.get("source_path").map(String::as_str),
            Some("/uploads/cells.pdf")
        );
    }

    #[test]
    fn test_metadata_serializes_flat() {
        let json = serde_json::to_value(metadata()).expect("serialize");
        assert_eq!(json["material_id"], "mat-1");
        assert_eq!(json["title"], "Cell Biology");

        let back: ChunkMetadata = serde_json::from_value(json).expect("deserialize");
        assert_eq!(back, metadata());
    }

    #[test]
    fn test_source_chunk_from_text_chunk() {
        let chunk = TextChunk::new(3, "Mitochondria produce ATP.".into(), metadata())
            .with_embedding(vec![0.1, 0.2]);
        let source = SourceChunk::from(&chunk);

        assert_eq!(source.content, "Mitochondria produce ATP.");
        assert_eq!(source.metadata["material_id"], "mat-1");
        assert_eq!(chunk.material_id(), "mat-1");
        assert_eq!(chunk.char_len(), 25);
    }
}
