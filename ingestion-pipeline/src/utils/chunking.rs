use common::{
    error::AppError,
    storage::types::text_chunk::{ChunkMetadata, TextChunk},
};
use text_splitter::{Characters, ChunkConfig, TextSplitter};

/// Splits text into overlapping chunks of at most `chunk_size` characters.
///
/// Boundaries are chosen coarsest first: paragraph breaks, then line breaks,
/// then whitespace, then single characters. Chunks are trimmed slices of the
/// input, so their text always appears verbatim in the source.
pub struct Chunker {
    chunk_size: usize,
    chunk_overlap: usize,
    splitter: TextSplitter<Characters>,
}

impl Chunker {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self, AppError> {
        if chunk_size == 0 {
            return Err(AppError::Validation("chunk_size must be positive".into()));
        }
        if chunk_overlap >= chunk_size {
            return Err(AppError::Validation(format!(
                "chunk_overlap ({chunk_overlap}) must be smaller than chunk_size ({chunk_size})"
            )));
        }

        let config = ChunkConfig::new(chunk_size)
            .with_overlap(chunk_overlap)
            .map_err(|e| AppError::Validation(format!("invalid chunk overlap: {e}")))?;

        Ok(Self {
            chunk_size,
            chunk_overlap,
            splitter: TextSplitter::new(config),
        })
    }

    /// Lazily yields the chunks of `text`, each carrying a copy of `metadata`.
    ///
    /// Calling this again on the same input restarts from the first chunk.
    pub fn chunk<'a>(
        &'a self,
        text: &'a str,
        metadata: &'a ChunkMetadata,
    ) -> impl Iterator<Item = TextChunk> + 'a {
        self.splitter
            .chunks(text)
            .enumerate()
            .map(move |(index, chunk)| TextChunk::new(index, chunk.to_owned(), metadata.clone()))
    }

    /// Lower bound on the number of chunks produced for `char_len` characters.
    pub fn minimum_chunks(&self, char_len: usize) -> usize {
        if char_len <= self.chunk_overlap {
            return 1;
        }
        (char_len - self.chunk_overlap).div_ceil(self.chunk_size - self.chunk_overlap)
    }
}
