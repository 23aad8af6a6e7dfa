use thiserror::Error;
use tokio::task::JoinError;

// Core internal errors
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Extraction error: {0}")]
    Extraction(String),
    #[error("Embedding error: {0}")]
    Embedding(String),
    #[error("Vector store not found: {0}")]
    VectorStoreNotFound(String),
    #[error("Generation error: {0}")]
    Generation(String),
    #[error("Configuration error: {0}")]
    Configuration(String),
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Storage error: {0}")]
    Storage(#[from] object_store::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Task join error: {0}")]
    Join(#[from] JoinError),
    #[error("IoError: {0}")]
    Io(#[from] std::io::Error),
    #[error("Internal service error: {0}")]
    InternalError(String),
}

impl AppError {
    /// Short machine-readable label used in structured logs and API payloads.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Extraction(_) => "extraction_error",
            Self::Embedding(_) => "embedding_error",
            Self::VectorStoreNotFound(_) => "vector_store_not_found",
            Self::Generation(_) => "generation_error",
            Self::Configuration(_) => "configuration_error",
            Self::Validation(_) => "validation_error",
            Self::Storage(_) => "storage_error",
            Self::Serialization(_) => "serialization_error",
            Self::Join(_) | Self::Io(_) | Self::InternalError(_) => "internal_error",
        }
    }
}
