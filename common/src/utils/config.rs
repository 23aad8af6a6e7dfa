use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

use crate::{error::AppError, utils::embedding::EmbeddingBackend};

#[derive(Clone, Deserialize, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    Local,
    Memory,
}

fn default_storage_kind() -> StorageKind {
    StorageKind::Local
}

#[derive(Clone, Deserialize, Debug)]
pub struct AppConfig {
    /// Credential for the OpenAI-compatible endpoint used for generation (and
    /// embeddings when the `openai` backend is selected).
    #[serde(default)]
    pub openai_api_key: String,
    #[serde(default = "default_base_url")]
    pub openai_base_url: String,
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    #[serde(default = "default_storage_kind")]
    pub storage: StorageKind,
    #[serde(default = "default_vector_store_prefix")]
    pub vector_store_prefix: String,
    #[serde(default = "default_http_port")]
    pub http_port: u16,
    #[serde(default = "default_generation_model")]
    pub generation_model: String,
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,
    #[serde(default)]
    pub embedding_backend: EmbeddingBackend,
    #[serde(default)]
    pub embedding_model: Option<String>,
    #[serde(default = "default_embedding_dimensions")]
    pub embedding_dimensions: u32,
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
}

fn default_data_dir() -> String {
    "./data".to_string()
}

fn default_base_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta/openai".to_string()
}

fn default_vector_store_prefix() -> String {
    "vector_store".to_string()
}

const fn default_http_port() -> u16 {
    8000
}

fn default_generation_model() -> String {
    "gemini-2.0-flash".to_string()
}

const fn default_max_output_tokens() -> u32 {
    2048
}

const fn default_embedding_dimensions() -> u32 {
    384
}

const fn default_chunk_size() -> usize {
    1000
}

const fn default_chunk_overlap() -> usize {
    200
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            openai_api_key: String::new(),
            openai_base_url: default_base_url(),
            data_dir: default_data_dir(),
            storage: default_storage_kind(),
            vector_store_prefix: default_vector_store_prefix(),
            http_port: default_http_port(),
            generation_model: default_generation_model(),
            max_output_tokens: default_max_output_tokens(),
            embedding_backend: EmbeddingBackend::default(),
            embedding_model: None,
            embedding_dimensions: default_embedding_dimensions(),
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
        }
    }
}

impl AppConfig {
    /// Checks the settings the engine cannot start without.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.openai_api_key.trim().is_empty() {
            return Err(AppError::Configuration(
                "OPENAI_API_KEY must be set for the generation provider".into(),
            ));
        }

        if self.generation_model.trim().is_empty() {
            return Err(AppError::Configuration(
                "GENERATION_MODEL must not be empty".into(),
            ));
        }

        if self.embedding_model.as_deref().is_some_and(|m| m.trim().is_empty()) {
            return Err(AppError::Configuration(
                "EMBEDDING_MODEL must not be empty when provided".into(),
            ));
        }

        if self.embedding_dimensions == 0 {
            return Err(AppError::Configuration(
                "EMBEDDING_DIMENSIONS must be greater than zero".into(),
            ));
        }

        if self.chunk_size == 0 || self.chunk_overlap >= self.chunk_size {
            return Err(AppError::Configuration(format!(
                "CHUNK_OVERLAP ({}) must be smaller than a non-zero CHUNK_SIZE ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }

        if self.vector_store_prefix.trim().is_empty() {
            return Err(AppError::Configuration(
                "VECTOR_STORE_PREFIX must not be empty".into(),
            ));
        }

        Ok(())
    }
}

pub fn get_config() -> Result<AppConfig, ConfigError> {
    let config = Config::builder()
        .add_source(File::with_name("config").required(false))
        .add_source(Environment::default())
        .build()?;

    config.try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> AppConfig {
        AppConfig {
            openai_api_key: "test-key".into(),
            ..Default::default()
        }
    }

    #[test]
    fn defaults_match_documented_chunking() {
        let config = AppConfig::default();
        assert_eq!(config.chunk_size, 1000);
        assert_eq!(config.chunk_overlap, 200);
        assert_eq!(config.max_output_tokens, 2048);
        assert_eq!(config.storage, StorageKind::Local);
    }

    #[test]
    fn validate_accepts_complete_config() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn validate_rejects_missing_api_key() {
        let config = AppConfig::default();
        assert!(matches!(
            config.validate(),
            Err(AppError::Configuration(_))
        ));
    }

    #[test]
    fn validate_rejects_overlap_not_below_size() {
        let config = AppConfig {
            chunk_size: 200,
            chunk_overlap: 200,
            ..valid_config()
        };
        assert!(matches!(
            config.validate(),
            Err(AppError::Configuration(_))
        ));
    }

    #[test]
    fn validate_rejects_blank_embedding_model() {
        let config = AppConfig {
            embedding_model: Some("   ".into()),
            ..valid_config()
        };
        assert!(matches!(
            config.validate(),
            Err(AppError::Configuration(_))
        ));
    }

    #[test]
    fn deserializes_with_defaults_from_partial_source() {
        let config: AppConfig = Config::builder()
            .set_override("openai_api_key", "abc")
            .expect("override")
            .set_override("chunk_size", 512)
            .expect("override")
            .set_override("embedding_backend", "hashed")
            .expect("override")
            .build()
            .expect("build config")
            .try_deserialize()
            .expect("deserialize config");

        assert_eq!(config.openai_api_key, "abc");
        assert_eq!(config.chunk_size, 512);
        assert_eq!(config.chunk_overlap, 200);
        assert_eq!(config.embedding_backend, EmbeddingBackend::Hashed);
        assert_eq!(config.vector_store_prefix, "vector_store");
    }
}
