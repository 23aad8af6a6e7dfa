use common::utils::config::AppConfig;

#[derive(Debug, Clone)]
pub struct IngestionTuning {
    /// Upper bound on characters per chunk.
    pub chunk_size: usize,
    /// Characters carried over from the end of one chunk into the next.
    pub chunk_overlap: usize,
}

impl Default for IngestionTuning {
    fn default() -> Self {
        Self {
            chunk_size: 1_000,
            chunk_overlap: 200,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct IngestionConfig {
    pub tuning: IngestionTuning,
}

impl IngestionConfig {
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            tuning: IngestionTuning {
                chunk_size: config.chunk_size,
                chunk_overlap: config.chunk_overlap,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tuning_follows_app_config() {
        let app = AppConfig {
            chunk_size: 512,
            chunk_overlap: 64,
            ..Default::default()
        };
        let config = IngestionConfig::from_app_config(&app);
        assert_eq!(config.tuning.chunk_size, 512);
        assert_eq!(config.tuning.chunk_overlap, 64);
    }
}
