use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use common::storage::{store::resolve_base_dir, types::MaterialMetadata};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{api_state::ApiState, error::ApiError};

#[derive(Debug, Deserialize)]
pub struct VectorizeRequest {
    pub material_id: String,
    /// Absolute, or relative to the configured data directory.
    pub file_path: String,
    pub title: Option<String>,
    pub course_id: Option<String>,
    pub uploaded_by: Option<String>,
}

impl VectorizeRequest {
    fn metadata(&self) -> MaterialMetadata {
        [
            ("title", &self.title),
            ("course_id", &self.course_id),
            ("uploaded_by", &self.uploaded_by),
        ]
        .into_iter()
        .filter_map(|(key, value)| value.clone().map(|value| (key.to_string(), value)))
        .collect()
    }
}

#[derive(Debug, Serialize)]
pub struct VectorizeResponse {
    pub success: bool,
    pub material_id: String,
    pub num_chunks: usize,
    pub total_characters: usize,
    pub message: String,
}

pub async fn vectorize_material(
    State(state): State<ApiState>,
    Json(input): Json<VectorizeRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let file_path = resolve_base_dir(&state.config).join(&input.file_path);
    info!(
        material_id = %input.material_id,
        file_path = %file_path.display(),
        "Received vectorize request"
    );

    let outcome = state
        .ingestion
        .vectorize(&input.material_id, &file_path, input.metadata())
        .await?;

    Ok((
        StatusCode::OK,
        Json(VectorizeResponse {
            success: true,
            message: format!("Successfully vectorized {}", outcome.material_id),
            material_id: outcome.material_id,
            num_chunks: outcome.num_chunks,
            total_characters: outcome.total_characters,
        }),
    ))
}
