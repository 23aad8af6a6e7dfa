use axum::{extract::State, response::IntoResponse, Json};
use common::storage::types::text_chunk::SourceChunk;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{api_state::ApiState, error::ApiError};

const fn default_single_results() -> usize {
    5
}

const fn default_multi_results() -> usize {
    3
}

const fn default_temperature() -> f32 {
    0.3
}

#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    pub material_id: String,
    pub query: String,
    #[serde(default = "default_single_results")]
    pub num_results: usize,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

#[derive(Debug, Serialize)]
pub struct QueryResponse {
    pub success: bool,
    pub answer: String,
    pub sources: Vec<SourceChunk>,
    pub material_id: String,
}

#[derive(Debug, Deserialize)]
pub struct MultiQueryRequest {
    pub material_ids: Vec<String>,
    pub query: String,
    /// Chunks taken from each material.
    #[serde(default = "default_multi_results")]
    pub num_results: usize,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

#[derive(Debug, Serialize)]
pub struct MultiQueryResponse {
    pub success: bool,
    pub answer: String,
    pub sources: Vec<SourceChunk>,
    pub material_ids: Vec<String>,
    pub num_materials_searched: usize,
    pub missing_material_ids: Vec<String>,
}

pub async fn query_material(
    State(state): State<ApiState>,
    Json(input): Json<QueryRequest>,
) -> Result<impl IntoResponse, ApiError> {
    info!(
        material_id = %input.material_id,
        num_results = input.num_results,
        "Received query request"
    );

    let answer = state
        .query_engine
        .query(
            &input.material_id,
            &input.query,
            input.num_results,
            input.temperature,
        )
        .await?;

    Ok(Json(QueryResponse {
        success: true,
        answer: answer.answer,
        sources: answer.sources,
        material_id: answer.material_id,
    }))
}

pub async fn query_multiple_materials(
    State(state): State<ApiState>,
    Json(input): Json<MultiQueryRequest>,
) -> Result<impl IntoResponse, ApiError> {
    info!(
        requested = input.material_ids.len(),
        num_results = input.num_results,
        "Received multi-material query request"
    );

    let answer = state
        .multi_engine
        .query_many(
            &input.material_ids,
            &input.query,
            input.num_results,
            input.temperature,
        )
        .await?;

    Ok(Json(MultiQueryResponse {
        success: true,
        answer: answer.answer,
        sources: answer.sources,
        num_materials_searched: answer.materials_searched.len(),
        material_ids: answer.materials_searched,
        missing_material_ids: answer.missing_materials,
    }))
}
