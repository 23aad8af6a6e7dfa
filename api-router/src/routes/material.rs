use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use serde_json::json;

use crate::{api_state::ApiState, error::ApiError};

pub async fn delete_material(
    State(state): State<ApiState>,
    Path(material_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    if !state.ingestion.delete(&material_id).await? {
        return Err(ApiError::NotFound("Material not found".to_string()));
    }

    Ok(Json(json!({
        "success": true,
        "message": "Material vectors deleted successfully"
    })))
}
