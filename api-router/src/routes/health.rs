use axum::{extract::State, response::IntoResponse, Json};
use serde_json::json;

use crate::api_state::ApiState;

/// Reports the models the engine was started with.
pub async fn rag_health(State(state): State<ApiState>) -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "model": state.generation_model(),
        "embedding_model": state.embedding_model,
        "embedding_backend": state.embedding_backend,
    }))
}
