use api_state::ApiState;
use axum::{
    extract::FromRef,
    routing::{delete, get, post},
    Router,
};
use routes::{
    health::rag_health,
    liveness::live,
    material::delete_material,
    query::{query_material, query_multiple_materials},
    readiness::ready,
    vectorize::vectorize_material,
};

pub mod api_state;
pub mod error;
mod routes;

/// Router for API functionality, version 1
pub fn api_routes_v1<S>() -> Router<S>
where
    S: Clone + Send + Sync + 'static,
    ApiState: FromRef<S>,
{
    // Process probes for k8s/systemd
    let probes = Router::new()
        .route("/ready", get(ready))
        .route("/live", get(live));

    let rag = Router::new()
        .route("/vectorize", post(vectorize_material))
        .route("/query", post(query_material))
        .route("/query-multiple", post(query_multiple_materials))
        .route("/material/{material_id}", delete(delete_material))
        .route("/health", get(rag_health));

    probes.nest("/rag", rag)
}
