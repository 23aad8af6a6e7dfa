use std::sync::Arc;

use api_router::{api_routes_v1, api_state::ApiState};
use axum::{extract::FromRef, Router};
use common::{
    storage::store::StorageManager,
    utils::{
        config::get_config,
        embedding::{Embedder, EmbeddingProvider},
        llm::LlmProvider,
    },
};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main(flavor = "multi_thread", worker_threads = 2)]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Set up tracing
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env())
        .try_init()
        .ok();

    // Get config
    let config = get_config()?;
    config.validate()?;

    let openai_client = Arc::new(async_openai::Client::with_config(
        async_openai::config::OpenAIConfig::new()
            .with_api_key(&config.openai_api_key)
            .with_api_base(&config.openai_base_url),
    ));

    // Create global storage manager
    let storage = StorageManager::new(&config).await?;
    info!(
        storage_backend = ?storage.backend_kind(),
        local_base = ?storage.local_base_path(),
        "Storage initialized"
    );

    // Create embedding provider based on config
    let embedding_provider = Arc::new(
        EmbeddingProvider::from_config(&config, Some(openai_client.clone())).await?,
    );
    info!(
        embedding_backend = ?config.embedding_backend,
        embedding_dimension = embedding_provider.dimension(),
        "Embedding provider initialized"
    );

    let generator = Arc::new(LlmProvider::from_config(&config, openai_client));
    info!(model = %config.generation_model, "Generation provider initialized");

    let api_state = ApiState::new(&config, storage, embedding_provider, generator)?;
    let app = build_app(api_state);

    info!("Starting server listening on 0.0.0.0:{}", config.http_port);
    let serve_address = format!("0.0.0.0:{}", config.http_port);
    let listener = tokio::net::TcpListener::bind(serve_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn build_app(api_state: ApiState) -> Router {
    Router::new()
        .nest("/api/v1", api_routes_v1())
        .with_state(AppState { api_state })
}

#[derive(Clone, FromRef)]
struct AppState {
    api_state: ApiState,
}

#[cfg(test)]
mod tests {
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
    };
    use common::{
        storage::store::testing::test_config_memory, utils::llm::testing::ScriptedGenerator,
    };
    use tower::ServiceExt;

    use super::*;

    async fn smoke_app() -> Router {
        let config = test_config_memory();
        let storage = StorageManager::new(&config)
            .await
            .expect("memory storage");
        let api_state = ApiState::new(
            &config,
            storage,
            Arc::new(EmbeddingProvider::new_hashed(32)),
            Arc::new(ScriptedGenerator::new("ok")),
        )
        .expect("api state");
        build_app(api_state)
    }

    #[tokio::test]
    async fn smoke_startup_serves_probes_and_health() {
        let app = smoke_app().await;

        for uri in ["/api/v1/live", "/api/v1/ready", "/api/v1/rag/health"] {
            let response = app
                .clone()
                .oneshot(Request::builder().uri(uri).body(Body::empty()).expect("request"))
                .await
                .expect("response");
            assert_eq!(response.status(), StatusCode::OK, "{uri}");
        }
    }

    #[tokio::test]
    async fn smoke_unknown_material_query_is_not_found() {
        let app = smoke_app().await;
        let request = Request::builder()
            .method("POST")
            .uri("/api/v1/rag/query")
            .header("content-type", "application/json")
            .body(Body::from(
                serde_json::json!({"material_id": "missing", "query": "hello?"}).to_string(),
            ))
            .expect("request");

        let response = app.oneshot(request).await.expect("response");
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        let body: serde_json::Value = serde_json::from_slice(&bytes).expect("json");
        assert_eq!(body["success"], false);
    }
}
