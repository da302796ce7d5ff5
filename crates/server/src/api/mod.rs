use crate::config::AppState;
use anyhow::Result;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use promgate_mcp::protocol::{JsonRpcError, JsonRpcResponse};
use std::any::Any;
use std::sync::Arc;
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};

mod handlers;

/// Start the API server
pub async fn serve(addr: &str, state: AppState) -> Result<()> {
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("API server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Create the API router
///
/// The liveness route is public; the RPC route expects the host to have
/// authorized the caller already. A wrong method on either path is a plain 404.
pub fn create_router(state: AppState) -> Router {
    let health_path = state.config.server.health_path.clone();
    let rpc_path = state.config.server.rpc_path.clone();

    Router::new()
        .route(&health_path, get(health_check).fallback(not_found))
        .route(&rpc_path, post(handlers::rpc).fallback(not_found))
        .fallback(not_found)
        // Middleware
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new())
                .on_response(DefaultOnResponse::new()),
        )
        .layer(CorsLayer::permissive())
        .with_state(Arc::new(state))
}

/// Health check endpoint
async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": state.config.server.service_name,
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

async fn not_found() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(serde_json::json!({ "error": "Not found" })),
    )
}

/// Last line of defense: a panic anywhere below becomes a JSON-RPC internal
/// error with HTTP 200, so clients can always parse the body.
fn handle_panic(panic: Box<dyn Any + Send + 'static>) -> Response {
    let details = if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic payload".to_string()
    };

    tracing::error!(panic = %details, "Unhandled panic while serving request");

    let envelope = JsonRpcResponse::error(
        serde_json::Value::Null,
        JsonRpcError::internal_error("Internal error"),
    );
    (StatusCode::OK, Json(envelope)).into_response()
}
