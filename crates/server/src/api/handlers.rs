use crate::config::AppState;
use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use promgate_mcp::protocol::{JsonRpcError, JsonRpcResponse};
use serde_json::Value;
use std::sync::Arc;
use tracing::Instrument;

/// JSON-RPC endpoint
///
/// Decodes the body itself so malformed JSON can be answered with a
/// `-32700` envelope instead of axum's plain-text rejection. Every JSON-RPC
/// outcome, errors included, is sent with HTTP 200.
pub async fn rpc(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    let invocation_id = uuid::Uuid::new_v4();
    let span = tracing::info_span!(
        "rpc",
        %invocation_id,
        method = tracing::field::Empty,
        id = tracing::field::Empty
    );

    async move {
        let raw: Value = if body.iter().all(u8::is_ascii_whitespace) {
            Value::Object(serde_json::Map::new())
        } else {
            match serde_json::from_slice(&body) {
                Ok(raw) => raw,
                Err(e) => {
                    tracing::warn!(error = %e, "Request body is not valid JSON");
                    let envelope = JsonRpcResponse::error(
                        Value::Null,
                        JsonRpcError::parse_error().with_data(e.to_string()),
                    );
                    return (StatusCode::BAD_REQUEST, Json(envelope)).into_response();
                }
            }
        };

        let span = tracing::Span::current();
        if let Some(method) = raw.get("method").and_then(Value::as_str) {
            span.record("method", method);
        }
        if let Some(id) = raw.get("id") {
            span.record("id", tracing::field::display(id));
        }

        let reply = state.mcp.handle_value(raw).await;
        tracing::debug!(
            notification = reply.response().is_none(),
            "Request handled"
        );

        (StatusCode::OK, Json(reply.into_json())).into_response()
    }
    .instrument(span)
    .await
}
