//! Single-shot invocation with an API-Gateway-shaped event.
//!
//! One event in, one response out, then the process exits. Events that carry
//! an `httpMethod` go through the same router as the HTTP server; anything
//! else is taken to be a bare JSON-RPC request and answered directly.

use crate::api::create_router;
use crate::config::AppState;
use anyhow::{Context, Result};
use axum::body::Body;
use axum::http::Request;
use base64::Engine;
use promgate_mcp::protocol::{JsonRpcError, JsonRpcResponse};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use tower::ServiceExt;

/// Inbound proxy event (the subset the gateway needs)
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayEvent {
    pub http_method: String,
    pub path: String,
    #[serde(default)]
    pub headers: Option<HashMap<String, String>>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub is_base64_encoded: bool,
}

/// Outbound proxy response
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayResponse {
    pub status_code: u16,
    pub headers: BTreeMap<String, String>,
    pub body: String,
}

/// Handle one event and produce the value to hand back to the caller.
pub async fn invoke(state: AppState, event: Value) -> Result<Value> {
    if event.get("httpMethod").is_none() {
        tracing::debug!("Direct invocation without an HTTP envelope");
        return Ok(state.mcp.handle_value(event).await.into_json());
    }

    let event: GatewayEvent =
        serde_json::from_value(event).context("Failed to decode gateway event")?;
    let response = dispatch(state, event).await?;
    Ok(serde_json::to_value(response)?)
}

/// Like [`invoke`], but never fails: any error becomes a JSON-RPC internal
/// error wrapped in a 200 response, after the full error chain is logged.
pub async fn invoke_event(state: AppState, event: Value) -> Value {
    match invoke(state, event).await {
        Ok(response) => response,
        Err(err) => {
            tracing::error!(error = ?err, "Invocation failed");
            let envelope = JsonRpcResponse::error(
                Value::Null,
                JsonRpcError::internal_error("Internal error"),
            );
            let response = GatewayResponse {
                status_code: 200,
                headers: BTreeMap::from([(
                    "content-type".to_string(),
                    "application/json".to_string(),
                )]),
                body: serde_json::to_string(&envelope).unwrap_or_default(),
            };
            serde_json::to_value(response).unwrap_or(Value::Null)
        }
    }
}

async fn dispatch(state: AppState, event: GatewayEvent) -> Result<GatewayResponse> {
    let body = match event.body {
        Some(body) if event.is_base64_encoded => base64::engine::general_purpose::STANDARD
            .decode(body.as_bytes())
            .context("Failed to decode base64 body")?,
        Some(body) => body.into_bytes(),
        None => Vec::new(),
    };

    let mut builder = Request::builder()
        .method(event.http_method.as_str())
        .uri(event.path.as_str());
    for (name, value) in event.headers.iter().flatten() {
        builder = builder.header(name.as_str(), value.as_str());
    }
    let request = builder
        .body(Body::from(body))
        .context("Failed to build request from event")?;

    let response = create_router(state).oneshot(request).await?;

    let status_code = response.status().as_u16();
    let headers = response
        .headers()
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_string(), v.to_string()))
        })
        .collect();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .context("Failed to read response body")?;

    Ok(GatewayResponse {
        status_code,
        headers,
        body: String::from_utf8_lossy(&bytes).into_owned(),
    })
}
