// MCP server: routes one JSON-RPC request to the tool registry
//
// Every call is independent. Nothing here remembers a previous request, so a
// cold process and a warm one answer identically.

use crate::protocol::{
    CallToolParams, InitializeParams, InitializeResult, JsonRpcError, JsonRpcRequest,
    JsonRpcResponse, ListToolsResult, ServerCapabilities, ServerInfo, ToolsCapability,
    JSONRPC_VERSION,
};
use crate::tools::{ToolContext, ToolError, ToolRegistry};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Protocol revision announced during `initialize`
pub const PROTOCOL_VERSION: &str = "2024-11-05";

/// Outcome of handling one request
#[derive(Debug, Clone)]
pub enum McpReply {
    /// Correlated response for a request that carried an id
    Response(JsonRpcResponse),
    /// The request was a notification. The transport still has to send a
    /// body, but it carries no `id`, `result` or `error` and callers must not
    /// act on it.
    Notification,
}

impl McpReply {
    pub fn response(&self) -> Option<&JsonRpcResponse> {
        match self {
            Self::Response(response) => Some(response),
            Self::Notification => None,
        }
    }

    /// Wire body for the transport
    pub fn into_json(self) -> Value {
        match self {
            Self::Response(response) => serde_json::to_value(&response).unwrap_or_else(|e| {
                serde_json::json!({
                    "jsonrpc": JSONRPC_VERSION,
                    "id": response.id,
                    "error": JsonRpcError::internal_error(format!("Failed to encode response: {}", e)),
                })
            }),
            Self::Notification => serde_json::json!({ "jsonrpc": JSONRPC_VERSION }),
        }
    }
}

pub struct McpServer {
    registry: Arc<ToolRegistry>,
    context: ToolContext,
    server_info: ServerInfo,
}

impl McpServer {
    pub fn new(registry: Arc<ToolRegistry>, context: ToolContext) -> Self {
        Self {
            registry,
            context,
            server_info: ServerInfo::default(),
        }
    }

    pub fn with_server_info(mut self, server_info: ServerInfo) -> Self {
        self.server_info = server_info;
        self
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Handle an already-decoded JSON document.
    ///
    /// Anything that is not a request object is answered with `-32600`,
    /// using the request id when one can be read and `null` otherwise.
    pub async fn handle_value(&self, raw: Value) -> McpReply {
        let id = match raw.get("id") {
            Some(id @ (Value::String(_) | Value::Number(_) | Value::Null)) => id.clone(),
            Some(_) => {
                return McpReply::Response(JsonRpcResponse::error(
                    Value::Null,
                    JsonRpcError::invalid_request().with_data("id must be a string, number or null"),
                ))
            }
            None => Value::Null,
        };

        match serde_json::from_value::<JsonRpcRequest>(raw) {
            Ok(request) => self.handle(request).await,
            Err(e) => {
                debug!(error = %e, "Rejecting malformed JSON-RPC request");
                McpReply::Response(JsonRpcResponse::error(
                    id,
                    JsonRpcError::invalid_request().with_data(e.to_string()),
                ))
            }
        }
    }

    /// Route one request and format its outcome.
    pub async fn handle(&self, request: JsonRpcRequest) -> McpReply {
        let JsonRpcRequest {
            id, method, params, ..
        } = request;

        let outcome = self.dispatch(&method, params).await;

        match id {
            None => {
                if let Err(e) = &outcome {
                    debug!(method = %method, code = e.code, "Notification failed: {}", e.message);
                }
                McpReply::Notification
            }
            Some(id) => McpReply::Response(match outcome {
                Ok(result) => JsonRpcResponse::success(id, result),
                Err(error) => JsonRpcResponse::error(id, error),
            }),
        }
    }

    async fn dispatch(&self, method: &str, params: Option<Value>) -> Result<Value, JsonRpcError> {
        debug!(method, "Routing request");

        match method {
            "initialize" => self.initialize(params),
            "notifications/initialized" => Ok(serde_json::json!({})),
            "tools/list" => to_result(&ListToolsResult {
                tools: self.registry.list(),
            }),
            "tools/call" => self.call_tool(params).await,
            other => Err(JsonRpcError::method_not_found(other)),
        }
    }

    fn initialize(&self, params: Option<Value>) -> Result<Value, JsonRpcError> {
        // Client params are informational only
        let client = params
            .and_then(|p| serde_json::from_value::<InitializeParams>(p).ok())
            .and_then(|p| p.client_info);
        if let Some(client) = client {
            debug!(client = %client.name, version = %client.version, "Client initializing");
        }

        to_result(&InitializeResult {
            protocol_version: PROTOCOL_VERSION.to_string(),
            capabilities: ServerCapabilities {
                tools: ToolsCapability {
                    list_changed: false,
                },
            },
            server_info: self.server_info.clone(),
        })
    }

    async fn call_tool(&self, params: Option<Value>) -> Result<Value, JsonRpcError> {
        let params: CallToolParams = match params {
            None | Some(Value::Null) => CallToolParams::default(),
            Some(p) => serde_json::from_value(p)
                .map_err(|e| JsonRpcError::invalid_params(format!("Invalid tools/call params: {}", e)))?,
        };
        if params.name.is_empty() {
            return Err(JsonRpcError::invalid_params("Missing tool name"));
        }

        let arguments = match params.arguments {
            Value::Null => Value::Object(serde_json::Map::new()),
            arguments => arguments,
        };

        match self
            .registry
            .invoke(&self.context, &params.name, arguments)
            .await
        {
            Ok(result) => to_result(&result),
            Err(err @ (ToolError::NotFound(_) | ToolError::InvalidArguments { .. })) => {
                warn!(tool = %params.name, "Rejected tool call: {}", err);
                Err(JsonRpcError::invalid_params(err.to_string()))
            }
            Err(err) => {
                error!(tool = %params.name, error = ?err, "Tool execution failed");
                Err(JsonRpcError::internal_error(err.to_string()))
            }
        }
    }
}

fn to_result(value: &impl Serialize) -> Result<Value, JsonRpcError> {
    serde_json::to_value(value)
        .map_err(|e| JsonRpcError::internal_error(format!("Failed to encode result: {}", e)))
}
