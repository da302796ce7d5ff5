// MCP protocol types and definitions (JSON-RPC 2.0 over HTTP)

use serde::{Deserialize, Serialize};

pub const JSONRPC_VERSION: &str = "2.0";

fn jsonrpc_version() -> String {
    JSONRPC_VERSION.to_string()
}

/// JSON-RPC 2.0 Request
///
/// `id` is `None` both when the member is absent and when it is `null`; either
/// way the request is a notification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    #[serde(default = "jsonrpc_version")]
    pub jsonrpc: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<serde_json::Value>,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,
}

impl JsonRpcRequest {
    pub fn new(
        id: impl Into<serde_json::Value>,
        method: impl Into<String>,
        params: Option<serde_json::Value>,
    ) -> Self {
        Self {
            jsonrpc: jsonrpc_version(),
            id: Some(id.into()),
            method: method.into(),
            params,
        }
    }

    pub fn notification(method: impl Into<String>, params: Option<serde_json::Value>) -> Self {
        Self {
            jsonrpc: jsonrpc_version(),
            id: None,
            method: method.into(),
            params,
        }
    }

    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }
}

/// JSON-RPC 2.0 Response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    pub id: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    pub fn success(id: impl Into<serde_json::Value>, result: serde_json::Value) -> Self {
        Self {
            jsonrpc: jsonrpc_version(),
            id: id.into(),
            result: Some(result),
            error: None,
        }
    }

    pub fn error(id: impl Into<serde_json::Value>, error: JsonRpcError) -> Self {
        Self {
            jsonrpc: jsonrpc_version(),
            id: id.into(),
            result: None,
            error: Some(error),
        }
    }
}

pub const PARSE_ERROR: i32 = -32700;
pub const INVALID_REQUEST: i32 = -32600;
pub const METHOD_NOT_FOUND: i32 = -32601;
pub const INVALID_PARAMS: i32 = -32602;
pub const INTERNAL_ERROR: i32 = -32603;

/// JSON-RPC 2.0 Error
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl JsonRpcError {
    pub fn parse_error() -> Self {
        Self {
            code: PARSE_ERROR,
            message: "Parse error".to_string(),
            data: None,
        }
    }

    pub fn invalid_request() -> Self {
        Self {
            code: INVALID_REQUEST,
            message: "Invalid Request".to_string(),
            data: None,
        }
    }

    pub fn method_not_found(method: &str) -> Self {
        Self {
            code: METHOD_NOT_FOUND,
            message: format!("Method not found: {}", method),
            data: None,
        }
    }

    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self {
            code: INVALID_PARAMS,
            message: message.into(),
            data: None,
        }
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self {
            code: INTERNAL_ERROR,
            message: message.into(),
            data: None,
        }
    }

    pub fn with_data(mut self, data: impl Into<serde_json::Value>) -> Self {
        self.data = Some(data.into());
        self
    }
}

// MCP-specific protocol messages

/// Tool definition for MCP
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    #[serde(rename = "inputSchema")]
    pub input_schema: serde_json::Value,
}

/// List tools response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListToolsResult {
    pub tools: Vec<ToolSchema>,
}

/// Call tool request params
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CallToolParams {
    #[serde(default)]
    pub name: String,
    /// Absent and `null` both mean "no arguments"
    #[serde(default)]
    pub arguments: serde_json::Value,
}

/// Call tool response
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CallToolResult {
    pub content: Vec<ToolContent>,
    #[serde(
        rename = "_meta",
        default,
        skip_serializing_if = "serde_json::Map::is_empty"
    )]
    pub meta: serde_json::Map<String, serde_json::Value>,
}

impl CallToolResult {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![ToolContent::text(text)],
            meta: serde_json::Map::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ToolContent {
    #[serde(rename = "text")]
    Text { text: String },
}

impl ToolContent {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    pub fn as_text(&self) -> &str {
        match self {
            Self::Text { text } => text,
        }
    }
}

/// Initialize request params. Parsed leniently; `initialize` never fails on them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InitializeParams {
    #[serde(rename = "protocolVersion", default)]
    pub protocol_version: Option<String>,
    #[serde(rename = "clientInfo", default)]
    pub client_info: Option<ClientInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientInfo {
    pub name: String,
    #[serde(default)]
    pub version: String,
}

/// Initialize response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitializeResult {
    #[serde(rename = "protocolVersion")]
    pub protocol_version: String,
    pub capabilities: ServerCapabilities,
    #[serde(rename = "serverInfo")]
    pub server_info: ServerInfo,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerCapabilities {
    pub tools: ToolsCapability,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsCapability {
    #[serde(rename = "listChanged")]
    pub list_changed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerInfo {
    pub name: String,
    pub version: String,
}

impl Default for ServerInfo {
    fn default() -> Self {
        Self {
            name: "prometheus-mcp-server".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_null_id_is_notification() {
        let absent: JsonRpcRequest =
            serde_json::from_value(json!({"jsonrpc": "2.0", "method": "notifications/initialized"}))
                .unwrap();
        let null: JsonRpcRequest =
            serde_json::from_value(json!({"jsonrpc": "2.0", "id": null, "method": "tools/list"}))
                .unwrap();
        let zero: JsonRpcRequest =
            serde_json::from_value(json!({"jsonrpc": "2.0", "id": 0, "method": "tools/list"}))
                .unwrap();

        assert!(absent.is_notification());
        assert!(null.is_notification());
        assert!(!zero.is_notification());
    }

    #[test]
    fn test_jsonrpc_member_defaults() {
        let request: JsonRpcRequest =
            serde_json::from_value(json!({"id": "a", "method": "initialize"})).unwrap();
        assert_eq!(request.jsonrpc, "2.0");
        assert!(request.params.is_none());
    }

    #[test]
    fn test_error_envelope_shape() {
        let response = JsonRpcResponse::error(7, JsonRpcError::method_not_found("nope"));
        let value = serde_json::to_value(&response).unwrap();

        assert_eq!(
            value,
            json!({
                "jsonrpc": "2.0",
                "id": 7,
                "error": {"code": -32601, "message": "Method not found: nope"}
            })
        );
    }

    #[test]
    fn test_ids_keep_their_exact_text() {
        for id in ["12345678901234567890123", "-98765432109876543210", "1.10"] {
            let request: JsonRpcRequest =
                serde_json::from_str(&format!(r#"{{"id": {}, "method": "tools/list"}}"#, id)).unwrap();
            let response = JsonRpcResponse::success(request.id.unwrap(), json!({}));

            let wire = serde_json::to_string(&response).unwrap();
            assert!(wire.contains(&format!(r#""id":{}"#, id)), "{}", wire);
        }
    }

    #[test]
    fn test_error_envelope_keeps_null_id() {
        let response = JsonRpcResponse::error(serde_json::Value::Null, JsonRpcError::parse_error());
        let value = serde_json::to_value(&response).unwrap();

        assert!(value.get("id").unwrap().is_null());
        assert_eq!(value["error"]["code"], -32700);
    }

    #[test]
    fn test_tool_content_wire_format() {
        let result = CallToolResult::text("{\"a\": 1}");
        let value = serde_json::to_value(&result).unwrap();

        assert_eq!(value, json!({"content": [{"type": "text", "text": "{\"a\": 1}"}]}));
    }

    #[test]
    fn test_tool_schema_wire_format() {
        let schema = ToolSchema {
            name: "ListMetrics".to_string(),
            description: "List metric names".to_string(),
            input_schema: json!({"type": "object"}),
        };
        let value = serde_json::to_value(&schema).unwrap();

        assert!(value.get("inputSchema").is_some());
        assert!(value.get("input_schema").is_none());
    }

    #[test]
    fn test_call_tool_params_defaults() {
        let params: CallToolParams = serde_json::from_value(json!({"name": "GetServerInfo"})).unwrap();
        assert_eq!(params.name, "GetServerInfo");
        assert!(params.arguments.is_null());
    }
}
