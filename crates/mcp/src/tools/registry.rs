// MCP tool definitions and the registry that executes them

use crate::protocol::{CallToolResult, ToolSchema};
use crate::tools::schema;
use futures::FutureExt;
use promgate_core::{AwsSettings, BackendError, MetricsBackend};
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

/// Everything a tool may touch while it runs.
///
/// Built once by the host and passed to every call, so tests can swap the
/// backend or the AWS settings without touching the environment.
#[derive(Clone)]
pub struct ToolContext {
    pub backend: Arc<dyn MetricsBackend>,
    pub aws: AwsSettings,
}

impl ToolContext {
    pub fn new(backend: Arc<dyn MetricsBackend>, aws: AwsSettings) -> Self {
        Self { backend, aws }
    }
}

/// What a tool body produced
#[derive(Debug, Clone, PartialEq)]
pub enum ToolOutput {
    /// Structured result, sent back as one JSON text block
    Json(serde_json::Value),
    /// Nothing to report; a successful call with no content blocks
    Empty,
}

/// Tool executor trait
#[async_trait::async_trait]
pub trait Tool: Send + Sync {
    /// Get the tool schema for MCP
    fn schema(&self) -> ToolSchema;

    /// Execute the tool with arguments that already passed schema validation
    async fn execute(
        &self,
        context: &ToolContext,
        arguments: serde_json::Value,
    ) -> anyhow::Result<ToolOutput>;
}

/// Failure of one `invoke`, classified at the registry boundary
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ToolError {
    #[error("Unknown tool: {0}")]
    NotFound(String),

    #[error("Invalid arguments for {tool}: {message}")]
    InvalidArguments { tool: String, message: String },

    /// Required configuration (credentials, region) is absent
    #[error("Tool {tool} is not configured: {message}")]
    Configuration { tool: String, message: String },

    #[error("Tool execution failed: {message}")]
    Execution { tool: String, message: String },
}

impl ToolError {
    fn from_failure(tool: &str, err: anyhow::Error) -> Self {
        let backend_errors = || {
            err.chain()
                .filter_map(|cause| cause.downcast_ref::<BackendError>())
        };
        let invalid_argument = backend_errors().any(BackendError::is_invalid_argument);
        let configuration = backend_errors().any(BackendError::is_configuration);
        let message = format!("{:#}", err);

        if invalid_argument {
            Self::InvalidArguments {
                tool: tool.to_string(),
                message,
            }
        } else if configuration {
            Self::Configuration {
                tool: tool.to_string(),
                message,
            }
        } else {
            Self::Execution {
                tool: tool.to_string(),
                message,
            }
        }
    }
}

/// Startup-time registry problems
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("Tool registered twice: {0}")]
    Duplicate(String),

    #[error("Tool {0} has a malformed input schema")]
    InvalidSchema(String),

    #[error("Expected tool catalog {expected:?}, found {found:?}")]
    CatalogMismatch {
        expected: Vec<String>,
        found: Vec<String>,
    },
}

/// Ordered, immutable-after-startup set of tools
pub struct ToolRegistry {
    tools: Vec<(ToolSchema, Arc<dyn Tool>)>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Register a tool. The schema is captured once here.
    pub fn register(&mut self, tool: Arc<dyn Tool>) -> Result<(), RegistryError> {
        let schema = tool.schema();
        if self.index.contains_key(&schema.name) {
            return Err(RegistryError::Duplicate(schema.name));
        }
        if !schema::is_well_formed(&schema.input_schema) {
            return Err(RegistryError::InvalidSchema(schema.name));
        }
        self.index.insert(schema.name.clone(), self.tools.len());
        self.tools.push((schema, tool));
        Ok(())
    }

    /// Fail unless exactly `expected` is registered, in that order.
    pub fn ensure_catalog(&self, expected: &[&str]) -> Result<(), RegistryError> {
        let found: Vec<String> = self.tools.iter().map(|(s, _)| s.name.clone()).collect();
        if found.iter().map(String::as_str).eq(expected.iter().copied()) {
            Ok(())
        } else {
            Err(RegistryError::CatalogMismatch {
                expected: expected.iter().map(|s| s.to_string()).collect(),
                found,
            })
        }
    }

    /// List all tool schemas in registration order
    pub fn list(&self) -> Vec<ToolSchema> {
        self.tools.iter().map(|(schema, _)| schema.clone()).collect()
    }

    /// Check if a tool exists
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Validate arguments, run the tool, and wrap its output as MCP content.
    pub async fn invoke(
        &self,
        context: &ToolContext,
        name: &str,
        arguments: serde_json::Value,
    ) -> Result<CallToolResult, ToolError> {
        let (schema, tool) = self
            .index
            .get(name)
            .map(|&i| &self.tools[i])
            .ok_or_else(|| ToolError::NotFound(name.to_string()))?;

        schema::validate(&schema.input_schema, &arguments).map_err(|e| {
            ToolError::InvalidArguments {
                tool: name.to_string(),
                message: e.to_string(),
            }
        })?;

        let output = match AssertUnwindSafe(tool.execute(context, arguments))
            .catch_unwind()
            .await
        {
            Ok(Ok(output)) => output,
            Ok(Err(err)) => return Err(ToolError::from_failure(name, err)),
            Err(panic) => {
                return Err(ToolError::Execution {
                    tool: name.to_string(),
                    message: panic_message(panic.as_ref()),
                })
            }
        };

        match output {
            ToolOutput::Empty => Ok(CallToolResult::empty()),
            ToolOutput::Json(value) => {
                let text = serde_json::to_string_pretty(&value).map_err(|e| ToolError::Execution {
                    tool: name.to_string(),
                    message: format!("Failed to serialize result: {}", e),
                })?;
                Ok(CallToolResult::text(text))
            }
        }
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        format!("tool panicked: {}", s)
    } else if let Some(s) = panic.downcast_ref::<String>() {
        format!("tool panicked: {}", s)
    } else {
        "tool panicked".to_string()
    }
}
