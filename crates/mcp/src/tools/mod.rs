pub mod query;
pub mod schema;
pub mod workspaces;
mod registry;

pub use query::{ExecuteQueryTool, ExecuteRangeQueryTool, ListMetricsTool};
pub use registry::{RegistryError, Tool, ToolContext, ToolError, ToolOutput, ToolRegistry};
pub use schema::{json_schema_object, json_schema_string, SchemaError};
pub use workspaces::{GetAvailableWorkspacesTool, GetServerInfoTool};

use crate::protocol::ServerInfo;
use std::sync::Arc;

/// The fixed tool catalog, in the order `tools/list` reports it
pub const CATALOG: [&str; 5] = [
    workspaces::GET_AVAILABLE_WORKSPACES,
    query::EXECUTE_QUERY,
    query::EXECUTE_RANGE_QUERY,
    query::LIST_METRICS,
    workspaces::GET_SERVER_INFO,
];

/// Build the Prometheus tool registry and check it against [`CATALOG`].
pub fn prometheus_registry(server_info: ServerInfo) -> Result<ToolRegistry, RegistryError> {
    let mut registry = ToolRegistry::new();

    registry.register(Arc::new(GetAvailableWorkspacesTool))?;
    registry.register(Arc::new(ExecuteQueryTool))?;
    registry.register(Arc::new(ExecuteRangeQueryTool))?;
    registry.register(Arc::new(ListMetricsTool))?;
    registry.register(Arc::new(GetServerInfoTool::new(server_info)))?;

    registry.ensure_catalog(&CATALOG)?;
    Ok(registry)
}
