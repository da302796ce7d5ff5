// Workspace discovery and server information tools

use crate::protocol::{ServerInfo, ToolSchema};
use crate::tools::schema::{json_schema_object, json_schema_string};
use crate::tools::{Tool, ToolContext, ToolOutput};
use anyhow::{Context, Result};
use promgate_core::aws::{prometheus_url, validate_workspace_id, APS_SERVICE};
use serde::{Deserialize, Serialize};

pub const GET_AVAILABLE_WORKSPACES: &str = "GetAvailableWorkspaces";
pub const GET_SERVER_INFO: &str = "GetServerInfo";

/// Tool to list the ACTIVE Prometheus workspaces of a region
pub struct GetAvailableWorkspacesTool;

#[derive(Debug, Deserialize)]
struct GetAvailableWorkspacesArgs {
    #[serde(default)]
    region: Option<String>,
}

#[derive(Debug, Serialize)]
struct WorkspaceEntry {
    workspace_id: String,
    alias: String,
    status: String,
    prometheus_url: String,
}

#[async_trait::async_trait]
impl Tool for GetAvailableWorkspacesTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: GET_AVAILABLE_WORKSPACES.to_string(),
            description: "List available Prometheus workspaces".to_string(),
            input_schema: json_schema_object(
                serde_json::json!({
                    "region": json_schema_string("AWS region (defaults to the configured region)")
                }),
                vec![],
            ),
        }
    }

    async fn execute(&self, context: &ToolContext, arguments: serde_json::Value) -> Result<ToolOutput> {
        let args: GetAvailableWorkspacesArgs = serde_json::from_value(arguments)
            .context("Invalid arguments for GetAvailableWorkspaces")?;
        let region = context.aws.resolve_region(args.region.as_deref())?;

        let workspaces: Vec<WorkspaceEntry> = context
            .backend
            .list_workspaces(&region)
            .await
            .context("Failed to list workspaces")?
            .into_iter()
            .filter(|ws| ws.is_active())
            .map(|ws| WorkspaceEntry {
                prometheus_url: prometheus_url(&region, &ws.workspace_id),
                alias: ws.alias.unwrap_or_default(),
                status: ws.status.status_code,
                workspace_id: ws.workspace_id,
            })
            .collect();

        Ok(ToolOutput::Json(serde_json::json!({
            "count": workspaces.len(),
            "workspaces": workspaces,
            "region": region,
        })))
    }
}

/// Tool to report how the server reaches the metrics backend
pub struct GetServerInfoTool {
    server_info: ServerInfo,
}

impl GetServerInfoTool {
    pub fn new(server_info: ServerInfo) -> Self {
        Self { server_info }
    }
}

impl Default for GetServerInfoTool {
    fn default() -> Self {
        Self::new(ServerInfo::default())
    }
}

#[derive(Debug, Deserialize)]
struct GetServerInfoArgs {
    #[serde(default)]
    workspace_id: Option<String>,
    #[serde(default)]
    region: Option<String>,
}

#[async_trait::async_trait]
impl Tool for GetServerInfoTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: GET_SERVER_INFO.to_string(),
            description: "Get information about the Prometheus server configuration including \
                          URL, AWS region, and service name. Useful for debugging connection issues."
                .to_string(),
            input_schema: json_schema_object(
                serde_json::json!({
                    "workspace_id": json_schema_string("Prometheus workspace ID"),
                    "region": json_schema_string("AWS region (defaults to the configured region)")
                }),
                vec![],
            ),
        }
    }

    async fn execute(&self, context: &ToolContext, arguments: serde_json::Value) -> Result<ToolOutput> {
        let args: GetServerInfoArgs =
            serde_json::from_value(arguments).context("Invalid arguments for GetServerInfo")?;
        let region = context.aws.resolve_region(args.region.as_deref())?;
        if let Some(workspace_id) = &args.workspace_id {
            validate_workspace_id(workspace_id)?;
        }

        Ok(ToolOutput::Json(serde_json::json!({
            "prometheus_url": args.workspace_id.as_deref().map(|ws| prometheus_url(&region, ws)),
            "aws_region": region,
            "service_name": APS_SERVICE,
            "workspace_id": args.workspace_id,
            "credentials_configured": context.aws.credentials.is_some(),
            "server": self.server_info,
        })))
    }
}
