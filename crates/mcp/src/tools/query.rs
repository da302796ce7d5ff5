// PromQL query and metric discovery tools

use crate::protocol::ToolSchema;
use crate::tools::schema::{json_schema_object, json_schema_string};
use crate::tools::{Tool, ToolContext, ToolOutput};
use anyhow::{Context, Result};
use promgate_core::aws::validate_workspace_id;
use promgate_core::{RangeQuery, WorkspaceTarget};
use serde::Deserialize;

pub const EXECUTE_QUERY: &str = "ExecuteQuery";
pub const EXECUTE_RANGE_QUERY: &str = "ExecuteRangeQuery";
pub const LIST_METRICS: &str = "ListMetrics";

fn target(context: &ToolContext, region: Option<&str>, workspace_id: String) -> Result<WorkspaceTarget> {
    let region = context.aws.resolve_region(region)?;
    validate_workspace_id(&workspace_id)?;
    Ok(WorkspaceTarget::new(region, workspace_id))
}

/// A Prometheus envelope without `data` carries nothing to report.
fn envelope_output(envelope: serde_json::Value) -> ToolOutput {
    match envelope.get("data") {
        None | Some(serde_json::Value::Null) => ToolOutput::Empty,
        Some(_) => ToolOutput::Json(envelope),
    }
}

/// Tool to evaluate a PromQL expression at a single instant
pub struct ExecuteQueryTool;

#[derive(Debug, Deserialize)]
struct ExecuteQueryArgs {
    workspace_id: String,
    query: String,
    #[serde(default)]
    time: Option<String>,
    #[serde(default)]
    region: Option<String>,
}

#[async_trait::async_trait]
impl Tool for ExecuteQueryTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: EXECUTE_QUERY.to_string(),
            description: "Execute a PromQL query against Amazon Managed Prometheus at a specific \
                          instant in time. Returns current metric values. For time series data \
                          over a range, use ExecuteRangeQuery instead."
                .to_string(),
            input_schema: json_schema_object(
                serde_json::json!({
                    "workspace_id": json_schema_string("Prometheus workspace ID"),
                    "query": json_schema_string("PromQL query"),
                    "time": json_schema_string("Evaluation timestamp (RFC 3339 or Unix seconds, default: now)"),
                    "region": json_schema_string("AWS region (defaults to the configured region)")
                }),
                vec!["workspace_id", "query"],
            ),
        }
    }

    async fn execute(&self, context: &ToolContext, arguments: serde_json::Value) -> Result<ToolOutput> {
        let args: ExecuteQueryArgs =
            serde_json::from_value(arguments).context("Invalid arguments for ExecuteQuery")?;
        let target = target(context, args.region.as_deref(), args.workspace_id)?;

        let envelope = context
            .backend
            .instant_query(&target, &args.query, args.time.as_deref())
            .await
            .context("Query failed")?;

        Ok(envelope_output(envelope))
    }
}

/// Tool to evaluate a PromQL expression over a time range
pub struct ExecuteRangeQueryTool;

#[derive(Debug, Deserialize)]
struct ExecuteRangeQueryArgs {
    workspace_id: String,
    query: String,
    start: String,
    end: String,
    step: String,
    #[serde(default)]
    region: Option<String>,
}

#[async_trait::async_trait]
impl Tool for ExecuteRangeQueryTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: EXECUTE_RANGE_QUERY.to_string(),
            description: "Execute a PromQL range query over a time period. Returns time series \
                          data useful for generating graphs or trend analysis."
                .to_string(),
            input_schema: json_schema_object(
                serde_json::json!({
                    "workspace_id": json_schema_string("Prometheus workspace ID"),
                    "query": json_schema_string("PromQL query"),
                    "start": json_schema_string("Range start (RFC 3339 or Unix seconds)"),
                    "end": json_schema_string("Range end (RFC 3339 or Unix seconds)"),
                    "step": json_schema_string("Resolution step, e.g. '30s' or '5m'"),
                    "region": json_schema_string("AWS region (defaults to the configured region)")
                }),
                vec!["workspace_id", "query", "start", "end", "step"],
            ),
        }
    }

    async fn execute(&self, context: &ToolContext, arguments: serde_json::Value) -> Result<ToolOutput> {
        let args: ExecuteRangeQueryArgs =
            serde_json::from_value(arguments).context("Invalid arguments for ExecuteRangeQuery")?;
        let target = target(context, args.region.as_deref(), args.workspace_id)?;
        let range = RangeQuery {
            query: args.query,
            start: args.start,
            end: args.end,
            step: args.step,
        };

        let envelope = context
            .backend
            .range_query(&target, &range)
            .await
            .context("Range query failed")?;

        Ok(envelope_output(envelope))
    }
}

/// Tool to list every metric name in a workspace
pub struct ListMetricsTool;

#[derive(Debug, Deserialize)]
struct ListMetricsArgs {
    workspace_id: String,
    #[serde(default)]
    region: Option<String>,
}

#[async_trait::async_trait]
impl Tool for ListMetricsTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: LIST_METRICS.to_string(),
            description: "Get a sorted list of all available metric names in the Prometheus \
                          server. Useful for discovering metrics before crafting specific queries."
                .to_string(),
            input_schema: json_schema_object(
                serde_json::json!({
                    "workspace_id": json_schema_string("Prometheus workspace ID"),
                    "region": json_schema_string("AWS region (defaults to the configured region)")
                }),
                vec!["workspace_id"],
            ),
        }
    }

    async fn execute(&self, context: &ToolContext, arguments: serde_json::Value) -> Result<ToolOutput> {
        let args: ListMetricsArgs =
            serde_json::from_value(arguments).context("Invalid arguments for ListMetrics")?;
        let target = target(context, args.region.as_deref(), args.workspace_id)?;

        let metrics = context
            .backend
            .metric_names(&target)
            .await
            .context("List metrics failed")?;

        // An empty workspace is still an answer
        Ok(ToolOutput::Json(serde_json::json!({ "metrics": metrics })))
    }
}
