// In-memory metrics backend for unit tests

use crate::tools::ToolContext;
use promgate_core::aws::AwsCredentials;
use promgate_core::backend::WorkspaceStatus;
use promgate_core::{
    AwsSettings, BackendError, BackendResult, MetricsBackend, RangeQuery, WorkspaceSummary,
    WorkspaceTarget,
};
use serde_json::{json, Value};
use std::sync::Arc;

pub struct StaticBackend {
    pub workspaces: Vec<WorkspaceSummary>,
    pub query_response: Value,
    pub metric_names: Vec<String>,
    /// Every call fails with a 503 when set
    pub unavailable: bool,
}

impl Default for StaticBackend {
    fn default() -> Self {
        Self {
            workspaces: vec![
                workspace("ws-active", Some("prod"), "ACTIVE"),
                workspace("ws-creating", None, "CREATING"),
            ],
            query_response: json!({
                "status": "success",
                "data": {
                    "resultType": "vector",
                    "result": [
                        {"metric": {"__name__": "up", "job": "node"}, "value": [1700000000.0, "1"]}
                    ]
                }
            }),
            metric_names: vec!["node_load1".to_string(), "up".to_string()],
            unavailable: false,
        }
    }
}

impl StaticBackend {
    pub fn unavailable() -> Self {
        Self {
            unavailable: true,
            ..Default::default()
        }
    }

    fn check(&self) -> BackendResult<()> {
        if self.unavailable {
            return Err(BackendError::Status {
                status: 503,
                body: "Service Unavailable".to_string(),
            });
        }
        Ok(())
    }
}

fn workspace(id: &str, alias: Option<&str>, status: &str) -> WorkspaceSummary {
    WorkspaceSummary {
        workspace_id: id.to_string(),
        alias: alias.map(str::to_string),
        status: WorkspaceStatus {
            status_code: status.to_string(),
        },
    }
}

#[async_trait::async_trait]
impl MetricsBackend for StaticBackend {
    async fn list_workspaces(&self, _region: &str) -> BackendResult<Vec<WorkspaceSummary>> {
        self.check()?;
        Ok(self.workspaces.clone())
    }

    async fn instant_query(
        &self,
        _target: &WorkspaceTarget,
        _query: &str,
        _time: Option<&str>,
    ) -> BackendResult<Value> {
        self.check()?;
        Ok(self.query_response.clone())
    }

    async fn range_query(&self, _target: &WorkspaceTarget, _range: &RangeQuery) -> BackendResult<Value> {
        self.check()?;
        Ok(self.query_response.clone())
    }

    async fn metric_names(&self, _target: &WorkspaceTarget) -> BackendResult<Vec<String>> {
        self.check()?;
        Ok(self.metric_names.clone())
    }
}

pub fn configured_settings() -> AwsSettings {
    AwsSettings {
        default_region: Some("us-west-2".to_string()),
        credentials: Some(AwsCredentials::new("AKIDTEST", "secret")),
        ..Default::default()
    }
}

pub fn context(backend: StaticBackend) -> ToolContext {
    context_with(backend, configured_settings())
}

pub fn context_with(backend: StaticBackend, aws: AwsSettings) -> ToolContext {
    ToolContext::new(Arc::new(backend), aws)
}
