// Metrics backend contract shared by the query tools

use serde::{Deserialize, Serialize};

pub type BackendResult<T> = Result<T, BackendError>;

/// Errors raised while talking to the metrics backend.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// No credentials were configured for signing.
    #[error("AWS credentials are not configured")]
    MissingCredentials,

    /// Neither the call nor the configuration named a region.
    #[error("AWS region is not configured")]
    MissingRegion,

    /// Region names are plain DNS labels such as `us-west-2`.
    #[error("Invalid AWS region: {0:?}")]
    InvalidRegion(String),

    #[error("Invalid workspace ID: {0:?}")]
    InvalidWorkspaceId(String),

    #[error("Invalid endpoint URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Request signing failed: {0}")]
    Signing(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Backend answered with a non-success status.
    #[error("Backend returned status {status}: {body}")]
    Status { status: u16, body: String },

    /// Prometheus API reported `"status": "error"`.
    #[error("Query error ({error_type}): {message}")]
    Query { error_type: String, message: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl BackendError {
    /// Missing identifying configuration, as opposed to a failed call.
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::MissingCredentials | Self::MissingRegion)
    }

    /// A caller-supplied value that can never address a workspace.
    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, Self::InvalidRegion(_) | Self::InvalidWorkspaceId(_))
    }
}

/// A workspace addressed within a region
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspaceTarget {
    pub region: String,
    pub workspace_id: String,
}

impl WorkspaceTarget {
    pub fn new(region: impl Into<String>, workspace_id: impl Into<String>) -> Self {
        Self {
            region: region.into(),
            workspace_id: workspace_id.into(),
        }
    }
}

/// Parameters of a PromQL range query
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangeQuery {
    pub query: String,
    pub start: String,
    pub end: String,
    pub step: String,
}

/// One workspace as reported by the workspace-management API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceSummary {
    #[serde(rename = "workspaceId")]
    pub workspace_id: String,
    #[serde(default)]
    pub alias: Option<String>,
    #[serde(default)]
    pub status: WorkspaceStatus,
}

impl WorkspaceSummary {
    pub fn is_active(&self) -> bool {
        self.status.status_code == "ACTIVE"
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceStatus {
    #[serde(rename = "statusCode", default)]
    pub status_code: String,
}

/// Read-only access to a Prometheus-compatible metrics service.
///
/// Implementations own transport, signing and response decoding. Callers get
/// either a decoded payload or a [`BackendError`]; no retries happen here.
#[async_trait::async_trait]
pub trait MetricsBackend: Send + Sync {
    /// List every workspace in a region (all statuses).
    async fn list_workspaces(&self, region: &str) -> BackendResult<Vec<WorkspaceSummary>>;

    /// Evaluate an instant query. Returns the full Prometheus response envelope.
    async fn instant_query(
        &self,
        target: &WorkspaceTarget,
        query: &str,
        time: Option<&str>,
    ) -> BackendResult<serde_json::Value>;

    /// Evaluate a range query. Returns the full Prometheus response envelope.
    async fn range_query(
        &self,
        target: &WorkspaceTarget,
        range: &RangeQuery,
    ) -> BackendResult<serde_json::Value>;

    /// Values of the `__name__` label.
    async fn metric_names(&self, target: &WorkspaceTarget) -> BackendResult<Vec<String>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_workspace_summary_from_api() {
        let summary: WorkspaceSummary = serde_json::from_value(serde_json::json!({
            "workspaceId": "ws-abc",
            "alias": "prod",
            "arn": "arn:aws:aps:us-west-2:123456789012:workspace/ws-abc",
            "status": { "statusCode": "ACTIVE" }
        }))
        .unwrap();

        assert_eq!(summary.workspace_id, "ws-abc");
        assert_eq!(summary.alias.as_deref(), Some("prod"));
        assert!(summary.is_active());
    }

    #[test]
    fn test_workspace_summary_defaults() {
        let summary: WorkspaceSummary =
            serde_json::from_value(serde_json::json!({ "workspaceId": "ws-1" })).unwrap();

        assert!(summary.alias.is_none());
        assert!(!summary.is_active());
    }

    #[test]
    fn test_configuration_errors() {
        assert!(BackendError::MissingCredentials.is_configuration());
        assert!(BackendError::MissingRegion.is_configuration());
        assert!(!BackendError::Status {
            status: 503,
            body: "unavailable".to_string()
        }
        .is_configuration());
    }

    #[test]
    fn test_invalid_argument_errors() {
        assert!(BackendError::InvalidRegion("x/y".to_string()).is_invalid_argument());
        assert!(BackendError::InvalidWorkspaceId("..".to_string()).is_invalid_argument());
        assert!(!BackendError::InvalidRegion("x/y".to_string()).is_configuration());
        assert!(!BackendError::MissingRegion.is_invalid_argument());
    }
}
