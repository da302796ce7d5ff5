// AWS identity and endpoint settings for the metrics backend

use crate::backend::{BackendError, BackendResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use url::Url;

/// Signing service name for Amazon Managed Service for Prometheus
pub const APS_SERVICE: &str = "aps";

/// Static AWS credentials used to sign backend requests
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AwsCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_token: Option<String>,
}

impl AwsCredentials {
    pub fn new(access_key_id: impl Into<String>, secret_access_key: impl Into<String>) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
            session_token: None,
        }
    }

    pub fn with_session_token(mut self, token: impl Into<String>) -> Self {
        self.session_token = Some(token.into());
        self
    }
}

// Never print the secret half of the key pair
impl fmt::Debug for AwsCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AwsCredentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("session_token", &self.session_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Settings threaded into every backend call.
///
/// Nothing here is read from the process environment; the server crate
/// resolves these once at startup and hands them down.
#[derive(Debug, Clone)]
pub struct AwsSettings {
    /// Region used when a tool call does not name one
    pub default_region: Option<String>,
    pub credentials: Option<AwsCredentials>,
    /// Replaces both the workspace and control-plane hosts (local proxies, tests)
    pub endpoint_url: Option<Url>,
    /// Per-request HTTP timeout toward the backend
    pub request_timeout: Duration,
}

impl Default for AwsSettings {
    fn default() -> Self {
        Self {
            default_region: None,
            credentials: None,
            endpoint_url: None,
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl AwsSettings {
    /// Pick the region for a call: an explicit argument wins over the default.
    ///
    /// The region ends up in the backend hostname, so anything but a plain
    /// `[a-z0-9-]` label is rejected.
    pub fn resolve_region(&self, requested: Option<&str>) -> BackendResult<String> {
        let region = requested
            .filter(|r| !r.trim().is_empty())
            .map(str::to_string)
            .or_else(|| self.default_region.clone())
            .ok_or(BackendError::MissingRegion)?;
        validate_region(&region)?;
        Ok(region)
    }

    pub fn require_credentials(&self) -> BackendResult<&AwsCredentials> {
        self.credentials.as_ref().ok_or(BackendError::MissingCredentials)
    }

    /// Base URL of one workspace's Prometheus-compatible API
    pub fn workspace_url(&self, region: &str, workspace_id: &str) -> BackendResult<Url> {
        validate_region(region)?;
        validate_workspace_id(workspace_id)?;
        let mut url = match &self.endpoint_url {
            Some(endpoint) => endpoint.clone(),
            None => Url::parse(&format!("https://aps-workspaces.{}.amazonaws.com", region))?,
        };
        url.path_segments_mut()
            .map_err(|_| url::ParseError::RelativeUrlWithCannotBeABaseBase)?
            .pop_if_empty()
            .extend(["workspaces", workspace_id, ""]);
        Ok(url)
    }

    /// URL of the workspace-management API for a region
    pub fn control_plane_url(&self, region: &str) -> BackendResult<Url> {
        validate_region(region)?;
        let base = match &self.endpoint_url {
            Some(endpoint) => endpoint.clone(),
            None => Url::parse(&format!("https://aps.{}.amazonaws.com", region))?,
        };
        Ok(base.join("workspaces")?)
    }
}

/// Reject region names that are not a single lowercase DNS label.
pub fn validate_region(region: &str) -> BackendResult<()> {
    let valid = !region.is_empty()
        && region
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-');
    if valid {
        Ok(())
    } else {
        Err(BackendError::InvalidRegion(region.to_string()))
    }
}

/// Reject workspace IDs that could leave their own path segment.
pub fn validate_workspace_id(workspace_id: &str) -> BackendResult<()> {
    let valid = !workspace_id.is_empty()
        && workspace_id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_');
    if valid {
        Ok(())
    } else {
        Err(BackendError::InvalidWorkspaceId(workspace_id.to_string()))
    }
}

/// Public URL of a workspace, as reported to callers
pub fn prometheus_url(region: &str, workspace_id: &str) -> String {
    format!(
        "https://aps-workspaces.{}.amazonaws.com/workspaces/{}",
        region, workspace_id
    )
}
