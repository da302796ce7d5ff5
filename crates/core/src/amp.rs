// Amazon Managed Service for Prometheus client

use crate::aws::{AwsSettings, APS_SERVICE};
use crate::backend::{
    BackendError, BackendResult, MetricsBackend, RangeQuery, WorkspaceSummary, WorkspaceTarget,
};
use crate::sigv4::{self, SigningScope};
use chrono::Utc;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashSet;
use tracing::{debug, warn};
use url::Url;

/// SigV4-signed HTTP client for AMP workspaces and the workspace-management API
#[derive(Debug, Clone)]
pub struct AmpClient {
    http: reqwest::Client,
    settings: AwsSettings,
}

/// Upper bound on ListWorkspaces pages fetched for one call
const MAX_WORKSPACE_PAGES: usize = 100;

#[derive(Debug, Deserialize)]
struct ListWorkspacesPage {
    #[serde(default)]
    workspaces: Vec<WorkspaceSummary>,
    #[serde(rename = "nextToken", default)]
    next_token: Option<String>,
}

impl AmpClient {
    pub fn new(settings: AwsSettings) -> BackendResult<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("promgate/", env!("CARGO_PKG_VERSION")))
            .timeout(settings.request_timeout)
            .build()?;

        Ok(Self { http, settings })
    }

    pub fn settings(&self) -> &AwsSettings {
        &self.settings
    }

    async fn signed_get(
        &self,
        region: &str,
        url: Url,
        query: &[(&str, &str)],
    ) -> BackendResult<Value> {
        let credentials = self.settings.require_credentials()?;
        let scope = SigningScope {
            credentials,
            region,
            service: APS_SERVICE,
        };
        let signed = sigv4::sign("GET", &url, query, b"", scope, Utc::now())?;

        debug!(url = %signed.url, "GET backend request");

        let mut request = self.http.get(signed.url);
        for (name, value) in &signed.headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(error_from_response(status.as_u16(), &body));
        }

        Ok(response.json().await?)
    }

    async fn prometheus_get(
        &self,
        target: &WorkspaceTarget,
        path: &str,
        query: &[(&str, &str)],
    ) -> BackendResult<Value> {
        let url = self
            .settings
            .workspace_url(&target.region, &target.workspace_id)?
            .join(path)?;
        let body = self.signed_get(&target.region, url, query).await?;
        check_prometheus_status(body)
    }
}

#[async_trait::async_trait]
impl MetricsBackend for AmpClient {
    async fn list_workspaces(&self, region: &str) -> BackendResult<Vec<WorkspaceSummary>> {
        let url = self.settings.control_plane_url(region)?;
        let mut workspaces = Vec::new();
        let mut next_token: Option<String> = None;
        let mut seen_tokens = HashSet::new();

        for _ in 0..MAX_WORKSPACE_PAGES {
            let query: Vec<(&str, &str)> = match next_token.as_deref() {
                Some(token) => vec![("nextToken", token)],
                None => Vec::new(),
            };
            let body = self.signed_get(region, url.clone(), &query).await?;
            let page: ListWorkspacesPage = serde_json::from_value(body)?;

            workspaces.extend(page.workspaces);
            next_token = next_page_token(&mut seen_tokens, page.next_token);
            if next_token.is_none() {
                return Ok(workspaces);
            }
        }

        warn!(
            region,
            pages = MAX_WORKSPACE_PAGES,
            "Stopped listing workspaces at the page limit"
        );
        Ok(workspaces)
    }

    async fn instant_query(
        &self,
        target: &WorkspaceTarget,
        query: &str,
        time: Option<&str>,
    ) -> BackendResult<Value> {
        let mut params = vec![("query", query)];
        if let Some(time) = time {
            params.push(("time", time));
        }
        self.prometheus_get(target, "api/v1/query", &params).await
    }

    async fn range_query(&self, target: &WorkspaceTarget, range: &RangeQuery) -> BackendResult<Value> {
        let params = [
            ("query", range.query.as_str()),
            ("start", range.start.as_str()),
            ("end", range.end.as_str()),
            ("step", range.step.as_str()),
        ];
        self.prometheus_get(target, "api/v1/query_range", &params).await
    }

    async fn metric_names(&self, target: &WorkspaceTarget) -> BackendResult<Vec<String>> {
        let body = self
            .prometheus_get(target, "api/v1/label/__name__/values", &[])
            .await?;
        decode_label_values(body)
    }
}

/// Surface a Prometheus `"status": "error"` envelope as a [`BackendError::Query`].
fn check_prometheus_status(body: Value) -> BackendResult<Value> {
    if body.get("status").and_then(Value::as_str) == Some("error") {
        return Err(prometheus_error(&body));
    }
    Ok(body)
}

fn prometheus_error(body: &Value) -> BackendError {
    BackendError::Query {
        error_type: body
            .get("errorType")
            .and_then(Value::as_str)
            .unwrap_or("unknown")
            .to_string(),
        message: body
            .get("error")
            .and_then(Value::as_str)
            .unwrap_or("query failed")
            .to_string(),
    }
}

fn error_from_response(status: u16, body: &str) -> BackendError {
    match serde_json::from_str::<Value>(body) {
        Ok(json) if json.get("status").and_then(Value::as_str) == Some("error") => {
            prometheus_error(&json)
        }
        _ => BackendError::Status {
            status,
            body: body.to_string(),
        },
    }
}

/// The token for the next page, or `None` when paging is done. A token the
/// backend already handed out also ends paging.
fn next_page_token(seen: &mut HashSet<String>, token: Option<String>) -> Option<String> {
    let token = token.filter(|t| !t.is_empty())?;
    if !seen.insert(token.clone()) {
        warn!(token = %token, "Workspace listing repeated a page token");
        return None;
    }
    Some(token)
}

fn decode_label_values(body: Value) -> BackendResult<Vec<String>> {
    let mut names: Vec<String> = match body.get("data") {
        None | Some(Value::Null) => Vec::new(),
        Some(data) => serde_json::from_value(data.clone())?,
    };
    names.sort();
    Ok(names)
}
