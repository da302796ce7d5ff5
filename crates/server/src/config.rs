use anyhow::{bail, Context, Result};
use promgate_core::{AmpClient, AwsCredentials, AwsSettings};
use promgate_mcp::protocol::ServerInfo;
use promgate_mcp::tools::{prometheus_registry, ToolContext};
use promgate_mcp::McpServer;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default)]
    pub server: HttpConfig,

    #[serde(default)]
    pub aws: AwsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Name reported by the liveness endpoint
    #[serde(default = "default_service_name")]
    pub service_name: String,

    #[serde(default = "default_rpc_path")]
    pub rpc_path: String,

    #[serde(default = "default_health_path")]
    pub health_path: String,
}

fn default_service_name() -> String {
    "prometheus-mcp-server".to_string()
}

fn default_rpc_path() -> String {
    "/mcp".to_string()
}

fn default_health_path() -> String {
    "/health".to_string()
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            service_name: default_service_name(),
            rpc_path: default_rpc_path(),
            health_path: default_health_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AwsConfig {
    /// Default region; `AWS_REGION` / `AWS_DEFAULT_REGION` take precedence
    #[serde(default)]
    pub region: Option<String>,

    /// Override for the AMP endpoints (e.g. a local SigV4 proxy)
    #[serde(default)]
    pub endpoint_url: Option<String>,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_request_timeout_secs() -> u64 {
    30
}

impl Default for AwsConfig {
    fn default() -> Self {
        Self {
            region: None,
            endpoint_url: None,
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl ServerConfig {
    pub fn load(config_path: &Path) -> Result<Self> {
        // Load config file if it exists, otherwise use defaults
        let config: Self = if config_path.exists() {
            let content = std::fs::read_to_string(config_path)
                .context("Failed to read configuration file")?;
            toml::from_str(&content).context("Failed to parse configuration file")?
        } else {
            tracing::info!("Configuration file not found, using defaults");
            Self::default()
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        for path in [&self.server.rpc_path, &self.server.health_path] {
            if !path.starts_with('/') {
                bail!("Route paths must start with '/': {}", path);
            }
        }
        if self.server.rpc_path == self.server.health_path {
            bail!("rpc_path and health_path must differ");
        }
        Ok(())
    }

    /// Resolve AWS settings from this file plus an environment lookup.
    ///
    /// The lookup is passed in so callers decide where the environment comes
    /// from; `main` uses the process environment.
    pub fn aws_settings(&self, env: impl Fn(&str) -> Option<String>) -> Result<AwsSettings> {
        let var = |name: &str| env(name).filter(|v| !v.trim().is_empty());

        let default_region = var("AWS_REGION")
            .or_else(|| var("AWS_DEFAULT_REGION"))
            .or_else(|| self.aws.region.clone());

        let credentials = match (var("AWS_ACCESS_KEY_ID"), var("AWS_SECRET_ACCESS_KEY")) {
            (Some(key), Some(secret)) => {
                let creds = AwsCredentials::new(key, secret);
                Some(match var("AWS_SESSION_TOKEN") {
                    Some(token) => creds.with_session_token(token),
                    None => creds,
                })
            }
            _ => None,
        };

        let endpoint_url = self
            .aws
            .endpoint_url
            .as_deref()
            .map(url::Url::parse)
            .transpose()
            .context("Invalid aws.endpoint_url")?;

        Ok(AwsSettings {
            default_region,
            credentials,
            endpoint_url,
            request_timeout: Duration::from_secs(self.aws.request_timeout_secs),
        })
    }
}

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub mcp: Arc<McpServer>,
}

impl AppState {
    pub fn new(config: ServerConfig, aws: AwsSettings) -> Result<Self> {
        if aws.default_region.is_none() {
            tracing::warn!("No AWS region configured; tool calls must pass a region");
        }
        if aws.credentials.is_none() {
            tracing::warn!("No AWS credentials configured; backend queries will fail");
        }

        let backend = Arc::new(AmpClient::new(aws.clone()).context("Failed to create AMP client")?);
        let server_info = ServerInfo::default();
        let registry = Arc::new(
            prometheus_registry(server_info.clone()).context("Failed to build tool registry")?,
        );

        tracing::info!("Registered {} tools", registry.len());

        let mcp = McpServer::new(registry, ToolContext::new(backend, aws)).with_server_info(server_info);

        Ok(Self {
            config: Arc::new(config),
            mcp: Arc::new(mcp),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = ServerConfig::load(&dir.path().join("absent.toml")).unwrap();

        assert_eq!(config.server.rpc_path, "/mcp");
        assert_eq!(config.server.health_path, "/health");
        assert_eq!(config.aws.request_timeout_secs, 30);
    }

    #[test]
    fn test_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("promgate.toml");
        std::fs::write(
            &path,
            r#"
[server]
service_name = "metrics-gateway"
rpc_path = "/prod/mcp"

[aws]
region = "eu-west-1"
request_timeout_secs = 10
"#,
        )
        .unwrap();

        let config = ServerConfig::load(&path).unwrap();
        assert_eq!(config.server.service_name, "metrics-gateway");
        assert_eq!(config.server.rpc_path, "/prod/mcp");
        assert_eq!(config.server.health_path, "/health");
        assert_eq!(config.aws.region.as_deref(), Some("eu-west-1"));
        assert_eq!(config.aws.request_timeout_secs, 10);
    }

    #[test]
    fn test_load_rejects_bad_paths() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("promgate.toml");

        std::fs::write(&path, "[server]\nrpc_path = \"mcp\"\n").unwrap();
        assert!(ServerConfig::load(&path).is_err());

        std::fs::write(&path, "[server]\nrpc_path = \"/x\"\nhealth_path = \"/x\"\n").unwrap();
        assert!(ServerConfig::load(&path).is_err());
    }

    #[test]
    fn test_environment_overrides_file_region() {
        let config = ServerConfig {
            aws: AwsConfig {
                region: Some("eu-west-1".to_string()),
                ..Default::default()
            },
            ..Default::default()
        };

        let settings = config.aws_settings(env_from(&[("AWS_REGION", "us-east-2")])).unwrap();
        assert_eq!(settings.default_region.as_deref(), Some("us-east-2"));

        let settings = config.aws_settings(env_from(&[])).unwrap();
        assert_eq!(settings.default_region.as_deref(), Some("eu-west-1"));

        let settings = config
            .aws_settings(env_from(&[("AWS_DEFAULT_REGION", "ap-south-1")]))
            .unwrap();
        assert_eq!(settings.default_region.as_deref(), Some("ap-south-1"));
    }

    #[test]
    fn test_credentials_need_both_halves() {
        let config = ServerConfig::default();

        let partial = config
            .aws_settings(env_from(&[("AWS_ACCESS_KEY_ID", "AKID")]))
            .unwrap();
        assert!(partial.credentials.is_none());

        let full = config
            .aws_settings(env_from(&[
                ("AWS_ACCESS_KEY_ID", "AKID"),
                ("AWS_SECRET_ACCESS_KEY", "secret"),
                ("AWS_SESSION_TOKEN", "token"),
            ]))
            .unwrap();
        let creds = full.credentials.unwrap();
        assert_eq!(creds.access_key_id, "AKID");
        assert_eq!(creds.session_token.as_deref(), Some("token"));
    }

    #[test]
    fn test_invalid_endpoint_url() {
        let config = ServerConfig {
            aws: AwsConfig {
                endpoint_url: Some("not a url".to_string()),
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(config.aws_settings(env_from(&[])).is_err());
    }
}
