//! # Hub Configuration
//!
//! Loaded once at start-up from a TOML file. Every section and key is
//! optional; a missing file means "all defaults".

use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Environment variable that overrides `engine.access_token`.
pub const TOKEN_ENV: &str = "PRISM_ACCESS_TOKEN";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed config file: {0}")]
    Parse(#[from] toml::de::Error),
}

#[derive(Deserialize, Default, Clone)]
pub struct Config {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub dispatch: DispatchConfig,
}

#[derive(Deserialize, Clone)]
pub struct EngineConfig {
    #[serde(default = "default_api_host")]
    pub api_host: String,
    #[serde(default)]
    pub edge_url: Option<String>,
    #[serde(default)]
    pub org_id: Option<String>,
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            api_host: default_api_host(),
            edge_url: None,
            org_id: None,
            access_token: None,
            timeout_secs: default_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

/// Where APL queries are sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryEndpoint<'a> {
    /// `{api_host}/v1/datasets/_apl`
    Legacy(&'a str),
    /// `{edge_url}/v1/query/_apl`
    Edge(&'a str),
}

impl EngineConfig {
    pub fn query_endpoint(&self) -> QueryEndpoint<'_> {
        match non_empty(&self.edge_url) {
            Some(edge) => QueryEndpoint::Edge(edge),
            None => QueryEndpoint::Legacy(&self.api_host),
        }
    }

    pub fn org_id(&self) -> Option<&str> {
        non_empty(&self.org_id)
    }

    pub fn access_token(&self) -> Option<&str> {
        non_empty(&self.access_token)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Deserialize, Clone)]
pub struct DispatchConfig {
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default = "default_deadline_secs")]
    pub deadline_secs: u64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            deadline_secs: default_deadline_secs(),
        }
    }
}

impl DispatchConfig {
    pub fn deadline(&self) -> Duration {
        Duration::from_secs(self.deadline_secs)
    }
}

fn default_api_host() -> String {
    "http://localhost:8080".into()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_user_agent() -> String {
    concat!("prism-hub/", env!("CARGO_PKG_VERSION")).into()
}
fn default_concurrency() -> usize {
    crate::dispatch::DEFAULT_CONCURRENCY
}
fn default_deadline_secs() -> u64 {
    60
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

impl Config {
    /// Load `path`, falling back to defaults when it does not exist, then
    /// apply the environment token override.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let mut config = if path.exists() {
            Self::parse(&std::fs::read_to_string(path)?)?
        } else {
            tracing::info!(path = %path.display(), "config file not found, using defaults");
            Self::default()
        };
        config.override_token(std::env::var(TOKEN_ENV).ok());
        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    fn override_token(&mut self, token: Option<String>) {
        if let Some(token) = token.filter(|t| !t.trim().is_empty()) {
            self.engine.access_token = Some(token);
        }
    }
}
