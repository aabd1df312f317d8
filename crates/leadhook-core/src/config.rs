use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize)]
pub struct LeadhookConfig {
    pub instance: InstanceConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub graph: GraphConfig,
    #[serde(default)]
    pub webhook: WebhookConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InstanceConfig {
    pub name: String,
    /// Site identifier. Scopes the meta log file and request context.
    #[serde(default = "default_site")]
    pub site: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_db_path")]
    pub db_path: String,
    /// Public URL the platform reaches us on; callback URLs derive from it.
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

fn default_site() -> String {
    "default".to_string()
}

fn default_port() -> u16 {
    3200
}

fn default_db_path() -> String {
    "leadhook.db".to_string()
}

fn default_base_url() -> String {
    "http://localhost:3200".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_dir")]
    pub dir: PathBuf,
    #[serde(default = "default_max_bytes")]
    pub max_bytes: u64,
    #[serde(default = "default_backups")]
    pub backups: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            dir: default_log_dir(),
            max_bytes: default_max_bytes(),
            backups: default_backups(),
        }
    }
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("logs")
}

fn default_max_bytes() -> u64 {
    10 * 1024 * 1024
}

fn default_backups() -> usize {
    5
}

#[derive(Debug, Clone, Deserialize)]
pub struct GraphConfig {
    #[serde(default = "default_graph_base_url")]
    pub base_url: String,
    #[serde(default = "default_api_version")]
    pub api_version: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            base_url: default_graph_base_url(),
            api_version: default_api_version(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_graph_base_url() -> String {
    "https://graph.facebook.com".to_string()
}

fn default_api_version() -> String {
    "v24.0".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookConfig {
    /// Reject lead events whose `X-Hub-Signature-256` does not match the
    /// app secret.
    #[serde(default)]
    pub require_signature: bool,
}

impl LeadhookConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: LeadhookConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// URL the platform calls for verification and lead events.
    pub fn webhook_url(&self) -> String {
        format!("{}/api/webhook", self.instance.base_url.trim_end_matches('/'))
    }

    pub fn oauth_redirect_uri(&self) -> String {
        format!(
            "{}/api/oauth/callback",
            self.instance.base_url.trim_end_matches('/')
        )
    }
}
