//! Application configuration for moralgraph.
//!
//! User config lives at `~/.moralgraph/moralgraph.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{MoralGraphError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "moralgraph.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".moralgraph";

// ---------------------------------------------------------------------------
// Config structs (matching moralgraph.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Relational store settings.
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Graph store (Fuseki-style SPARQL endpoint) settings.
    #[serde(default)]
    pub graph_store: GraphStoreConfig,

    /// External scoring engine settings.
    #[serde(default)]
    pub scoring: ScoringConfig,

    /// Pipeline behavior.
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

/// `[database]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> String {
    "~/.moralgraph/moralgraph.db".into()
}

/// `[graph_store]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphStoreConfig {
    /// Endpoint host; `http://` is assumed when no scheme is given.
    #[serde(default = "default_graph_endpoint")]
    pub endpoint: String,

    /// Endpoint port.
    #[serde(default = "default_graph_port")]
    pub port: u16,

    /// Dataset name under the endpoint.
    #[serde(default = "default_graph_dataset")]
    pub dataset: String,

    /// Basic-auth user, if the store requires one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,

    /// Name of the env var holding the password (never store the password).
    #[serde(default = "default_password_env")]
    pub password_env: String,

    /// Liveness probe interval in seconds.
    #[serde(default = "default_heartbeat_secs")]
    pub heartbeat_secs: u64,

    /// Per-call request timeout in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for GraphStoreConfig {
    fn default() -> Self {
        Self {
            endpoint: default_graph_endpoint(),
            port: default_graph_port(),
            dataset: default_graph_dataset(),
            user: None,
            password_env: default_password_env(),
            heartbeat_secs: default_heartbeat_secs(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl GraphStoreConfig {
    /// Resolve the basic-auth password from the configured env var.
    pub fn password(&self) -> Option<String> {
        std::env::var(&self.password_env).ok().filter(|v| !v.is_empty())
    }

    /// The configured heartbeat interval.
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_secs)
    }
}

fn default_graph_endpoint() -> String {
    "localhost".into()
}
fn default_graph_port() -> u16 {
    3030
}
fn default_graph_dataset() -> String {
    "morals".into()
}
fn default_password_env() -> String {
    "MORALGRAPH_GRAPH_PASSWORD".into()
}
fn default_heartbeat_secs() -> u64 {
    20
}
fn default_request_timeout_secs() -> u64 {
    30
}

/// `[scoring]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringConfig {
    /// Scoring engine prediction endpoint.
    #[serde(default = "default_scoring_url")]
    pub api_url: String,

    /// Model name passed to the scoring engine.
    #[serde(default = "default_scoring_model")]
    pub model_name: String,

    /// Per-call request timeout in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            api_url: default_scoring_url(),
            model_name: default_scoring_model(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

fn default_scoring_url() -> String {
    "http://localhost:5000/predict".into()
}
fn default_scoring_model() -> String {
    "multimoralpolarity_model".into()
}

/// `[pipeline]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Drop canonical rows where all five foundations are absent.
    #[serde(default = "default_true")]
    pub drop_empty_rows: bool,

    /// Per-call fetch timeout in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub fetch_timeout_secs: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            drop_empty_rows: true,
            fetch_timeout_secs: default_request_timeout_secs(),
        }
    }
}

fn default_true() -> bool {
    true
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.moralgraph/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| MoralGraphError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.moralgraph/moralgraph.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| MoralGraphError::io(path, e))?;

    toml::from_str(&content).map_err(|e| {
        MoralGraphError::config(format!("failed to parse {}: {e}", path.display()))
    })
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| MoralGraphError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| MoralGraphError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| MoralGraphError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}
