//! Configuration management.
//!
//! Two kinds of configuration live here: the server [`Config`], assembled by
//! the `config` crate from an optional file plus `MINDCRAFT__*` environment
//! variables, and the experiment catalog ([`ConfigEntry`] list) read from a
//! JSON document at startup.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{MindcraftError, Result};

/// Environment variable prefix for server settings.
pub const ENV_PREFIX: &str = "MINDCRAFT";

/// Main application configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Experiment catalog and sync configuration
    #[serde(default)]
    pub experiments: ExperimentsConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// HTTP server host
    #[serde(default = "default_host")]
    pub host: String,

    /// HTTP server port
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL. When unset the in-memory store is used.
    pub url: Option<String>,

    /// Maximum number of connections
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Minimum number of connections
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: default_max_connections(),
            min_connections: default_min_connections(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExperimentsConfig {
    /// Path of the JSON experiment catalog
    #[serde(default = "default_config_path")]
    pub config_path: String,

    /// Capacity of the realtime broadcast buffer
    #[serde(default = "default_sync_buffer")]
    pub sync_buffer: usize,
}

impl Default for ExperimentsConfig {
    fn default() -> Self {
        Self {
            config_path: default_config_path(),
            sync_buffer: default_sync_buffer(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Structured JSON, one object per line
    #[default]
    Json,
    /// Multi-line human-readable output
    Pretty,
    /// Single-line human-readable output
    Compact,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive (overridden by `RUST_LOG`)
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub format: LogFormat,

    /// Include file and line in log records
    #[serde(default)]
    pub include_location: bool,

    /// Include the module target in log records
    #[serde(default = "default_true")]
    pub include_target: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
            include_location: false,
            include_target: true,
        }
    }
}

// Default value functions
fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 8080 }
fn default_max_connections() -> u32 { 20 }
fn default_min_connections() -> u32 { 2 }
fn default_config_path() -> String { "config/experiments.json".to_string() }
fn default_sync_buffer() -> usize { 1024 }
fn default_log_level() -> String { "info".to_string() }
fn default_true() -> bool { true }

impl Config {
    /// Load configuration from environment.
    pub fn load() -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()?;

        let cfg: Config = config.try_deserialize()?;
        Ok(cfg)
    }

    /// Load from a specific file path, with the environment layered on top.
    pub fn from_file(path: &str) -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::File::with_name(path))
            .add_source(config::Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()?;

        let cfg: Config = config.try_deserialize()?;
        Ok(cfg)
    }

    /// Socket address string the HTTP server binds to.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Experiment Catalog
// ═══════════════════════════════════════════════════════════════════════════════

/// One experiment declared in the catalog. Immutable after load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigEntry {
    /// Unique experiment name; events reference it.
    pub name: String,

    /// Human-readable title
    pub long_name: String,

    pub description: String,

    /// Processor reference, resolved by the processor loader
    pub script: String,
}

/// Parse an experiment catalog from JSON text.
pub fn parse_experiment_config(json: &str) -> Result<Vec<ConfigEntry>> {
    let entries: Vec<ConfigEntry> = serde_json::from_str(json).map_err(|e| {
        MindcraftError::configuration(format!("invalid experiment catalog: {}", e))
    })?;

    for entry in &entries {
        if entry.name.trim().is_empty() {
            return Err(MindcraftError::configuration(
                "experiment catalog entry has an empty name",
            ));
        }
    }

    Ok(entries)
}

/// Read the experiment catalog from disk.
///
/// An unreadable file is a `FetchFailure`; the caller treats it as fatal.
pub async fn load_experiment_config(path: impl AsRef<Path>) -> Result<Vec<ConfigEntry>> {
    let path = path.as_ref();
    debug!(path = %path.display(), "Reading experiment catalog");

    let json = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| MindcraftError::fetch_failure("experiment config", e.to_string()))?;

    let entries = parse_experiment_config(&json)?;
    info!(
        path = %path.display(),
        experiments = entries.len(),
        "Experiment catalog loaded"
    );
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use std::io::Write;

    const CATALOG: &str = r#"[
        {
            "name": "ProbMatch",
            "longName": "Probability Matching",
            "description": "Press left or right",
            "script": "probmatch.js"
        }
    ]"#;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.server.port, 8080);
        assert!(config.database.url.is_none());
        assert_eq!(config.experiments.sync_buffer, 1024);
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.bind_address(), "0.0.0.0:8080");
    }

    #[test]
    fn test_parse_catalog_camel_case() {
        let entries = parse_experiment_config(CATALOG).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "ProbMatch");
        assert_eq!(entries[0].long_name, "Probability Matching");
        assert_eq!(entries[0].script, "probmatch.js");
    }

    #[test]
    fn test_parse_catalog_rejects_garbage() {
        let err = parse_experiment_config("{\"name\": 1}").unwrap_err();
        assert_eq!(err.code(), ErrorCode::ConfigurationError);
    }

    #[test]
    fn test_parse_catalog_rejects_empty_name() {
        let json = r#"[{"name":" ","longName":"x","description":"","script":"a.js"}]"#;
        assert!(parse_experiment_config(json).is_err());
    }

    #[tokio::test]
    async fn test_load_catalog_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(CATALOG.as_bytes()).unwrap();

        let entries = load_experiment_config(file.path()).await.unwrap();
        assert_eq!(entries[0].description, "Press left or right");
    }

    #[tokio::test]
    async fn test_missing_catalog_is_fetch_failure() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_experiment_config(dir.path().join("nope.json"))
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::FetchFailure);
    }

    #[test]
    fn test_from_file_reads_sections() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("server.toml");
        std::fs::write(
            &path,
            "[server]\nport = 9090\n\n[experiments]\nconfig_path = \"cat.json\"\n\n[logging]\nformat = \"compact\"\n",
        )
        .unwrap();

        let config = Config::from_file(path.to_str().unwrap()).unwrap();
        assert_eq!(config.server.port, 9090);
        assert_eq!(config.experiments.config_path, "cat.json");
        assert_eq!(config.logging.format, LogFormat::Compact);
    }
}
