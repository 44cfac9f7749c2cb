//! Server configuration

use anyhow::{Context, Result};
use aqi_engine::artifacts::DEFAULT_ARTIFACT_DIR;
use aqi_engine::history::DEFAULT_PAGE_SIZE;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;

/// Server configuration, read from `AQI_*` environment variables
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ServerConfig {
    /// Port for the prediction, health and metrics API
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    /// Directory holding the trained artifact set
    #[serde(default = "default_artifact_dir")]
    pub artifact_dir: PathBuf,

    /// Records per history page
    #[serde(default = "default_history_page_size")]
    pub history_page_size: usize,

    /// Most history records kept in memory; unbounded when unset
    #[serde(default)]
    pub history_limit: Option<usize>,

    /// Load artifacts at startup instead of on the first prediction
    #[serde(default = "default_preload_models")]
    pub preload_models: bool,
}

fn default_api_port() -> u16 {
    8080
}

fn default_artifact_dir() -> PathBuf {
    PathBuf::from(DEFAULT_ARTIFACT_DIR)
}

fn default_history_page_size() -> usize {
    DEFAULT_PAGE_SIZE
}

fn default_preload_models() -> bool {
    true
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            api_port: default_api_port(),
            artifact_dir: default_artifact_dir(),
            history_page_size: default_history_page_size(),
            history_limit: None,
            preload_models: default_preload_models(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from the process environment
    pub fn load() -> Result<Self> {
        Self::from_environment(config::Environment::with_prefix("AQI"))
    }

    /// Load configuration from an explicit set of variables
    pub fn from_vars(vars: HashMap<String, String>) -> Result<Self> {
        Self::from_environment(config::Environment::with_prefix("AQI").source(Some(vars)))
    }

    fn from_environment(env: config::Environment) -> Result<Self> {
        let config = config::Config::builder()
            .add_source(env.try_parsing(true))
            .build()
            .context("failed to read AQI_* configuration")?;

        let parsed: Self = config
            .try_deserialize()
            .context("invalid AQI_* configuration")?;
        if parsed.history_page_size == 0 {
            anyhow::bail!("AQI_HISTORY_PAGE_SIZE must be at least 1");
        }
        if parsed.history_limit == Some(0) {
            anyhow::bail!("AQI_HISTORY_LIMIT must be at least 1");
        }
        Ok(parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults() {
        let config = ServerConfig::from_vars(HashMap::new()).unwrap();
        assert_eq!(config, ServerConfig::default());
        assert_eq!(config.api_port, 8080);
        assert_eq!(config.artifact_dir, PathBuf::from("ml_models/models"));
        assert_eq!(config.history_page_size, 20);
        assert_eq!(config.history_limit, None);
        assert!(config.preload_models);
    }

    #[test]
    fn test_overrides() {
        let config = ServerConfig::from_vars(vars(&[
            ("AQI_API_PORT", "9000"),
            ("AQI_ARTIFACT_DIR", "/srv/models"),
            ("AQI_HISTORY_PAGE_SIZE", "5"),
            ("AQI_PRELOAD_MODELS", "false"),
            ("AQI_HISTORY_LIMIT", "1000"),
        ]))
        .unwrap();
        assert_eq!(config.history_limit, Some(1000));
        assert_eq!(config.api_port, 9000);
        assert_eq!(config.artifact_dir, PathBuf::from("/srv/models"));
        assert_eq!(config.history_page_size, 5);
        assert!(!config.preload_models);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(ServerConfig::from_vars(vars(&[("AQI_API_PORT", "not-a-port")])).is_err());
        assert!(ServerConfig::from_vars(vars(&[("AQI_HISTORY_PAGE_SIZE", "0")])).is_err());
        assert!(ServerConfig::from_vars(vars(&[("AQI_HISTORY_LIMIT", "0")])).is_err());
    }
}
