//! Configuration loading and management

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Environment variable overriding [`StoreConfig::database_path`]
pub const DATABASE_PATH_ENV: &str = "RECORDKIT_DATABASE_PATH";

/// Environment variable overriding [`HttpConfig::base_url`]
pub const BASE_URL_ENV: &str = "RECORDKIT_BASE_URL";

/// Default storage root of the file adapter
pub const DEFAULT_DATABASE_PATH: &str = "./database";

fn default_database_path() -> PathBuf {
    PathBuf::from(DEFAULT_DATABASE_PATH)
}

/// Settings of the HTTP client adapter
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Base URL of the remote REST service (e.g., "http://localhost:3000")
    #[serde(default)]
    pub base_url: String,

    /// Headers sent with every request
    #[serde(default)]
    pub headers: HashMap<String, String>,
}

/// Complete configuration for the adapters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Root directory of the file adapter
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,

    #[serde(default)]
    pub http: HttpConfig,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            http: HttpConfig::default(),
        }
    }
}

impl StoreConfig {
    /// Load configuration from a YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        Self::from_yaml_str(&content)
            .with_context(|| format!("invalid config file {}", path.display()))
    }

    /// Load configuration from a YAML string
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    /// Defaults, overridden by the process environment
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// Apply `RECORDKIT_DATABASE_PATH` and `RECORDKIT_BASE_URL` when set
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary variable lookup
    ///
    /// Empty values are ignored.
    pub fn with_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| lookup(key).filter(|value| !value.is_empty());

        if let Some(path) = lookup(DATABASE_PATH_ENV) {
            tracing::debug!(path = %path, "database path taken from environment");
            self.database_path = PathBuf::from(path);
        }
        if let Some(url) = lookup(BASE_URL_ENV) {
            tracing::debug!(url = %url, "base url taken from environment");
            self.http.base_url = url;
        }
        self
    }
}
