//! Configuration loader with precedence
//!
//! Loads configuration from the following sources (low to high):
//! 1. Built-in defaults
//! 2. Config file (~/.cup/config.yaml, or an explicit path)
//! 3. Environment variables (CUP_* prefix)
//! 4. CLI flags (handled by caller)

use crate::error::{Error, Result};
use crate::types::CupConfig;
use camino::{Utf8Path, Utf8PathBuf};
use std::env;
use std::fs;
use tracing::debug;

/// File name looked up inside the config directory
const CONFIG_FILE: &str = "config.yaml";

/// Configuration loader
pub struct ConfigLoader {
    /// Directory holding config.yaml
    config_dir: Utf8PathBuf,
}

impl ConfigLoader {
    /// Create a loader for the standard config directory (~/.cup)
    pub fn new() -> Result<Self> {
        let home = dirs::home_dir()
            .ok_or_else(|| Error::invalid_config("Could not determine home directory"))?;
        let home = Utf8PathBuf::from_path_buf(home)
            .map_err(|p| Error::invalid_config(format!("Home directory is not UTF-8: {}", p.display())))?;

        Ok(Self {
            config_dir: home.join(".cup"),
        })
    }

    /// Create a loader with a custom config directory
    pub fn with_dir(config_dir: Utf8PathBuf) -> Self {
        Self { config_dir }
    }

    /// Load configuration from the config directory, if a file exists there
    pub fn load(&self) -> Result<CupConfig> {
        let path = self.config_dir.join(CONFIG_FILE);
        let config = if path.exists() {
            self.load_yaml_file(&path)?
        } else {
            debug!("No config file at {}, using defaults", path);
            CupConfig::default()
        };

        self.apply_env_overrides(config)
    }

    /// Load configuration from an explicit file, which must exist
    pub fn load_from(&self, path: &Utf8Path) -> Result<CupConfig> {
        if !path.exists() {
            return Err(Error::config_not_found(path.as_str()));
        }
        let config = self.load_yaml_file(path)?;
        self.apply_env_overrides(config)
    }

    /// Load a YAML file and parse it
    fn load_yaml_file(&self, path: &Utf8Path) -> Result<CupConfig> {
        debug!("Loading config from {}", path);
        let content = fs::read_to_string(path)?;
        let config: CupConfig = serde_yaml_ng::from_str(&content)
            .map_err(|e| Error::invalid_config(format!("Failed to parse {}: {}", path, e)))?;

        if let Some(index) = config.registries.iter().position(|r| r.host.trim().is_empty()) {
            return Err(Error::invalid_config(format!(
                "Registry entry {} in {} has no host",
                index, path
            )));
        }

        Ok(config)
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&self, mut config: CupConfig) -> Result<CupConfig> {
        if let Ok(val) = env::var("CUP_MAX_PAGES") {
            config.max_pages = val
                .parse()
                .map_err(|_| Error::invalid_config("CUP_MAX_PAGES must be a valid number"))?;
        }

        if let Ok(val) = env::var("CUP_HTTP_TIMEOUT_SECS") {
            config.http_timeout_secs = val.parse().map_err(|_| {
                Error::invalid_config("CUP_HTTP_TIMEOUT_SECS must be a valid number")
            })?;
        }

        if let Ok(val) = env::var("CUP_SELECTION_POLICY") {
            config.selection_policy = val.parse()?;
        }

        if let Ok(val) = env::var("CUP_USER_AGENT") {
            config.user_agent = val;
        }

        Ok(config)
    }

    /// Get the config directory path
    pub fn config_dir(&self) -> &Utf8Path {
        &self.config_dir
    }
}
