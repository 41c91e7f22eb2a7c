//! Persisted CLI configuration, loaded from `~/.swap-cli/config.toml` on
//! first use and overridable with CLI flags/env vars.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Base URL of the `swap-node` REST surface.
    pub node_url: String,
    /// Request timeout in seconds.
    pub timeout: u64,
    /// Enable debug output.
    pub debug: bool,
    /// Output format for command results.
    pub output_format: OutputFormat,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Json,
    Text,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            node_url: "http://127.0.0.1:8080".to_string(),
            timeout: 30,
            debug: false,
            output_format: OutputFormat::Text,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        if path.exists() {
            let contents = fs::read_to_string(&path).context("failed to read config file")?;
            toml::from_str(&contents).context("failed to parse config file")
        } else {
            let config = Config::default();
            config.save()?;
            Ok(config)
        }
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).context("failed to create config directory")?;
        }
        let contents = toml::to_string_pretty(self).context("failed to serialize config")?;
        fs::write(&path, contents).context("failed to write config file")
    }

    pub fn config_path() -> Result<PathBuf> {
        let home = dirs::home_dir().context("failed to resolve home directory")?;
        Ok(home.join(".swap-cli").join("config.toml"))
    }
}
