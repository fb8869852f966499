//! Configuration management for Switchboard
//!
//! This module provides:
//! - The controller connection settings
//! - Optional default device overrides
//! - The ordered input and output routes, with TOML serialization

use crate::domain::device::{DeviceSpec, Direction};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tokio::fs;
use tracing::{debug, info, instrument};

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Errors that can occur during configuration operations
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Remote controller connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    pub host: String,
    pub port: u16,

    /// Password for authenticated controllers (None = no auth)
    pub password: Option<String>,

    /// Per-request timeout in seconds
    pub request_timeout_secs: u64,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 4444,
            password: None,
            request_timeout_secs: 10,
        }
    }
}

impl ControllerConfig {
    pub fn url(&self) -> String {
        format!("ws://{}:{}", self.host, self.port)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Default device overrides (None = ask the OS)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DefaultsConfig {
    #[serde(default)]
    pub input: Option<String>,

    #[serde(default)]
    pub output: Option<String>,
}

/// One configured source-to-device assignment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteEntry {
    /// Role key of the remote special source, e.g. `mic-1` or `desktop-1`
    pub source: String,

    /// Display name, `default`, or `id:<native id>`
    pub device: String,
}

/// A route ready for a synchronization pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub source_role: String,
    pub device: DeviceSpec,
    pub direction: Direction,
}

/// Routes in processing order
pub type RouteConfig = Vec<Route>;

/// Complete Switchboard configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SwitchboardConfig {
    #[serde(default)]
    pub controller: ControllerConfig,

    #[serde(default)]
    pub defaults: DefaultsConfig,

    #[serde(default)]
    pub inputs: Vec<RouteEntry>,

    #[serde(default)]
    pub outputs: Vec<RouteEntry>,
}

impl SwitchboardConfig {
    /// Parse and validate a TOML document
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Self = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from TOML file
    #[instrument(skip(path))]
    pub async fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading configuration");

        let contents = fs::read_to_string(path).await?;
        let config = Self::from_toml(&contents)?;

        debug!(
            inputs = config.inputs.len(),
            outputs = config.outputs.len(),
            "Configuration loaded successfully"
        );
        Ok(config)
    }

    /// Save configuration to TOML file
    #[instrument(skip(self, path))]
    pub async fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        info!(path = %path.display(), "Saving configuration");

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let toml_str = toml::to_string_pretty(self)?;
        fs::write(path, toml_str).await?;
        Ok(())
    }

    /// Get the default config file path
    ///
    /// Returns `~/.config/switchboard/config.toml` on Linux
    /// Returns `%APPDATA%\switchboard\config.toml` on Windows
    pub fn default_path() -> Result<PathBuf> {
        dirs::config_dir()
            .map(|p| p.join("switchboard").join("config.toml"))
            .ok_or_else(|| ConfigError::Invalid("Could not determine config directory".to_string()))
    }

    pub fn validate(&self) -> Result<()> {
        let groups = [("inputs", &self.inputs), ("outputs", &self.outputs)];
        for (group, entries) in groups {
            for (i, entry) in entries.iter().enumerate() {
                if entry.source.trim().is_empty() {
                    return Err(ConfigError::Invalid(format!("{group}[{i}]: source is empty")));
                }
                if entry.device.trim().is_empty() {
                    return Err(ConfigError::Invalid(format!("{group}[{i}]: device is empty")));
                }
            }
        }
        if let Some(name) = &self.defaults.input {
            if name.trim().is_empty() {
                return Err(ConfigError::Invalid("defaults.input is empty".to_string()));
            }
        }
        if let Some(name) = &self.defaults.output {
            if name.trim().is_empty() {
                return Err(ConfigError::Invalid("defaults.output is empty".to_string()));
            }
        }
        Ok(())
    }

    /// Routes in configuration order: inputs, then outputs
    pub fn routes(&self) -> RouteConfig {
        let inputs = self.inputs.iter().map(|e| (e, Direction::Input));
        let outputs = self.outputs.iter().map(|e| (e, Direction::Output));
        inputs
            .chain(outputs)
            .map(|(entry, direction)| Route {
                source_role: entry.source.clone(),
                device: DeviceSpec::parse(&entry.device),
                direction,
            })
            .collect()
    }
}
