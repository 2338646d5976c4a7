//! JSON file configuration adapter.
//!
//! Implements [`ConfigPort`] over a single JSON document.  Missing fields
//! take their defaults (`#[serde(default)]` on [`SystemConfig`]), so an
//! old file keeps working after new settings are added.
//!
//! Saves go through a sibling temp file and a rename, so a crash mid-write
//! never leaves a truncated config behind.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use log::{info, warn};

use crate::app::ports::ConfigPort;
use crate::config::SystemConfig;
use crate::error::ConfigError;

pub struct JsonFileConfig {
    path: PathBuf,
}

impl JsonFileConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// [`load`](ConfigPort::load), falling back to defaults on any error.
    /// The daemon must start even with a broken config file.
    pub fn load_or_default(&self) -> SystemConfig {
        match self.load() {
            Ok(cfg) => cfg,
            Err(ConfigError::NotFound) => {
                warn!(
                    "JsonFileConfig: {} not found, using defaults",
                    self.path.display()
                );
                SystemConfig::default()
            }
            Err(e) => {
                warn!(
                    "JsonFileConfig: {} unusable ({}), using defaults",
                    self.path.display(),
                    e
                );
                SystemConfig::default()
            }
        }
    }
}

impl ConfigPort for JsonFileConfig {
    fn load(&self) -> Result<SystemConfig, ConfigError> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => return Err(ConfigError::NotFound),
            Err(e) => return Err(ConfigError::Io(e.to_string())),
        };
        let cfg: SystemConfig =
            serde_json::from_str(&text).map_err(|e| ConfigError::Corrupted(e.to_string()))?;
        cfg.validate()?;
        info!("JsonFileConfig: loaded config from {}", self.path.display());
        Ok(cfg)
    }

    fn save(&self, config: &SystemConfig) -> Result<(), ConfigError> {
        config.validate()?;
        let json = serde_json::to_string_pretty(config)
            .map_err(|e| ConfigError::Io(e.to_string()))?;

        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json).map_err(|e| ConfigError::Io(e.to_string()))?;
        fs::rename(&tmp, &self.path).map_err(|e| ConfigError::Io(e.to_string()))?;
        info!("JsonFileConfig: config saved to {}", self.path.display());
        Ok(())
    }
}
