// SPDX-License-Identifier: Apache-2.0

//! Process configuration, loaded from a YAML file.
//!
//! The CLI-supplied path is tried first, then the system-wide fallback
//! `/etc/collectd-relay/config.yaml`.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use collectd_pipeline::writer::WriterConfig;

pub const SYSTEM_CONFIG_PATH: &str = "/etc/collectd-relay/config.yaml";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub listen_addr: Option<String>,
    /// One entry per backend destination.
    #[serde(default)]
    pub prometheus_writer: Vec<WriterConfig>,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigFileError {
    #[error("no config file found (tried {0})")]
    NotFound(String),

    #[error("failed to read config file {0}: {1}")]
    Read(String, String),

    #[error("failed to parse config file {0}: {1}")]
    Parse(String, String),
}

impl Config {
    /// Loads the first existing candidate path.
    pub fn load(candidates: &[PathBuf]) -> Result<Config, ConfigFileError> {
        for path in candidates {
            if path.is_file() {
                return Self::load_file(path);
            }
        }
        let tried = candidates
            .iter()
            .map(|p| p.display().to_string())
            .collect::<Vec<_>>()
            .join(", ");
        Err(ConfigFileError::NotFound(tried))
    }

    fn load_file(path: &Path) -> Result<Config, ConfigFileError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| ConfigFileError::Read(path.display().to_string(), e.to_string()))?;
        serde_yaml::from_str(&raw)
            .map_err(|e| ConfigFileError::Parse(path.display().to_string(), e.to_string()))
    }
}
