//! Configuration loading: scenario config is read from a file and
//! deserialized into the constants each subsystem needs.

use std::path::Path;

use serde::Deserialize;

use crate::dama::NodeConfig;
use crate::noordwijk::NoordwijkConfig;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read { path: String, #[source] source: std::io::Error },
    #[error("failed to parse config file {path}: {source}")]
    Parse { path: String, #[source] source: toml::de::Error },
}

/// The full scenario configuration: one `NodeConfig` shared by every node
/// plus the Noordwijk parameters, loaded together from a single file.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ScenarioConfig {
    #[serde(default)]
    pub node: NodeConfig,
    #[serde(default)]
    pub noordwijk: NoordwijkConfig,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        ScenarioConfig { node: NodeConfig::default(), noordwijk: NoordwijkConfig::default() }
    }
}

impl ScenarioConfig {
    /// Load configuration from a TOML file.
    pub fn load(config_path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(config_path)
            .map_err(|source| ConfigError::Read { path: config_path.display().to_string(), source })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse { path: config_path.display().to_string(), source })
    }
}
