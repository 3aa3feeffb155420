use serde::{Deserialize, Serialize};

use crate::configs::*;

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub recording: RecordingConfig,
    pub logging: Option<LoggingConfig>,
}

impl Config {
    /// Loads `config.toml` from the working directory, falling back to
    /// built-in defaults when no file is present.
    pub fn load() -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        if !std::path::Path::new("config.toml").exists() {
            tracing::info!("config.toml not found, using default configuration");
            return Ok(Self::default());
        }

        let config_str = std::fs::read_to_string("config.toml")?;
        if config_str.is_empty() {
            return Ok(Self::default());
        }

        let config: Config = toml::from_str(&config_str)?;
        Ok(config)
    }
}
