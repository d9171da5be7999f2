use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use log::debug;
use serde::Deserialize;

/// Optional TOML configuration for the CLI. Every field has a flag
/// counterpart; flags win when both are given.
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    /// Inter-burst delay in milliseconds for batch formatting.
    pub delay_ms: Option<u64>,
    /// Render zero byte counts as an empty string.
    pub zero_to_empty: Option<bool>,
    /// Template handed to the duration composer.
    pub duration_template: Option<String>,
}

impl Config {
    /// Loads the config file, falling back to defaults when it is absent.
    pub fn load(path: &Path) -> Result<Config> {
        if !path.exists() {
            debug!("No config file at '{}', using defaults", path.display());
            return Ok(Config::default());
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: '{}'", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: '{}'", path.display()))?;
        debug!("Loaded config from '{}': {:?}", path.display(), config);
        Ok(config)
    }
}
