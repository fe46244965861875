//! Configuration loading and path resolution.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use super::Config;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    ReadFailed(String),
    #[error("failed to parse config: {0}")]
    ParseFailed(String),
    #[error("missing $HOME, unable to resolve config directory")]
    MissingHome,
}

impl Config {
    /// Load configuration from a specific path.
    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents =
            fs::read_to_string(path).map_err(|err| ConfigError::ReadFailed(err.to_string()))?;
        Self::from_toml(&contents)
    }

    /// Parse configuration from TOML text.
    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        toml::from_str(contents).map_err(|err| ConfigError::ParseFailed(err.to_string()))
    }

    /// Load configuration from the default XDG config location, if present.
    pub fn load_default() -> Result<Self, ConfigError> {
        let path = Self::default_config_path()?;
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::load_from_path(&path)
    }

    /// Return the default config directory based on XDG or $HOME.
    pub fn default_config_dir() -> Result<PathBuf, ConfigError> {
        if let Ok(xdg) = env::var("XDG_CONFIG_HOME") {
            return Ok(PathBuf::from(xdg).join("svcpilot"));
        }
        let home = env::var("HOME").map_err(|_| ConfigError::MissingHome)?;
        Ok(PathBuf::from(home).join(".config").join("svcpilot"))
    }

    /// Return the default config file path.
    pub fn default_config_path() -> Result<PathBuf, ConfigError> {
        Ok(Self::default_config_dir()?.join("config.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ContextSetting;

    #[test]
    fn empty_file_yields_defaults() {
        let config = Config::from_toml("").expect("parse empty");
        assert_eq!(config.timeouts.install_ms, 60_000);
        assert_eq!(config.timeouts.start_ms, 30_000);
        assert_eq!(config.verify.attempts, 10);
        assert_eq!(config.verify.delay_ms, 500);
        assert_eq!(config.status.poll_interval_ms, 5000);
        assert_eq!(config.status.context, ContextSetting::Auto);
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = Config::from_toml(
            r#"
            [status]
            context = "web"
            endpoint = "http://127.0.0.1:9000"

            [timeouts]
            install_ms = 90000
            "#,
        )
        .expect("parse partial");
        assert_eq!(config.status.context, ContextSetting::Web);
        assert_eq!(config.status.status_path, "/__local_api/service/status");
        assert_eq!(config.timeouts.install_ms, 90_000);
        assert_eq!(config.timeouts.uninstall_ms, 60_000);
    }

    #[test]
    fn invalid_toml_is_a_parse_error() {
        let err = Config::from_toml("[status\ncontext = 1").unwrap_err();
        assert!(matches!(err, ConfigError::ParseFailed(_)));
    }
}
