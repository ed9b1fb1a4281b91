use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info};
use serde::Deserialize;

use super::types::*;
use crate::error_handling::types::ConfigError;

/// Environment variable overriding `capture.directory`.
pub const CAPTURE_DIR_ENV: &str = "TRAWL_CAPTURE_DIR";

/// Runtime configuration of the capture worker.
///
/// Loaded from a TOML file whose sections mirror the sub-structs below. Every
/// field has a default, so an empty file yields a valid configuration.
///
/// # Examples
///
/// ```
/// use trawl::configuration::config::Config;
///
/// let config = Config::from_toml_str("[capture]\nttl = \"10m\"\n").unwrap();
/// assert_eq!(config.capture.ttl.as_secs(), 600);
/// ```
///
/// # Fields Overview
///
/// - `capture`: directory, extension, TTL, storage limit and sweep period
/// - `scripting`: sandbox switch, timeout, admission bound and retention cap
/// - `ingest`: capacity of the packet channel feeding the processor
/// - `web`: query API switch and bind address
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub capture: CaptureConfig,
    pub scripting: ScriptingConfig,
    pub ingest: IngestConfig,
    pub web: WebConfig,
}

impl Config {
    /// Reads, parses and validates the configuration file at `path`.
    ///
    /// The `TRAWL_CAPTURE_DIR` environment variable, when set, takes precedence
    /// over the file's `capture.directory`.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        debug!("Reading configuration from {}", path.display());
        let raw = fs::read_to_string(path)?;
        let config = Self::from_toml_str(&raw)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let mut config: Config = toml::from_str(raw)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(dir) = std::env::var(CAPTURE_DIR_ENV) {
            info!("Using capture directory from {}: {}", CAPTURE_DIR_ENV, dir);
            self.capture.directory = PathBuf::from(dir);
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.capture.directory.as_os_str().is_empty() {
            return Err(ConfigError::DirectoryDoesNotExist(
                "capture.directory must not be empty".to_string(),
            ));
        }
        // Matched against `Path::extension`, which only sees the last segment.
        let extension = self.capture.extension.trim_start_matches('.');
        if extension.is_empty() || extension.contains(|c: char| c == '/' || c == '.') {
            return Err(ConfigError::NotInRange(format!(
                "capture.extension '{}' is not a valid file extension",
                self.capture.extension
            )));
        }
        if self.capture.ttl.is_zero() {
            return Err(ConfigError::NotInRange("capture.ttl must be > 0".to_string()));
        }
        if self.capture.sweep_interval.is_zero() {
            return Err(ConfigError::NotInRange(
                "capture.sweep_interval must be > 0".to_string(),
            ));
        }
        if self.scripting.timeout_ms == 0 {
            return Err(ConfigError::NotInRange(
                "scripting.timeout_ms must be > 0".to_string(),
            ));
        }
        if self.scripting.max_concurrent == 0 {
            return Err(ConfigError::NotInRange(
                "scripting.max_concurrent must be >= 1".to_string(),
            ));
        }
        if self.ingest.channel_capacity == 0 {
            return Err(ConfigError::NotInRange(
                "ingest.channel_capacity must be >= 1".to_string(),
            ));
        }
        if self.web.enabled && self.web.port == 0 {
            return Err(ConfigError::NotInRange(
                "web.port must be in 1-65535 when the web interface is enabled".to_string(),
            ));
        }
        Ok(())
    }
}
