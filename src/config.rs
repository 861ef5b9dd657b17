//! Configuration management for hl-hostmon.
//!
//! This module handles loading and validating the responder configuration.
//! It supports YAML, JSON, and TOML formats; a missing file means defaults.

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

// Default configuration constants
pub const DEFAULT_CONFIG_PATH: &str = "/etc/hl-hostmon/config.yaml";
pub const DEFAULT_SERIAL_DEVICE: &str = "/dev/ttyACM0";
pub const DEFAULT_BAUD: u32 = 115_200;
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Responder configuration. Every key is optional in the file.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Config {
    #[serde(alias = "serial-device")]
    pub serial_device: Option<String>,
    pub baud: Option<u32>,

    // Logging
    #[serde(alias = "log-level")]
    pub log_level: Option<String>,
    /// Log every request line and response payload (requires log_level=debug)
    #[serde(alias = "trace-payloads")]
    pub trace_payloads: Option<bool>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            serial_device: Some(DEFAULT_SERIAL_DEVICE.to_string()),
            baud: Some(DEFAULT_BAUD),
            log_level: Some(DEFAULT_LOG_LEVEL.into()),
            trace_payloads: Some(false),
        }
    }
}

impl Config {
    pub fn device(&self) -> &str {
        self.serial_device
            .as_deref()
            .filter(|d| !d.is_empty())
            .unwrap_or(DEFAULT_SERIAL_DEVICE)
    }

    pub fn baud(&self) -> u32 {
        self.baud.unwrap_or(DEFAULT_BAUD)
    }

    /// Normalized (lowercase) log level.
    pub fn log_level(&self) -> String {
        self.log_level
            .as_deref()
            .unwrap_or(DEFAULT_LOG_LEVEL)
            .to_ascii_lowercase()
    }

    pub fn is_debug(&self) -> bool {
        self.log_level() == "debug"
    }

    /// Payload tracing is only active at debug level.
    pub fn trace_enabled(&self) -> bool {
        self.trace_payloads.unwrap_or(false) && self.is_debug()
    }
}

/// Validate effective config (used at startup)
pub fn validate_effective_config(cfg: &Config) -> Result<(), Box<dyn std::error::Error>> {
    if cfg.baud == Some(0) {
        return Err("baud must be greater than 0".into());
    }

    if let Some(device) = cfg.serial_device.as_deref() {
        if device.trim().is_empty() {
            return Err("serial_device must not be empty".into());
        }
    }

    match cfg.log_level().as_str() {
        "info" | "debug" => {}
        other => {
            return Err(format!(
                "Invalid log_level '{}', expected 'info' or 'debug'",
                other
            )
            .into());
        }
    }

    Ok(())
}

/// Loads configuration from `path`, or from the default location when `None`.
/// A missing file yields the defaults.
pub fn load_config(path: Option<&Path>) -> Result<Config, Box<dyn std::error::Error>> {
    let path = path
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));

    if !path.exists() {
        return Ok(Config::default());
    }

    let content = fs::read_to_string(&path)?;

    match path.extension().and_then(|s| s.to_str()) {
        Some("json") => {
            let config: Config = serde_json::from_str(&content)?;
            info!("Loaded JSON configuration from: {}", path.display());
            Ok(config)
        }
        Some("toml") => {
            let config: Config = toml::from_str(&content)?;
            info!("Loaded TOML configuration from: {}", path.display());
            Ok(config)
        }
        _ => {
            // Default to YAML; a document holding only comments is null
            let value: serde_yaml::Value = serde_yaml::from_str(&content)?;
            if value.is_null() {
                return Ok(Config::default());
            }
            let config: Config = serde_yaml::from_value(value)?;
            info!("Loaded YAML configuration from: {}", path.display());
            Ok(config)
        }
    }
}
