//! Configuration loading from disk and from the launching environment.

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::schema::{GatewayConfig, RuntimeMode};
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value for {name}: {value:?}")]
    InvalidEnv { name: &'static str, value: String },

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Parse configuration from a TOML file without validating it.
pub fn read_config(path: &Path) -> Result<GatewayConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<GatewayConfig, ConfigError> {
    let config = read_config(path)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Apply the environment variables set by the desktop shell.
///
/// `lookup` abstracts `std::env::var` so overrides can be exercised without
/// touching the process environment.
pub fn apply_env_overrides<F>(config: &mut GatewayConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(value) = lookup("LOCAL_API_PORT") {
        config.listener.port = value.trim().parse().map_err(|_| ConfigError::InvalidEnv {
            name: "LOCAL_API_PORT",
            value,
        })?;
    }
    if let Some(value) = lookup("LOCAL_API_DIR") {
        config.handlers.api_dir = Some(PathBuf::from(value));
    }
    if let Some(value) = lookup("LOCAL_API_RESOURCE_DIR") {
        config.handlers.resource_dir = Some(PathBuf::from(value));
    }
    if let Some(value) = lookup("LOCAL_API_MODE") {
        config.mode = RuntimeMode::parse(&value);
    }
    if let Some(value) = lookup("LOCAL_API_REMOTE_BASE") {
        config.remote.base_url = value.trim().to_string();
    }
    if let Some(value) = lookup("LOCAL_API_CLOUD_FALLBACK") {
        config.remote.fallback_enabled = parse_flag(&value).ok_or(ConfigError::InvalidEnv {
            name: "LOCAL_API_CLOUD_FALLBACK",
            value,
        })?;
    }
    if let Some(value) = lookup("LOCAL_API_TOKEN") {
        let token = value.trim();
        config.access.token = (!token.is_empty()).then(|| token.to_string());
    }
    Ok(())
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
