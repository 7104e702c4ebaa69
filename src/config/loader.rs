//! Configuration loading from disk and environment.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::config::schema::RuntimeConfig;
use crate::config::validation::{validate_config, ValidationError};
use crate::environment::Vars;

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error reading {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value '{value}' for {key}")]
    InvalidOverride { key: &'static str, value: String },

    #[error("Validation failed: {}", join(.0))]
    Validation(Vec<ValidationError>),
}

fn join(errors: &[ValidationError]) -> String {
    errors.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<RuntimeConfig, ConfigError> {
    let config = read_config(path)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Parse a TOML file without semantic checks.
fn read_config(path: &Path) -> Result<RuntimeConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(toml::from_str(&content)?)
}

/// Apply environment overrides on top of a loaded configuration.
///
/// Only `PORT` is honoured; it is how hosting platforms assign the port.
pub fn apply_env_overrides(config: &mut RuntimeConfig, vars: &dyn Vars) -> Result<(), ConfigError> {
    if let Some(value) = vars.var("PORT").filter(|v| !v.is_empty()) {
        config.server.port = value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidOverride { key: "PORT", value })?;
    }
    Ok(())
}

/// Full pipeline: file (or defaults), `PORT`, then `port` from the command
/// line, validated once after every override is in place.
pub fn load(path: Option<&Path>, vars: &dyn Vars, port: Option<u16>) -> Result<RuntimeConfig, ConfigError> {
    let mut config = match path {
        Some(path) => read_config(path)?,
        None => RuntimeConfig::default(),
    };

    apply_env_overrides(&mut config, vars)?;
    if let Some(port) = port {
        config.server.port = port;
    }
    validate_config(&config).map_err(ConfigError::Validation)?;

    tracing::debug!(
        bind_address = %config.server.bind_address(),
        shutdown_grace_ms = config.server.shutdown_grace_ms,
        "Configuration loaded"
    );
    Ok(config)
}
