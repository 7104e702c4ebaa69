//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, addresses parse)
//! - Detect listener/exporter port conflicts
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: RuntimeConfig → Result<(), Vec<ValidationError>>

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::RuntimeConfig;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("server.host must not be empty")]
    EmptyHost,

    #[error("server.shutdown_grace_ms must be greater than zero")]
    ZeroShutdownGrace,

    #[error("server.request_timeout_secs must be greater than zero")]
    ZeroRequestTimeout,

    #[error("metrics.address '{0}' is not a socket address")]
    InvalidMetricsAddress(String),

    #[error("metrics exporter and server both use port {0}")]
    PortConflict(u16),
}

/// Check a loaded configuration, collecting every problem found.
pub fn validate_config(config: &RuntimeConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.server.host.trim().is_empty() {
        errors.push(ValidationError::EmptyHost);
    }
    if config.server.shutdown_grace_ms == 0 {
        errors.push(ValidationError::ZeroShutdownGrace);
    }
    if config.server.request_timeout_secs == 0 {
        errors.push(ValidationError::ZeroRequestTimeout);
    }

    if config.metrics.enabled {
        match config.metrics.address.parse::<SocketAddr>() {
            Ok(addr) if addr.port() == config.server.port && addr.port() != 0 => {
                errors.push(ValidationError::PortConflict(addr.port()));
            }
            Ok(_) => {}
            Err(_) => errors.push(ValidationError::InvalidMetricsAddress(config.metrics.address.clone())),
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
