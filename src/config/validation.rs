//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, limits > 0)
//! - Check that TLS file settings are complete
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: MuxConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;
use thiserror::Error;

use crate::config::schema::MuxConfig;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("invalid bind address {0:?}")]
    BindAddress(String),

    #[error("tls.cert_path and tls.key_path must be set together")]
    IncompleteIdentity,

    #[error("unknown log level {0:?}")]
    LogLevel(String),

    #[error("tls.server_name must not be empty")]
    EmptyServerName,
}

/// Check every semantic rule and report all violations.
pub fn validate_config(config: &MuxConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let positive = [
        ("timeouts.handshake_ms", config.timeouts.handshake_ms),
        ("timeouts.recv_ms", config.timeouts.recv_ms),
        ("timeouts.send_ms", config.timeouts.send_ms),
        ("timeouts.idle_ms", config.timeouts.idle_ms),
        ("server.poll_interval_ms", config.server.poll_interval_ms),
        ("server.max_connections", config.server.max_connections as u64),
        ("server.max_request_bytes", config.server.max_request_bytes as u64),
    ];
    for (name, value) in positive {
        if value == 0 {
            errors.push(ValidationError::Zero(name));
        }
    }

    if config.server.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BindAddress(config.server.bind_address.clone()));
    }

    if config.tls.cert_path.is_some() != config.tls.key_path.is_some() {
        errors.push(ValidationError::IncompleteIdentity);
    }

    if config.tls.server_name.is_empty() {
        errors.push(ValidationError::EmptyServerName);
    }

    if !LOG_LEVELS.contains(&config.observability.log_level.to_lowercase().as_str()) {
        errors.push(ValidationError::LogLevel(config.observability.log_level.clone()));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
