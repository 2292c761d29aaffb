//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate bind parameters and value ranges
//! - Check that TLS certificate and key are configured together
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ServerConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::{IpAddr, SocketAddr};

use crate::config::schema::ServerConfig;

/// Longest validity accepted for a generated certificate (100 years).
pub const MAX_VALIDITY_DAYS: u32 = 36_500;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("listener.bind_address `{0}` is not an IP address")]
    InvalidBindAddress(String),
    #[error("listener.max_connections must be greater than zero")]
    ZeroMaxConnections,
    #[error("decode.start_line_timeout_ms must be greater than zero")]
    ZeroStartLineTimeout,
    #[error("tls.cert_path and tls.key_path must be set together")]
    IncompleteCertificate,
    #[error("tls.validity_days must be greater than zero")]
    ZeroValidity,
    #[error("tls.validity_days {0} exceeds the maximum of 36500")]
    ExcessiveValidity(u32),
    #[error("tls.key_password is set without tls.key_path")]
    PasswordWithoutKey,
    #[error("tls.subject_alt_names must not be empty")]
    NoSubjectAltNames,
    #[error("observability.metrics_address `{0}` is not a socket address")]
    InvalidMetricsAddress(String),
}

pub fn validate_config(config: &ServerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<IpAddr>().is_err() {
        errors.push(ValidationError::InvalidBindAddress(
            config.listener.bind_address.clone(),
        ));
    }
    if config.listener.max_connections == 0 {
        errors.push(ValidationError::ZeroMaxConnections);
    }
    if config.decode.start_line_timeout_ms == 0 {
        errors.push(ValidationError::ZeroStartLineTimeout);
    }
    if config.tls.cert_path.is_some() != config.tls.key_path.is_some() {
        errors.push(ValidationError::IncompleteCertificate);
    }
    if config.tls.key_password.is_some() && config.tls.key_path.is_none() {
        errors.push(ValidationError::PasswordWithoutKey);
    }
    if config.tls.validity_days == 0 {
        errors.push(ValidationError::ZeroValidity);
    } else if config.tls.validity_days > MAX_VALIDITY_DAYS {
        errors.push(ValidationError::ExcessiveValidity(config.tls.validity_days));
    }
    if config.tls.subject_alt_names.is_empty() {
        errors.push(ValidationError::NoSubjectAltNames);
    }
    if config.observability.metrics_enabled
        && config
            .observability
            .metrics_address
            .parse::<SocketAddr>()
            .is_err()
    {
        errors.push(ValidationError::InvalidMetricsAddress(
            config.observability.metrics_address.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
