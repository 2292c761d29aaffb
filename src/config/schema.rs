//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the server.
//! All types derive Serde traits for deserialization from config files.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Root configuration for the server.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ServerConfig {
    /// Listener configuration (bind address, port, connection cap).
    pub listener: ListenerConfig,

    /// Gates how much fault detail clients see.
    pub mode: ServerMode,

    /// TLS policy and certificate sources.
    pub tls: TlsConfig,

    /// Codec limits.
    pub decode: DecodeConfig,

    /// Accept loop scheduling.
    pub concurrency: ConcurrencyConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Server mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ServerMode {
    /// Clients get a generic message on internal errors.
    #[default]
    Production,
    /// Clients get the fault origin and error chain.
    Development,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind IP address (e.g., "0.0.0.0").
    pub bind_address: String,

    /// Bind port. 0 picks an ephemeral port.
    pub port: u16,

    /// Maximum concurrent connections in concurrent mode (backpressure).
    pub max_connections: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: 8080,
            max_connections: 1_024,
        }
    }
}

/// When the server speaks TLS.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TlsPolicy {
    /// Always serve TLS, generating a self-signed certificate if none is configured.
    Always,
    /// Serve TLS only when a certificate is configured, plain TCP otherwise.
    #[default]
    PlaintextIfAbsent,
}

/// TLS configuration for the listener.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TlsConfig {
    /// Whether plain TCP is allowed when no certificate is configured.
    pub policy: TlsPolicy,

    /// Path to certificate chain file (PEM).
    pub cert_path: Option<PathBuf>,

    /// Path to private key file (PEM, PKCS#8 or legacy formats).
    pub key_path: Option<PathBuf>,

    /// Password for an encrypted PKCS#8 key (`ENCRYPTED PRIVATE KEY`).
    /// Only applies to `key_path`; generated keys are stored unencrypted.
    pub key_password: Option<String>,

    /// Where a generated self-signed identity is persisted.
    pub store_dir: PathBuf,

    /// Subject alternative names for a generated certificate.
    pub subject_alt_names: Vec<String>,

    /// Validity of a generated certificate in days (at most 100 years).
    pub validity_days: u32,
}

impl Default for TlsConfig {
    fn default() -> Self {
        Self {
            policy: TlsPolicy::default(),
            cert_path: None,
            key_path: None,
            key_password: None,
            store_dir: PathBuf::from(".portico/tls"),
            subject_alt_names: vec!["localhost".to_string()],
            validity_days: 365,
        }
    }
}

/// Codec configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DecodeConfig {
    /// How long to wait for a request's start line, in milliseconds.
    pub start_line_timeout_ms: u64,
}

impl Default for DecodeConfig {
    fn default() -> Self {
        Self {
            start_line_timeout_ms: 10_000,
        }
    }
}

/// How accepted connections are scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum WorkerMode {
    /// Fully serve one connection before accepting the next.
    #[default]
    Serialized,
    /// One task per connection, bounded by `listener.max_connections`.
    Concurrent,
}

/// Worker scheduling configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ConcurrencyConfig {
    /// Serialized or concurrent connection handling.
    pub mode: WorkerMode,

    /// How long shutdown waits for in-flight connections, in seconds.
    pub drain_timeout_secs: u64,
}

impl Default for ConcurrencyConfig {
    fn default() -> Self {
        Self {
            mode: WorkerMode::default(),
            drain_timeout_secs: 30,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// Human readable, for terminals.
    #[default]
    Pretty,
    /// One JSON object per line, for log shippers.
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error), overridden by RUST_LOG.
    pub log_level: String,

    /// Log output format (pretty, json).
    pub log_format: LogFormat,

    /// Enable the Prometheus metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::default(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
