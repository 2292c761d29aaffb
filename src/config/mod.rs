//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ServerConfig (validated, immutable)
//!     → handed to ServerBuilder at startup
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a restart
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - Any config error is fatal at startup

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{
    ConcurrencyConfig, DecodeConfig, ListenerConfig, LogFormat, ObservabilityConfig,
    ServerConfig, ServerMode, TlsConfig, TlsPolicy, WorkerMode,
};
pub use validation::{validate_config, ValidationError};
