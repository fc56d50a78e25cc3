//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! optional config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → cli.rs (command-line overrides)
//!     → environment (control API token)
//!     → validation.rs (semantic checks)
//!     → ProxyConfig (validated, immutable)
//!     → shared with the listeners at startup
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; routes are the only runtime state
//! - All fields have defaults to allow minimal configs
//! - The auth token never comes from a file or a flag
//! - Validation separates syntactic (serde) from semantic checks

pub mod cli;
pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{ConfigError, AUTH_TOKEN_ENV};
pub use schema::{
    ApiConfig, ForwardingConfig, ListenerConfig, ObservabilityConfig, ProxyConfig, TlsConfig,
};
