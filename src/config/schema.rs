//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy.
//! All types derive Serde traits for deserialization from config files.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Root configuration for the proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Public (data plane) listener.
    pub listener: ListenerConfig,

    /// Control API listener.
    pub api: ApiConfig,

    /// Backend used when no stored prefix matches.
    pub default_target: Option<String>,

    /// How requests are rewritten on their way upstream.
    pub forwarding: ForwardingConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Public listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8000").
    pub bind_address: String,

    /// Optional TLS configuration.
    pub tls: Option<TlsConfig>,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8000".to_string(),
            tls: None,
        }
    }
}

/// TLS configuration for the public listener.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TlsConfig {
    /// Path to certificate file (PEM).
    pub cert_path: String,

    /// Path to private key file (PEM).
    pub key_path: String,
}

/// Control API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Bind address (e.g., "127.0.0.1:8001").
    pub bind_address: String,

    /// Shared secret for `Authorization: token <secret>`.
    /// Only ever populated from the environment.
    #[serde(skip)]
    pub auth_token: Option<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:8001".to_string(),
            auth_token: None,
        }
    }
}

/// Request rewriting applied by the data plane.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ForwardingConfig {
    /// Keep the matched prefix in the forwarded path.
    pub include_prefix: bool,

    /// Prepend the target URL's path to the forwarded path.
    pub prepend_path: bool,

    /// Add X-Forwarded-For/-Proto/-Host/-Port headers.
    pub x_forward: bool,

    /// Extra headers set on every forwarded request.
    pub custom_headers: BTreeMap<String, String>,
}

impl Default for ForwardingConfig {
    fn default() -> Self {
        Self {
            include_prefix: true,
            prepend_path: true,
            x_forward: true,
            custom_headers: BTreeMap::new(),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:8002".to_string(),
        }
    }
}
