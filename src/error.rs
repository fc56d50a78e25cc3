//! Crate-level error type for startup.
//!
//! Traffic never produces one of these: once both listeners are serving,
//! request-level failures become HTTP responses.

use crate::config::ConfigError;
use crate::net::{ListenerError, TlsError};
use crate::routing::TargetError;

#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Listener(#[from] ListenerError),
    #[error("invalid default target: {0}")]
    Target(#[from] TargetError),
    #[error("TLS error: {0}")]
    Tls(#[from] TlsError),
    #[error("metrics exporter: {0}")]
    Metrics(#[from] metrics_exporter_prometheus::BuildError),
    #[error("server error: {0}")]
    Io(#[from] std::io::Error),
    #[error("server task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}
