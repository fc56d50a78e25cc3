//! Dynamically reconfigurable HTTP/WebSocket reverse proxy.
//!
//! A public listener forwards traffic by longest path prefix; a separate
//! control API adds and removes routes at runtime and reports per-route
//! activity.

pub mod admin;
pub mod config;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod routing;

pub use config::ProxyConfig;
pub use error::ProxyError;
pub use http::ProxyServer;
pub use lifecycle::{start, RunningProxy, Shutdown};
pub use routing::RouteTable;
