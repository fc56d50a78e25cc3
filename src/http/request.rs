//! Request handling and transformation.
//!
//! # Responsibilities
//! - Build the upstream path (prefix stripping, target path prepending)
//! - Strip hop-by-hop headers
//! - Add X-Forwarded-* and configured custom headers
//! - Detect WebSocket upgrades
//!
//! # Design Decisions
//! - The original `Host` header is preserved
//! - X-Forwarded-* values are appended to whatever the client sent

use std::net::SocketAddr;

use axum::http::{header, HeaderMap, HeaderName, HeaderValue, Uri};

use crate::config::ForwardingConfig;
use crate::routing::matcher::{depth, strip_segments};
use crate::routing::Target;

const HOP_BY_HOP: [HeaderName; 8] = [
    header::CONNECTION,
    HeaderName::from_static("keep-alive"),
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

/// Rewrites requests on their way to a backend.
#[derive(Debug, Clone)]
pub struct RequestRewriter {
    include_prefix: bool,
    prepend_path: bool,
    x_forward: bool,
    custom_headers: HeaderMap,
    proto: &'static str,
}

impl RequestRewriter {
    /// Build from config. `tls` is whether the public listener terminates TLS.
    pub fn new(config: &ForwardingConfig, tls: bool) -> Self {
        let mut custom_headers = HeaderMap::new();
        for (name, value) in &config.custom_headers {
            match (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(value),
            ) {
                (Ok(name), Ok(value)) => {
                    custom_headers.insert(name, value);
                }
                _ => tracing::warn!(header = %name, "Skipping invalid custom header"),
            }
        }

        Self {
            include_prefix: config.include_prefix,
            prepend_path: config.prepend_path,
            x_forward: config.x_forward,
            custom_headers,
            proto: if tls { "https" } else { "http" },
        }
    }

    /// Path and query to request from `target`.
    ///
    /// `prefix` is the matched route, `None` for the default target.
    pub fn upstream_path(&self, uri: &Uri, target: &Target, prefix: Option<&str>) -> String {
        let mut path = match prefix {
            Some(prefix) if !self.include_prefix => strip_segments(uri.path(), depth(prefix)),
            _ => uri.path().to_string(),
        };
        if path.is_empty() {
            path.push('/');
        }
        if self.prepend_path {
            path = format!("{}{}", target.base_path(), path);
        }
        if let Some(query) = uri.query() {
            path.push('?');
            path.push_str(query);
        }
        path
    }

    /// Add forwarding metadata and custom headers.
    pub fn apply_headers(&self, headers: &mut HeaderMap, peer: SocketAddr) {
        if self.x_forward {
            let host = headers
                .get(header::HOST)
                .and_then(|v| v.to_str().ok())
                .map(str::to_owned);
            let port = host
                .as_deref()
                .and_then(|h| h.rsplit_once(':'))
                .and_then(|(_, port)| port.parse::<u16>().ok())
                .unwrap_or(if self.proto == "https" { 443 } else { 80 });

            append_forwarded(headers, "x-forwarded-for", &peer.ip().to_string());
            append_forwarded(headers, "x-forwarded-port", &port.to_string());
            append_forwarded(headers, "x-forwarded-proto", self.proto);
            if let Some(host) = host {
                append_forwarded(headers, "x-forwarded-host", &host);
            }
        }

        for (name, value) in &self.custom_headers {
            headers.insert(name.clone(), value.clone());
        }
    }
}

fn append_forwarded(headers: &mut HeaderMap, name: &'static str, value: &str) {
    let combined = match headers.get(name).and_then(|v| v.to_str().ok()) {
        Some(existing) if !existing.is_empty() => format!("{}, {}", existing, value),
        _ => value.to_string(),
    };
    if let Ok(value) = HeaderValue::from_str(&combined) {
        headers.insert(name, value);
    }
}

/// Remove hop-by-hop headers, including any named in `Connection`.
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let listed: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();

    for name in listed.iter().chain(HOP_BY_HOP.iter()) {
        headers.remove(name);
    }
}

/// True if the request asks to switch to the WebSocket protocol.
pub fn is_websocket_upgrade(headers: &HeaderMap) -> bool {
    let connection_upgrade = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .any(|token| token.trim().eq_ignore_ascii_case("upgrade"));

    let upgrade_websocket = headers
        .get(header::UPGRADE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.eq_ignore_ascii_case("websocket"))
        .unwrap_or(false);

    connection_upgrade && upgrade_websocket
}
