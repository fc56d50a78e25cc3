//! Backend target locators.
//!
//! A target is stored exactly as the caller supplied it (that string is what
//! listings echo back), alongside a parsed URL used for forwarding.

use std::fmt;

use axum::http::Uri;
use serde::{Serialize, Serializer};
use url::Url;

/// Error type for target parsing.
#[derive(Debug, thiserror::Error)]
pub enum TargetError {
    #[error("target is empty")]
    Empty,
    #[error("invalid target {raw:?}: {source}")]
    Invalid {
        raw: String,
        source: url::ParseError,
    },
    #[error("unsupported target scheme {0:?} (expected http or ws)")]
    UnsupportedScheme(String),
    #[error("target {0:?} has no host")]
    MissingHost(String),
}

/// A backend a prefix forwards to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    raw: String,
    url: Url,
}

impl Target {
    /// Parse a target locator.
    ///
    /// Accepts `http://host:port[/path]`, `ws://host:port[/path]` or a bare
    /// `host:port`, which is treated as plain HTTP.
    pub fn parse(raw: &str) -> Result<Self, TargetError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(TargetError::Empty);
        }

        let candidate = if trimmed.contains("://") {
            trimmed.to_string()
        } else {
            format!("http://{}", trimmed)
        };

        let mut url = Url::parse(&candidate).map_err(|source| TargetError::Invalid {
            raw: raw.to_string(),
            source,
        })?;

        match url.scheme() {
            "http" => {}
            "ws" => {
                url.set_scheme("http")
                    .map_err(|_| TargetError::UnsupportedScheme("ws".to_string()))?;
            }
            other => return Err(TargetError::UnsupportedScheme(other.to_string())),
        }

        if url.host_str().is_none() {
            return Err(TargetError::MissingHost(raw.to_string()));
        }

        Ok(Self {
            raw: raw.to_string(),
            url,
        })
    }

    /// The locator exactly as supplied.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// `host:port` of the backend.
    pub fn authority(&self) -> String {
        let host = self.url.host_str().unwrap_or_default();
        match self.url.port_or_known_default() {
            Some(port) => format!("{}:{}", host, port),
            None => host.to_string(),
        }
    }

    /// Path component of the target without a trailing slash (`""` for root).
    pub fn base_path(&self) -> &str {
        self.url.path().trim_end_matches('/')
    }

    /// Absolute HTTP URI for `path_and_query` on this backend.
    ///
    /// WebSocket handshakes use it too; they start as HTTP/1.1 upgrades.
    pub fn http_uri(&self, path_and_query: &str) -> Result<Uri, axum::http::uri::InvalidUri> {
        format!("http://{}{}", self.authority(), path_and_query).parse()
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl Serialize for Target {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.raw)
    }
}
