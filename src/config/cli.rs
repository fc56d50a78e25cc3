//! Command-line surface of the proxy binary.

use std::path::PathBuf;

use clap::Parser;

use crate::config::loader::{auth_token_from_env, load_config, ConfigError};
use crate::config::schema::{ProxyConfig, TlsConfig};
use crate::config::validation::validate_config;

#[derive(Debug, Parser)]
#[command(name = "route-proxy", version)]
#[command(about = "HTTP/WebSocket reverse proxy with a runtime route API", long_about = None)]
pub struct Cli {
    /// TOML configuration file; flags override its values
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Public listener address
    #[arg(long, value_name = "ADDR")]
    pub bind: Option<String>,

    /// Control API listener address
    #[arg(long, value_name = "ADDR")]
    pub api_bind: Option<String>,

    /// Backend for requests that match no route
    #[arg(long, value_name = "URL")]
    pub default_target: Option<String>,

    /// PEM certificate for the public listener
    #[arg(long, value_name = "PATH", requires = "ssl_key")]
    pub ssl_cert: Option<String>,

    /// PEM private key for the public listener
    #[arg(long, value_name = "PATH", requires = "ssl_cert")]
    pub ssl_key: Option<String>,

    /// Strip the matched prefix before forwarding
    #[arg(long)]
    pub no_include_prefix: bool,

    /// Do not prepend the target's path
    #[arg(long)]
    pub no_prepend_path: bool,

    /// Do not add X-Forwarded-* headers
    #[arg(long)]
    pub no_x_forward: bool,

    /// Header added to every forwarded request (repeatable)
    #[arg(long = "custom-header", value_name = "NAME:VALUE", value_parser = parse_header)]
    pub custom_headers: Vec<HeaderArg>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Serve Prometheus metrics on this address
    #[arg(long, value_name = "ADDR")]
    pub metrics_bind: Option<String>,
}

/// A `NAME:VALUE` pair from `--custom-header`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderArg {
    pub name: String,
    pub value: String,
}

fn parse_header(raw: &str) -> Result<HeaderArg, String> {
    let (name, value) = raw
        .split_once(':')
        .ok_or_else(|| format!("expected NAME:VALUE, got {:?}", raw))?;
    let name = name.trim();
    if name.is_empty() {
        return Err("header name is empty".to_string());
    }
    Ok(HeaderArg {
        name: name.to_string(),
        value: value.trim().to_string(),
    })
}

impl Cli {
    /// Build the final configuration: file, then flags, then the
    /// environment token, then validation.
    pub fn into_config(self) -> Result<ProxyConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => load_config(path)?,
            None => ProxyConfig::default(),
        };
        self.apply(&mut config);
        config.api.auth_token = auth_token_from_env();
        validate_config(&config).map_err(ConfigError::Validation)?;
        Ok(config)
    }

    fn apply(self, config: &mut ProxyConfig) {
        if let Some(bind) = self.bind {
            config.listener.bind_address = bind;
        }
        if let Some(api_bind) = self.api_bind {
            config.api.bind_address = api_bind;
        }
        if let Some(target) = self.default_target {
            config.default_target = Some(target);
        }
        if let (Some(cert_path), Some(key_path)) = (self.ssl_cert, self.ssl_key) {
            config.listener.tls = Some(TlsConfig { cert_path, key_path });
        }
        if self.no_include_prefix {
            config.forwarding.include_prefix = false;
        }
        if self.no_prepend_path {
            config.forwarding.prepend_path = false;
        }
        if self.no_x_forward {
            config.forwarding.x_forward = false;
        }
        for header in self.custom_headers {
            config.forwarding.custom_headers.insert(header.name, header.value);
        }
        if let Some(level) = self.log_level {
            config.observability.log_level = level;
        }
        if let Some(addr) = self.metrics_bind {
            config.observability.metrics_enabled = true;
            config.observability.metrics_address = addr;
        }
    }
}
