//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate addresses, targets, TLS material paths and header syntax
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::fmt;
use std::net::SocketAddr;
use std::path::Path;

use axum::http::{HeaderName, HeaderValue};

use crate::config::schema::ProxyConfig;
use crate::routing::Target;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// A single semantic problem with the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Check a configuration for semantic errors.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let public = check_addr(&mut errors, "listener.bind_address", &config.listener.bind_address);
    let api = check_addr(&mut errors, "api.bind_address", &config.api.bind_address);
    if let (Some(public), Some(api)) = (public, api) {
        if public == api && public.port() != 0 {
            errors.push(ValidationError::new(
                "api.bind_address",
                "must differ from listener.bind_address",
            ));
        }
    }

    if let Some(tls) = &config.listener.tls {
        for (field, path) in [
            ("listener.tls.cert_path", &tls.cert_path),
            ("listener.tls.key_path", &tls.key_path),
        ] {
            if !Path::new(path).exists() {
                errors.push(ValidationError::new(field, format!("file not found: {}", path)));
            }
        }
    }

    if let Some(target) = &config.default_target {
        if let Err(e) = Target::parse(target) {
            errors.push(ValidationError::new("default_target", e.to_string()));
        }
    }

    for (name, value) in &config.forwarding.custom_headers {
        if HeaderName::from_bytes(name.as_bytes()).is_err() {
            errors.push(ValidationError::new(
                "forwarding.custom_headers",
                format!("invalid header name {:?}", name),
            ));
        }
        if HeaderValue::from_str(value).is_err() {
            errors.push(ValidationError::new(
                "forwarding.custom_headers",
                format!("invalid value for header {:?}", name),
            ));
        }
    }

    if !LOG_LEVELS.contains(&config.observability.log_level.as_str()) {
        errors.push(ValidationError::new(
            "observability.log_level",
            format!("unknown level {:?}", config.observability.log_level),
        ));
    }

    if config.observability.metrics_enabled {
        check_addr(
            &mut errors,
            "observability.metrics_address",
            &config.observability.metrics_address,
        );
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_addr(errors: &mut Vec<ValidationError>, field: &str, value: &str) -> Option<SocketAddr> {
    match value.parse::<SocketAddr>() {
        Ok(addr) => Some(addr),
        Err(e) => {
            errors.push(ValidationError::new(field, format!("{:?}: {}", value, e)));
            None
        }
    }
}
