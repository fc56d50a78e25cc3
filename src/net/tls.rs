//! TLS configuration and certificate loading.

use std::path::Path;

use axum_server::tls_rustls::RustlsConfig;

use crate::config::TlsConfig;

/// Error type for TLS material loading.
#[derive(Debug, thiserror::Error)]
pub enum TlsError {
    #[error("{kind} file not found: {path}")]
    Missing { kind: &'static str, path: String },
    #[error("invalid TLS material ({cert_path}, {key_path}): {source}")]
    Invalid {
        cert_path: String,
        key_path: String,
        source: std::io::Error,
    },
}

/// Load the public listener's certificate and key.
pub async fn load_tls_config(tls: &TlsConfig) -> Result<RustlsConfig, TlsError> {
    for (kind, path) in [("certificate", &tls.cert_path), ("private key", &tls.key_path)] {
        if !Path::new(path).exists() {
            return Err(TlsError::Missing {
                kind,
                path: path.clone(),
            });
        }
    }

    RustlsConfig::from_pem_file(&tls.cert_path, &tls.key_path)
        .await
        .map_err(|source| TlsError::Invalid {
            cert_path: tls.cert_path.clone(),
            key_path: tls.key_path.clone(),
            source,
        })
}
