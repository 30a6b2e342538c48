//! TLS configuration and certificate loading.
//!
//! # Responsibilities
//! - Load listener certificates for TLS termination
//! - Build rustls client configurations for upstream connections
//!
//! # Design Decisions
//! - Every failure is a returned error, never a panic
//! - Upstream trust anchors are the bundled webpki roots

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;

use axum_server::tls_rustls::RustlsConfig;
use hyper_rustls::ConfigBuilderExt;
use rustls::ClientConfig;

use crate::error::BuildError;

/// Load TLS configuration for a listener from certificate and key files.
pub async fn load_tls_config(cert_path: &Path, key_path: &Path) -> Result<RustlsConfig, std::io::Error> {
    // Basic validation
    if !cert_path.exists() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("Certificate file not found: {:?}", cert_path),
        ));
    }
    if !key_path.exists() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("Private key file not found: {:?}", key_path),
        ));
    }

    RustlsConfig::from_pem_file(cert_path, key_path).await
}

fn builder() -> Result<rustls::ConfigBuilder<ClientConfig, rustls::client::WantsClientCert>, BuildError> {
    let builder = ClientConfig::builder_with_provider(Arc::new(rustls::crypto::ring::default_provider()))
        .with_safe_default_protocol_versions()
        .map_err(|e| BuildError::Tls(format!("protocol versions: {}", e)))?;
    Ok(builder.with_webpki_roots())
}

/// Client configuration without client authentication.
pub fn default_client_config() -> Result<ClientConfig, BuildError> {
    Ok(builder()?.with_no_client_auth())
}

/// Client configuration presenting the PEM certificate chain and key.
pub fn load_client_config(cert_path: &Path, key_path: &Path) -> Result<ClientConfig, BuildError> {
    let mut cert_file = BufReader::new(File::open(cert_path).map_err(|e| {
        BuildError::Tls(format!("failed to open certificate {:?}: {}", cert_path, e))
    })?);
    let mut key_file = BufReader::new(File::open(key_path).map_err(|e| {
        BuildError::Tls(format!("failed to open private key {:?}: {}", key_path, e))
    })?);

    let certs = rustls_pemfile::certs(&mut cert_file)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| BuildError::Tls(format!("failed to read certificate: {}", e)))?;
    if certs.is_empty() {
        return Err(BuildError::Tls(format!("no certificate found in {:?}", cert_path)));
    }

    let key = rustls_pemfile::private_key(&mut key_file)
        .map_err(|e| BuildError::Tls(format!("failed to read private key: {}", e)))?
        .ok_or_else(|| BuildError::Tls(format!("no private key found in {:?}", key_path)))?;

    builder()?
        .with_client_auth_cert(certs, key)
        .map_err(|e| BuildError::Tls(format!("invalid client certificate: {}", e)))
}
