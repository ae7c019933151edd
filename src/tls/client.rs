//! Outbound TLS configuration for one policy.
//!
//! # Responsibilities
//! - Build the trust roots (custom CA bundle or the platform store)
//! - Attach the client certificate for mutual TLS
//! - Disable certificate verification when the policy asks for it
//!
//! # Design Decisions
//! - A custom CA replaces the platform roots, it never extends them
//! - Any decode failure aborts the build; there is no insecure fallback
//! - Platform roots are loaded once per process and shared

use std::sync::{Arc, OnceLock};

use rustls::client::WantsClientCert;
use rustls::crypto::CryptoProvider;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::{ClientConfig, ConfigBuilder, RootCertStore};
use thiserror::Error;

use crate::config::Policy;
use crate::tls::material::{decode_certificates, decode_private_key, MaterialError};
use crate::tls::verifier::InsecureVerifier;

/// Error building a policy's TLS client configuration.
#[derive(Debug, Error)]
pub enum TlsError {
    #[error(transparent)]
    Material(#[from] MaterialError),

    /// Certificate decoded but could not become a trust anchor.
    #[error("{field}: unusable certificate: {source}")]
    TrustAnchor {
        field: &'static str,
        #[source]
        source: rustls::Error,
    },

    #[error("tls_client_cert and tls_client_key must be set together")]
    IncompleteClientAuth,

    /// Certificate and key were rejected as a pair.
    #[error("client certificate rejected: {0}")]
    ClientAuth(#[source] rustls::Error),

    #[error("protocol versions unsupported: {0}")]
    Protocol(#[source] rustls::Error),
}

static NATIVE_ROOTS: OnceLock<Arc<RootCertStore>> = OnceLock::new();

fn native_roots() -> Arc<RootCertStore> {
    NATIVE_ROOTS
        .get_or_init(|| {
            let loaded = rustls_native_certs::load_native_certs();
            for error in &loaded.errors {
                tracing::warn!(error = %error, "Failed to load some platform root certificates");
            }
            let mut roots = RootCertStore::empty();
            let (added, ignored) = roots.add_parsable_certificates(loaded.certs);
            tracing::debug!(added, ignored, "Loaded platform root certificates");
            Arc::new(roots)
        })
        .clone()
}

fn custom_roots(bundle: &str) -> Result<Arc<RootCertStore>, TlsError> {
    const FIELD: &str = "tls_custom_ca";

    let mut roots = RootCertStore::empty();
    for cert in decode_certificates(FIELD, bundle)? {
        roots
            .add(cert)
            .map_err(|source| TlsError::TrustAnchor { field: FIELD, source })?;
    }
    Ok(Arc::new(roots))
}

fn config_builder(
    provider: Arc<CryptoProvider>,
    roots: Arc<RootCertStore>,
) -> Result<ConfigBuilder<ClientConfig, WantsClientCert>, TlsError> {
    Ok(ClientConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .map_err(TlsError::Protocol)?
        .with_root_certificates(roots))
}

/// Check that a client certificate chain and private key belong together.
///
/// Runs the same acceptance rustls applies when the pair is installed for
/// mutual TLS, so a pair that passes here also builds.
pub fn check_client_auth_pair(
    chain: Vec<CertificateDer<'static>>,
    key: PrivateKeyDer<'static>,
) -> Result<(), TlsError> {
    let provider = Arc::new(rustls::crypto::ring::default_provider());
    config_builder(provider, Arc::new(RootCertStore::empty()))?
        .with_client_auth_cert(chain, key)
        .map_err(TlsError::ClientAuth)?;
    Ok(())
}

/// Build the rustls client configuration used to reach a policy's backend.
pub fn build_client_config(policy: &Policy) -> Result<ClientConfig, TlsError> {
    let provider = Arc::new(rustls::crypto::ring::default_provider());

    let roots = match policy.tls_custom_ca.as_deref() {
        Some(bundle) => custom_roots(bundle)?,
        None => native_roots(),
    };

    let builder = config_builder(Arc::clone(&provider), roots)?;

    let mut config = match (
        policy.tls_client_cert.as_deref(),
        policy.tls_client_key.as_deref(),
    ) {
        (Some(cert), Some(key)) => {
            let chain = decode_certificates("tls_client_cert", cert)?;
            let key = decode_private_key("tls_client_key", key)?;
            builder
                .with_client_auth_cert(chain, key)
                .map_err(TlsError::ClientAuth)?
        }
        (None, None) => builder.with_no_client_auth(),
        _ => return Err(TlsError::IncompleteClientAuth),
    };

    if policy.tls_skip_verify {
        install_insecure_verifier(&mut config, provider);
    }

    Ok(config)
}

fn install_insecure_verifier(config: &mut ClientConfig, provider: Arc<CryptoProvider>) {
    config
        .dangerous()
        .set_certificate_verifier(Arc::new(InsecureVerifier::new(provider)));
}
