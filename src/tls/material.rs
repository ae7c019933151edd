//! Decoding of operator-supplied key material.
//!
//! Every secret, certificate and key in the configuration arrives as a
//! base64 string wrapping PEM. The helpers here turn those strings into
//! DER values (or a typed failure naming the offending field) and are
//! shared by the options validator and the policy compiler.

use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::SignatureAlgorithm;
use thiserror::Error;

/// Failure to decode one piece of key material.
#[derive(Debug, Error)]
pub enum MaterialError {
    /// Field was empty.
    #[error("{field}: value is empty")]
    Empty { field: &'static str },

    /// Field is not valid standard base64.
    #[error("{field}: invalid base64: {source}")]
    Base64 {
        field: &'static str,
        #[source]
        source: base64::DecodeError,
    },

    /// Decoded secret has the wrong size.
    #[error("{field}: expected {expected} bytes, got {actual}")]
    Length {
        field: &'static str,
        expected: usize,
        actual: usize,
    },

    /// PEM framing could not be read.
    #[error("{field}: malformed PEM: {source}")]
    Pem {
        field: &'static str,
        #[source]
        source: std::io::Error,
    },

    /// No PEM block of the expected kind was found.
    #[error("{field}: no {kind} found in PEM")]
    Missing {
        field: &'static str,
        kind: &'static str,
    },

    /// A key was found but it is not an elliptic-curve key.
    #[error("{field}: not an EC private key: {reason}")]
    NotEcKey { field: &'static str, reason: String },
}

/// Decode a standard, padded base64 string.
///
/// Line breaks are skipped; any other whitespace is invalid input.
pub fn decode_base64(field: &'static str, value: &str) -> Result<Vec<u8>, MaterialError> {
    let value: Cow<'_, str> = if value.contains(['\r', '\n']) {
        Cow::Owned(value.chars().filter(|c| !matches!(c, '\r' | '\n')).collect())
    } else {
        Cow::Borrowed(value)
    };
    if value.is_empty() {
        return Err(MaterialError::Empty { field });
    }
    STANDARD
        .decode(value.as_bytes())
        .map_err(|source| MaterialError::Base64 { field, source })
}

/// Decode a base64 secret that must be exactly `expected` bytes long.
pub fn decode_secret(
    field: &'static str,
    value: &str,
    expected: usize,
) -> Result<Vec<u8>, MaterialError> {
    let bytes = decode_base64(field, value)?;
    if bytes.len() != expected {
        return Err(MaterialError::Length {
            field,
            expected,
            actual: bytes.len(),
        });
    }
    Ok(bytes)
}

/// Decode base64 PEM into one or more certificates.
pub fn decode_certificates(
    field: &'static str,
    value: &str,
) -> Result<Vec<CertificateDer<'static>>, MaterialError> {
    let pem = decode_base64(field, value)?;
    let certs = rustls_pemfile::certs(&mut pem.as_slice())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|source| MaterialError::Pem { field, source })?;

    if certs.is_empty() {
        return Err(MaterialError::Missing {
            field,
            kind: "certificate",
        });
    }
    Ok(certs)
}

/// Decode base64 PEM into the first private key it contains.
pub fn decode_private_key(
    field: &'static str,
    value: &str,
) -> Result<PrivateKeyDer<'static>, MaterialError> {
    let pem = decode_base64(field, value)?;
    rustls_pemfile::private_key(&mut pem.as_slice())
        .map_err(|source| MaterialError::Pem { field, source })?
        .ok_or(MaterialError::Missing {
            field,
            kind: "private key",
        })
}

/// Parsed EC key used to sign outbound identity assertions.
#[derive(Clone)]
pub struct SigningKey {
    key: Arc<dyn rustls::sign::SigningKey>,
}

impl SigningKey {
    /// Signature algorithm of the key (always ECDSA).
    pub fn algorithm(&self) -> SignatureAlgorithm {
        self.key.algorithm()
    }

    /// The parsed key.
    pub fn key(&self) -> &Arc<dyn rustls::sign::SigningKey> {
        &self.key
    }
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningKey")
            .field("algorithm", &self.algorithm())
            .finish_non_exhaustive()
    }
}

/// Decode base64 PEM into an EC signing key; any other key type is rejected.
pub fn decode_signing_key(value: &str) -> Result<SigningKey, MaterialError> {
    const FIELD: &str = "signing_key";

    let der = decode_private_key(FIELD, value)?;
    if let PrivateKeyDer::Pkcs1(_) = der {
        return Err(MaterialError::NotEcKey {
            field: FIELD,
            reason: "RSA key".to_string(),
        });
    }

    let key = rustls::crypto::ring::sign::any_ecdsa_type(&der).map_err(|e| {
        MaterialError::NotEcKey {
            field: FIELD,
            reason: e.to_string(),
        }
    })?;
    Ok(SigningKey { key })
}
