//! Configuration validation.
//!
//! # Responsibilities
//! - Service URLs are absolute, with scheme and host
//! - Secrets decode (cookie secret to exactly 32 bytes)
//! - Optional signing key is an EC private key
//! - Every policy is well formed, including its TLS material
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: Options → Result<(), ValidationErrors>
//! - Runs before every build, at startup and on each reload

use std::fmt;

use thiserror::Error;
use url::Url;

use crate::config::schema::{Options, Policy};
use crate::tls::client::{check_client_auth_pair, TlsError};
use crate::tls::material::{
    decode_base64, decode_certificates, decode_private_key, decode_secret, decode_signing_key,
    MaterialError,
};

/// Required decoded length of the cookie secret.
pub const COOKIE_SECRET_LEN: usize = 32;

/// Backend schemes a policy may forward to.
pub const SUPPORTED_SCHEMES: &[&str] = &["http", "https"];

/// A single semantic problem with the configuration.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("{0} is required")]
    Missing(&'static str),

    #[error("{field}: {value:?} has no scheme")]
    MissingScheme { field: &'static str, value: String },

    #[error("{field}: {value:?} has surrounding whitespace")]
    Whitespace { field: &'static str, value: String },

    #[error("{field}: {value:?} has no host")]
    MissingHost { field: &'static str, value: String },

    #[error("{field}: invalid url {value:?}: {source}")]
    InvalidUrl {
        field: &'static str,
        value: String,
        #[source]
        source: url::ParseError,
    },

    #[error("{field}: unsupported scheme {scheme:?}")]
    UnsupportedScheme { field: &'static str, scheme: String },

    #[error(transparent)]
    Material(#[from] MaterialError),

    #[error(transparent)]
    Tls(#[from] TlsError),

    #[error("tls_client_cert and tls_client_key must be set together")]
    IncompleteClientAuth,

    #[error("{0} must be greater than zero")]
    ZeroTimeout(&'static str),

    #[error("at least one policy is required")]
    NoPolicies,

    #[error("policies[{index}]: {source}")]
    Policy {
        index: usize,
        #[source]
        source: Box<ValidationError>,
    },
}

/// Every validation failure found in one pass.
#[derive(Debug)]
pub struct ValidationErrors(pub Vec<ValidationError>);

impl ValidationErrors {
    fn into_result(errors: Vec<ValidationError>) -> Result<(), Self> {
        if errors.is_empty() {
            Ok(())
        } else {
            Err(Self(errors))
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &ValidationError> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Validation failed: ")?;
        for (i, err) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", err)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

/// Scheme assumed for policy URLs written as a bare host.
pub const DEFAULT_POLICY_SCHEME: &str = "https";

/// Parse an absolute URL that must carry both a scheme and a host.
pub fn parse_url(field: &'static str, value: &str) -> Result<Url, ValidationError> {
    if value.is_empty() {
        return Err(ValidationError::Missing(field));
    }
    if value.trim() != value {
        return Err(ValidationError::Whitespace {
            field,
            value: value.to_string(),
        });
    }

    let url = Url::parse(value).map_err(|source| match source {
        url::ParseError::RelativeUrlWithoutBase => ValidationError::MissingScheme {
            field,
            value: value.to_string(),
        },
        source => ValidationError::InvalidUrl {
            field,
            value: value.to_string(),
            source,
        },
    })?;

    match url.host_str() {
        Some(host) if !host.is_empty() => Ok(url),
        _ => Err(ValidationError::MissingHost {
            field,
            value: value.to_string(),
        }),
    }
}

/// Parse a policy `from`/`to` URL. A value without `://` is a bare host
/// and gets [`DEFAULT_POLICY_SCHEME`].
pub fn parse_policy_url(field: &'static str, value: &str) -> Result<Url, ValidationError> {
    if value.is_empty() || value.contains("://") {
        return parse_url(field, value);
    }
    parse_url(field, &format!("{}://{}", DEFAULT_POLICY_SCHEME, value))
}

/// Parse a policy's backend URL and check its scheme is one we can dial.
pub fn parse_backend_url(value: &str) -> Result<Url, ValidationError> {
    let url = parse_policy_url("to", value)?;
    if !SUPPORTED_SCHEMES.contains(&url.scheme()) {
        return Err(ValidationError::UnsupportedScheme {
            field: "to",
            scheme: url.scheme().to_string(),
        });
    }
    Ok(url)
}

/// Validate a full options snapshot.
pub fn validate_options(options: &Options) -> Result<(), ValidationErrors> {
    let mut errors = Vec::new();

    if let Err(e) = parse_url("authenticate_url", &options.authenticate_url) {
        errors.push(e);
    }
    if let Err(e) = parse_url("authorize_url", &options.authorize_url) {
        errors.push(e);
    }
    if let Some(addr) = &options.authenticate_internal_addr {
        if let Err(e) = parse_url("authenticate_internal_addr", addr) {
            errors.push(e);
        }
    }

    if let Err(e) = decode_secret("cookie_secret", &options.cookie_secret, COOKIE_SECRET_LEN) {
        errors.push(e.into());
    }
    if let Err(e) = decode_base64("shared_secret", &options.shared_secret) {
        errors.push(e.into());
    }
    if let Some(key) = &options.signing_key {
        if let Err(e) = decode_signing_key(key) {
            errors.push(e.into());
        }
    }
    if options.default_upstream_timeout_ms == Some(0) {
        errors.push(ValidationError::ZeroTimeout("default_upstream_timeout_ms"));
    }

    if options.policies.is_empty() {
        errors.push(ValidationError::NoPolicies);
    }
    for (index, policy) in options.policies.iter().enumerate() {
        if let Err(policy_errors) = validate_policy(policy) {
            errors.extend(policy_errors.into_iter().map(|e| ValidationError::Policy {
                index,
                source: Box::new(e),
            }));
        }
    }

    ValidationErrors::into_result(errors)
}

/// Validate one policy in isolation.
pub fn validate_policy(policy: &Policy) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if let Err(e) = parse_policy_url("from", &policy.from) {
        errors.push(e);
    }
    if let Err(e) = parse_backend_url(&policy.to) {
        errors.push(e);
    }

    if let Some(bundle) = &policy.tls_custom_ca {
        if let Err(e) = decode_certificates("tls_custom_ca", bundle) {
            errors.push(e.into());
        }
    }
    match (&policy.tls_client_cert, &policy.tls_client_key) {
        (Some(cert), Some(key)) => {
            let chain = decode_certificates("tls_client_cert", cert);
            let key = decode_private_key("tls_client_key", key);
            match (chain, key) {
                (Ok(chain), Ok(key)) => {
                    if let Err(e) = check_client_auth_pair(chain, key) {
                        errors.push(e.into());
                    }
                }
                (chain, key) => {
                    errors.extend(chain.err().map(ValidationError::from));
                    errors.extend(key.err().map(ValidationError::from));
                }
            }
        }
        (None, None) => {}
        _ => errors.push(ValidationError::IncompleteClientAuth),
    }

    if policy.upstream_timeout_ms == Some(0) {
        errors.push(ValidationError::ZeroTimeout("upstream_timeout_ms"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testdata;

    #[test]
    fn validate_options_table() {
        let bad_scheme = "authenticate.corp.beyondperimeter.com".to_string();
        let good = testdata::options();

        let cases: Vec<(&str, Options, bool)> = vec![
            ("good - minimum options", good.clone(), false),
            ("empty options", Options::default(), true),
            (
                "authenticate service url missing",
                Options { authenticate_url: String::new(), ..good.clone() },
                true,
            ),
            (
                "authenticate service url no scheme",
                Options { authenticate_url: bad_scheme.clone(), ..good.clone() },
                true,
            ),
            (
                "internal authenticate service url no scheme",
                Options { authenticate_internal_addr: Some(bad_scheme.clone()), ..good.clone() },
                true,
            ),
            (
                "internal authenticate service url",
                Options {
                    authenticate_internal_addr: Some("http://authenticate.internal:8080".into()),
                    ..good.clone()
                },
                false,
            ),
            (
                "authorize service url no scheme",
                Options { authorize_url: bad_scheme.clone(), ..good.clone() },
                true,
            ),
            (
                "authorize service missing",
                Options { authorize_url: String::new(), ..good.clone() },
                true,
            ),
            (
                "no cookie secret",
                Options { cookie_secret: String::new(), ..good.clone() },
                true,
            ),
            (
                "invalid cookie secret",
                Options {
                    cookie_secret: "OromP1gurwGWjQPYb1nNgSxtbVB5NnLzX6z5WOKr0Yw^".into(),
                    ..good.clone()
                },
                true,
            ),
            (
                "short cookie secret",
                Options {
                    cookie_secret: "gN3xnvfsAwfCXxnJorGLKUG4l2wC8sS8nfLMhcStPg==".into(),
                    ..good.clone()
                },
                true,
            ),
            (
                "no shared secret",
                Options { shared_secret: String::new(), ..good.clone() },
                true,
            ),
            (
                "shared secret bad base64",
                Options { shared_secret: "%(*@389".into(), ..good.clone() },
                true,
            ),
            (
                "invalid signing key",
                Options {
                    signing_key: Some("OromP1gurwGWjQPYb1nNgSxtbVB5NnLzX6z5WOKr0Yw^".into()),
                    ..good.clone()
                },
                true,
            ),
            (
                "valid base64 but not a key",
                Options { signing_key: Some("YmFkIGtleQo=".into()), ..good.clone() },
                true,
            ),
            (
                "good signing key",
                Options { signing_key: Some(testdata::signing_key().into()), ..good.clone() },
                false,
            ),
            (
                "missing policies",
                Options { policies: Vec::new(), ..good.clone() },
                true,
            ),
        ];

        for (name, options, want_err) in cases {
            let result = validate_options(&options);
            assert_eq!(result.is_err(), want_err, "{}: {:?}", name, result.err());
        }
    }

    #[test]
    fn validation_is_repeatable() {
        let mut options = testdata::options();
        options.cookie_secret = "short".to_string();

        let first = validate_options(&options).unwrap_err().to_string();
        let second = validate_options(&options).unwrap_err().to_string();
        assert_eq!(first, second);
    }

    #[test]
    fn reports_every_failure() {
        let options = Options {
            policies: vec![Policy::new("https://ok.example", "ftp://files.example")],
            ..Options::default()
        };
        let errors = validate_options(&options).unwrap_err();

        // authenticate, authorize, cookie secret, shared secret, policy scheme
        assert_eq!(errors.len(), 5);
        assert!(errors.iter().any(|e| matches!(
            e,
            ValidationError::Policy { index: 0, source }
                if matches!(**source, ValidationError::UnsupportedScheme { .. })
        )));
    }

    #[test]
    fn policy_rules() {
        let ok = Policy::new("http://bar.example", "http://foo.example");
        assert!(validate_policy(&ok).is_ok());

        let no_backend_host = Policy::new("http://bar.example", "http://");
        assert!(validate_policy(&no_backend_host).is_err());

        let no_from = Policy::new("", "http://foo.example");
        assert!(validate_policy(&no_from).is_err());

        let mut bad_ca = ok.clone();
        bad_ca.tls_custom_ca = Some("=@@".into());
        assert!(validate_policy(&bad_ca).is_err());

        let mut good_ca = ok.clone();
        good_ca.tls_custom_ca = Some(testdata::custom_ca().into());
        assert!(validate_policy(&good_ca).is_ok());

        let mut key_only = ok.clone();
        key_only.tls_client_key = Some(testdata::client_key().into());
        let errors = validate_policy(&key_only).unwrap_err();
        assert!(matches!(errors[0], ValidationError::IncompleteClientAuth));

        let mut pair = ok.clone();
        pair.tls_client_cert = Some(testdata::client_cert().into());
        pair.tls_client_key = Some(testdata::client_key().into());
        assert!(validate_policy(&pair).is_ok());

        let mut zero = ok;
        zero.upstream_timeout_ms = Some(0);
        assert!(validate_policy(&zero).is_err());
    }

    #[test]
    fn mismatched_client_pair_is_rejected() {
        let mut policy = Policy::new("http://bar.example", "http://foo.example");
        policy.tls_client_cert = Some(testdata::client_cert().into());
        policy.tls_client_key = Some(testdata::signing_key().into());

        let errors = validate_policy(&policy).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(matches!(errors[0], ValidationError::Tls(TlsError::ClientAuth(_))));

        let options = Options {
            policies: vec![policy],
            ..testdata::options()
        };
        assert!(validate_options(&options).is_err());
    }

    #[test]
    fn bare_policy_hosts_default_to_https() {
        let policy = Policy::new("corp.example.com", "backend.example.com");
        assert!(validate_policy(&policy).is_ok());

        let url = parse_policy_url("from", "corp.example.com").unwrap();
        assert_eq!(url.scheme(), "https");
        assert_eq!(url.host_str(), Some("corp.example.com"));

        let url = parse_backend_url("http://backend.example.com:8080").unwrap();
        assert_eq!(url.scheme(), "http");
    }

    #[test]
    fn service_urls_still_need_a_scheme() {
        let options = Options {
            authorize_url: "authorize.example".into(),
            ..testdata::options()
        };
        assert!(validate_options(&options).is_err());
    }

    #[test]
    fn surrounding_whitespace_is_rejected() {
        let err = parse_url("authenticate_url", " https://authenticate.example ").unwrap_err();
        assert!(matches!(err, ValidationError::Whitespace { field: "authenticate_url", .. }));

        let options = Options {
            cookie_secret: format!(" {} ", testdata::COOKIE_SECRET),
            ..testdata::options()
        };
        assert!(validate_options(&options).is_err());
    }

    #[test]
    fn url_without_scheme_is_named() {
        let err = parse_url("authorize_url", "authorize.example").unwrap_err();
        assert!(matches!(err, ValidationError::MissingScheme { field: "authorize_url", .. }));
    }
}
