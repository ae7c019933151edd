//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy.
//! All types derive Serde traits for deserialization from config files.
//!
//! Secrets, certificates and URLs are kept as the raw strings the operator
//! wrote; they are only decoded at the validation boundary so that every
//! malformed value can be reported instead of failing deserialization.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Upstream timeout applied to policies that do not set their own.
pub const DEFAULT_UPSTREAM_TIMEOUT: Duration = Duration::from_secs(30);

/// Root configuration for the reverse proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listener configuration (bind address, connection limit).
    pub listener: ListenerConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Routing snapshot: service URLs, secrets and policies.
    #[serde(flatten)]
    pub options: Options,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Maximum concurrent connections (backpressure).
    pub max_connections: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            max_connections: 10_000,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error). `RUST_LOG` wins when set.
    pub log_level: String,

    /// Log line format: "pretty" or "compact".
    pub log_format: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: "compact".to_string(),
        }
    }
}

/// The configuration snapshot a route table is built from.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct Options {
    /// Public URL of the authenticate service.
    pub authenticate_url: String,

    /// Public URL of the authorize service.
    pub authorize_url: String,

    /// Internal address override for the authenticate service.
    pub authenticate_internal_addr: Option<String>,

    /// Cookie encryption secret, base64 of exactly 32 bytes.
    pub cookie_secret: String,

    /// Session cookie name.
    pub cookie_name: String,

    /// Secret shared with the other services, base64.
    pub shared_secret: String,

    /// Base64 PEM EC private key used to sign outbound identity headers.
    pub signing_key: Option<String>,

    /// Timeout for policies without `upstream_timeout_ms`.
    pub default_upstream_timeout_ms: Option<u64>,

    /// Ordered routing policies.
    pub policies: Vec<Policy>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            authenticate_url: String::new(),
            authorize_url: String::new(),
            authenticate_internal_addr: None,
            cookie_secret: String::new(),
            cookie_name: "_proxy".to_string(),
            shared_secret: String::new(),
            signing_key: None,
            default_upstream_timeout_ms: None,
            policies: Vec::new(),
        }
    }
}

impl Options {
    /// Timeout applied when a policy does not carry its own.
    pub fn default_upstream_timeout(&self) -> Duration {
        self.default_upstream_timeout_ms
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_UPSTREAM_TIMEOUT)
    }
}

/// One routing rule: a public host and the backend it forwards to.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct Policy {
    /// Public-facing URL; its host is the route key.
    pub from: String,

    /// Backend URL (http or https).
    pub to: String,

    /// Accept any backend certificate.
    pub tls_skip_verify: bool,

    /// Base64 PEM bundle replacing the system trust roots.
    pub tls_custom_ca: Option<String>,

    /// Base64 PEM client certificate for mutual TLS.
    pub tls_client_cert: Option<String>,

    /// Base64 PEM private key matching `tls_client_cert`.
    pub tls_client_key: Option<String>,

    /// Per-request deadline for the backend round trip.
    pub upstream_timeout_ms: Option<u64>,

    /// Skip the access gate entirely for this route.
    pub allow_public_unauthenticated_access: bool,

    /// Let CORS preflight requests through without the access gate.
    pub cors_allow_preflight: bool,

    /// Forward the inbound `Host` header instead of the backend authority.
    pub preserve_host_header: bool,
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            from: String::new(),
            to: String::new(),
            tls_skip_verify: false,
            tls_custom_ca: None,
            tls_client_cert: None,
            tls_client_key: None,
            upstream_timeout_ms: None,
            allow_public_unauthenticated_access: false,
            cors_allow_preflight: false,
            preserve_host_header: true,
        }
    }
}

impl Policy {
    /// Shorthand for a plain `from` → `to` policy with default flags.
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            ..Self::default()
        }
    }

    /// The effective upstream timeout for this policy.
    pub fn upstream_timeout(&self, default: Duration) -> Duration {
        self.upstream_timeout_ms
            .map(Duration::from_millis)
            .unwrap_or(default)
    }
}
