//! Policy compilation.
//!
//! Turns one policy into a [`RouteEntry`]: backend URL, a client carrying
//! the policy's own TLS configuration, the upstream deadline, and the
//! flags consulted at request time.

use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Method, Request};
use axum::response::Response;
use thiserror::Error;
use url::Url;

use crate::config::validation::{parse_backend_url, parse_policy_url, ValidationError};
use crate::config::Policy;
use crate::proxy::forward::{build_client, ReverseProxy};
use crate::routing::host::route_key;
use crate::tls::{build_client_config, TlsError};

/// Failure to compile a policy.
#[derive(Debug, Error)]
pub enum CompileError {
    #[error(transparent)]
    Url(#[from] ValidationError),

    #[error(transparent)]
    Tls(#[from] TlsError),
}

/// The compiled, immutable form of one policy.
#[derive(Debug)]
pub struct RouteEntry {
    host: String,
    from: Url,
    proxy: ReverseProxy,
    allow_public_unauthenticated_access: bool,
    cors_allow_preflight: bool,
    tls_skip_verify: bool,
}

impl RouteEntry {
    /// Normalized inbound host this entry is keyed under.
    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn from_url(&self) -> &Url {
        &self.from
    }

    /// Backend URL requests are forwarded to.
    pub fn to(&self) -> &Url {
        self.proxy.target()
    }

    pub fn upstream_timeout(&self) -> Duration {
        self.proxy.timeout()
    }

    pub fn allows_public_access(&self) -> bool {
        self.allow_public_unauthenticated_access
    }

    pub fn allows_cors_preflight(&self) -> bool {
        self.cors_allow_preflight
    }

    pub fn skips_tls_verification(&self) -> bool {
        self.tls_skip_verify
    }

    /// Whether `req` may reach the backend without consulting the access gate.
    pub fn bypasses_access_gate<B>(&self, req: &Request<B>) -> bool {
        self.allow_public_unauthenticated_access
            || (self.cors_allow_preflight && is_cors_preflight(req))
    }

    /// Forward a request to this entry's backend.
    pub async fn forward(&self, req: Request<Body>) -> Response {
        self.proxy.forward(req).await
    }
}

/// An `OPTIONS` request carrying both `Origin` and `Access-Control-Request-Method`.
pub fn is_cors_preflight<B>(req: &Request<B>) -> bool {
    req.method() == Method::OPTIONS
        && req.headers().contains_key(header::ORIGIN)
        && req.headers().contains_key(header::ACCESS_CONTROL_REQUEST_METHOD)
}

/// Compile a policy into a route entry.
pub fn compile_policy(policy: &Policy, default_timeout: Duration) -> Result<RouteEntry, CompileError> {
    let from = parse_policy_url("from", &policy.from)?;
    let host = route_key(&from).ok_or_else(|| ValidationError::MissingHost {
        field: "from",
        value: policy.from.clone(),
    })?;
    let to = parse_backend_url(&policy.to)?;

    let tls = build_client_config(policy)?;
    if policy.tls_skip_verify {
        tracing::warn!(
            host = %host,
            backend = %to,
            "TLS verification disabled for backend - INSECURE"
        );
    }

    let timeout = policy.upstream_timeout(default_timeout);
    let client = build_client(tls, timeout);
    let proxy = ReverseProxy::new(to, client, timeout, policy.preserve_host_header);

    tracing::debug!(
        host = %host,
        backend = %proxy.target(),
        timeout_ms = timeout.as_millis() as u64,
        custom_ca = policy.tls_custom_ca.is_some(),
        client_cert = policy.tls_client_cert.is_some(),
        "Compiled policy"
    );

    Ok(RouteEntry {
        host,
        from,
        proxy,
        allow_public_unauthenticated_access: policy.allow_public_unauthenticated_access,
        cors_allow_preflight: policy.cors_allow_preflight,
        tls_skip_verify: policy.tls_skip_verify,
    })
}
