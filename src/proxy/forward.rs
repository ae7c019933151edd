//! Request forwarding to one backend.
//!
//! # Responsibilities
//! - Rewrite the request target to the backend's scheme and authority
//! - Join the backend's base path with the request path, keep the query
//! - Strip hop-by-hop headers, add X-Forwarded-* headers
//! - Bound the backend round trip with the route's timeout
//!
//! # Design Decisions
//! - Each route owns its own client and connection pool
//! - The deadline covers connect, TLS handshake and response headers;
//!   the response body streams without buffering
//! - Backend timeouts result in 504 Gateway Timeout, any other upstream
//!   failure in 502 Bad Gateway

use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;

use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{header, HeaderMap, HeaderName, HeaderValue, Request, StatusCode, Uri, Version};
use axum::response::{IntoResponse, Response};
use hyper::body::Incoming;
use hyper_rustls::HttpsConnector;
use hyper_util::client::legacy::{connect::HttpConnector, Client};
use hyper_util::rt::TokioExecutor;
use url::{Position, Url};

/// HTTP(S) client bound to one policy's TLS configuration.
pub type UpstreamClient = Client<HttpsConnector<HttpConnector>, Body>;

const X_FORWARDED_FOR: &str = "x-forwarded-for";
const X_FORWARDED_HOST: &str = "x-forwarded-host";
const X_FORWARDED_PROTO: &str = "x-forwarded-proto";

/// Headers that only apply to a single transport hop.
const HOP_BY_HOP: &[&str] = &[
    "connection",
    "proxy-connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Build the client used to reach a backend.
pub fn build_client(tls: rustls::ClientConfig, connect_timeout: Duration) -> UpstreamClient {
    let mut http = HttpConnector::new();
    http.enforce_http(false);
    http.set_connect_timeout(Some(connect_timeout));

    let https = hyper_rustls::HttpsConnectorBuilder::new()
        .with_tls_config(tls)
        .https_or_http()
        .enable_http1()
        .enable_http2()
        .wrap_connector(http);

    Client::builder(TokioExecutor::new()).build(https)
}

/// Reverse proxy bound to a single backend URL.
#[derive(Clone)]
pub struct ReverseProxy {
    target: Url,
    authority: String,
    client: UpstreamClient,
    timeout: Duration,
    preserve_host: bool,
}

impl fmt::Debug for ReverseProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReverseProxy")
            .field("target", &self.target.as_str())
            .field("timeout", &self.timeout)
            .field("preserve_host", &self.preserve_host)
            .finish_non_exhaustive()
    }
}

impl ReverseProxy {
    pub fn new(target: Url, client: UpstreamClient, timeout: Duration, preserve_host: bool) -> Self {
        let authority = target[Position::BeforeHost..Position::AfterPort].to_string();
        Self {
            target,
            authority,
            client,
            timeout,
            preserve_host,
        }
    }

    /// Backend this proxy forwards to.
    pub fn target(&self) -> &Url {
        &self.target
    }

    /// Deadline for one backend round trip.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Forward `request` to the backend and return its response.
    pub async fn forward(&self, request: Request<Body>) -> Response {
        let (mut parts, body) = request.into_parts();

        let uri = match self.upstream_uri(&parts.uri) {
            Ok(uri) => uri,
            Err(e) => {
                tracing::error!(backend = %self.target, error = %e, "Failed to build upstream URI");
                return (StatusCode::INTERNAL_SERVER_ERROR, "Invalid upstream URI").into_response();
            }
        };

        let client_addr = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);
        let proto = forwarded_proto(&parts.uri).to_string();

        if !parts.headers.contains_key(header::HOST) {
            if let Some(host) = parts
                .uri
                .authority()
                .and_then(|a| HeaderValue::from_str(a.as_str()).ok())
            {
                parts.headers.insert(header::HOST, host);
            }
        }

        strip_hop_by_hop(&mut parts.headers);
        add_forwarded_headers(&mut parts.headers, client_addr, &proto);
        if !self.preserve_host {
            if let Ok(host) = HeaderValue::from_str(&self.authority) {
                parts.headers.insert(header::HOST, host);
            }
        }

        parts.uri = uri;
        parts.version = Version::HTTP_11;
        let upstream_request = Request::from_parts(parts, body);

        tracing::debug!(uri = %upstream_request.uri(), "Forwarding request upstream");

        match tokio::time::timeout(self.timeout, self.client.request(upstream_request)).await {
            Ok(Ok(response)) => downstream_response(response),
            Ok(Err(e)) => {
                tracing::warn!(backend = %self.target, error = %e, "Upstream error");
                (StatusCode::BAD_GATEWAY, "Upstream request failed").into_response()
            }
            Err(_) => {
                tracing::warn!(
                    backend = %self.target,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "Upstream timed out"
                );
                (StatusCode::GATEWAY_TIMEOUT, "Upstream request timed out").into_response()
            }
        }
    }

    /// Rewrite an inbound URI onto the backend.
    pub fn upstream_uri(&self, inbound: &Uri) -> Result<Uri, axum::http::uri::InvalidUri> {
        let path = join_paths(self.target.path(), inbound.path());
        let query = match (self.target.query(), inbound.query()) {
            (Some(a), Some(b)) if !a.is_empty() && !b.is_empty() => format!("?{}&{}", a, b),
            (Some(a), _) if !a.is_empty() => format!("?{}", a),
            (_, Some(b)) if !b.is_empty() => format!("?{}", b),
            _ => String::new(),
        };
        format!("{}://{}{}{}", self.target.scheme(), self.authority, path, query).parse()
    }
}

/// Scheme reported in `X-Forwarded-Proto`.
///
/// The listener speaks plain HTTP, so this is `http` unless the request
/// target itself names a scheme (HTTP/2 `:scheme`, absolute-form targets).
fn forwarded_proto(uri: &Uri) -> &str {
    uri.scheme_str().unwrap_or("http")
}

fn downstream_response(response: hyper::Response<Incoming>) -> Response {
    let (mut parts, body) = response.into_parts();
    strip_hop_by_hop(&mut parts.headers);
    Response::from_parts(parts, Body::new(body))
}

fn join_paths(base: &str, path: &str) -> String {
    match (base.ends_with('/'), path.starts_with('/')) {
        (true, true) => format!("{}{}", base, &path[1..]),
        (false, false) => format!("{}/{}", base, path),
        _ => format!("{}{}", base, path),
    }
}

fn strip_hop_by_hop(headers: &mut HeaderMap) {
    // Headers listed in Connection are hop-by-hop for this message only.
    let listed: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();

    for name in &listed {
        headers.remove(name);
    }
    for name in HOP_BY_HOP {
        headers.remove(*name);
    }
}

fn add_forwarded_headers(headers: &mut HeaderMap, client_addr: Option<SocketAddr>, proto: &str) {
    if let Some(addr) = client_addr {
        let ip = addr.ip().to_string();
        let value = match headers.get(X_FORWARDED_FOR).and_then(|v| v.to_str().ok()) {
            Some(prior) => format!("{}, {}", prior, ip),
            None => ip,
        };
        if let Ok(value) = HeaderValue::from_str(&value) {
            headers.insert(X_FORWARDED_FOR, value);
        }
    }

    if let Some(host) = headers.get(header::HOST).cloned() {
        headers.insert(X_FORWARDED_HOST, host);
    }
    if let Ok(proto) = HeaderValue::from_str(proto) {
        headers.insert(X_FORWARDED_PROTO, proto);
    }
}
