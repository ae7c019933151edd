//! Host key normalization.
//!
//! Policy hosts and request hosts are reduced to the same shape before
//! comparison: lowercase host, followed by `:port` only when the port is
//! not 80 or 443. Nothing else is folded; matching stays exact.

use axum::http::uri::Authority;
use axum::http::{header, Request};
use url::Url;

fn is_default_port(port: u16) -> bool {
    port == 80 || port == 443
}

fn join(host: &str, port: Option<u16>) -> String {
    let host = host.to_ascii_lowercase();
    match port {
        Some(port) if !is_default_port(port) => format!("{}:{}", host, port),
        _ => host,
    }
}

/// The route key for a policy's `from` URL.
pub fn route_key(url: &Url) -> Option<String> {
    let host = url.host_str().filter(|h| !h.is_empty())?;
    Some(join(host, url.port()))
}

/// Normalize a raw `host[:port]` value.
pub fn normalize_authority(raw: &str) -> Option<String> {
    let authority: Authority = raw.trim().parse().ok()?;
    if authority.host().is_empty() {
        return None;
    }
    Some(join(authority.host(), authority.port_u16()))
}

/// The route key for an inbound request.
///
/// Uses the `Host` header, falling back to the URI authority (HTTP/2
/// requests carry `:authority` instead).
pub fn request_host<B>(req: &Request<B>) -> Option<String> {
    if let Some(value) = req.headers().get(header::HOST) {
        return value.to_str().ok().and_then(normalize_authority);
    }
    req.uri()
        .authority()
        .and_then(|authority| normalize_authority(authority.as_str()))
}
