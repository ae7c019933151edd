//! Identity-aware reverse proxy library.
//!
//! Requests are routed by exact inbound host to the backend named by a
//! policy. Policies are compiled into an immutable route table that can be
//! replaced atomically while traffic is flowing.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod proxy;
pub mod routing;
pub mod tls;

#[cfg(test)]
mod testdata;

pub use config::schema::{Options, Policy, ProxyConfig};
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use proxy::{ProxyError, ProxyService};
