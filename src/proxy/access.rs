//! Access gate seam.
//!
//! The session and authorization subsystems live outside this crate. They
//! plug in here: the service asks the gate before forwarding any request
//! whose route does not allow public access or a CORS preflight bypass.

use std::fmt;

use axum::body::Body;
use axum::http::Request;
use axum::response::Response;

use crate::proxy::compiler::RouteEntry;

/// Decides whether a routed request may reach its backend.
pub trait AccessGate: Send + Sync + fmt::Debug {
    /// `Ok(())` admits the request; `Err` carries the response to send instead.
    fn check(&self, req: &Request<Body>, route: &RouteEntry) -> Result<(), Response>;
}

/// Admits everything. Used when no gate is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct AllowAll;

impl AccessGate for AllowAll {
    fn check(&self, _req: &Request<Body>, _route: &RouteEntry) -> Result<(), Response> {
        Ok(())
    }
}
