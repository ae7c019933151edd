//! Route lookup and dispatch.
//!
//! # Responsibilities
//! - Derive the request's host key
//! - Look up the matching compiled route
//! - Return matched route or explicit no-match
//!
//! # Design Decisions
//! - Immutable table (thread-safe without locks)
//! - O(1) host lookup via HashMap
//! - Exact host equality; no wildcard, prefix or suffix matching
//! - Explicit NoMatch (None) rather than silent default

use std::sync::Arc;

use axum::http::Request;

use crate::proxy::compiler::RouteEntry;
use crate::routing::host::request_host;
use crate::routing::table::RouteTable;

/// Find the entry routing `req`, if any.
pub fn match_request<B>(table: &RouteTable, req: &Request<B>) -> Option<Arc<RouteEntry>> {
    let host = request_host(req)?;
    table.get(&host).cloned()
}
