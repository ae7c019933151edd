//! Proxy subsystem.
//!
//! # Data Flow
//! ```text
//! Options
//!     → service.rs (validate, then build a generation)
//!     → compiler.rs (Policy → RouteEntry, one TLS client each)
//!     → routing::table (RouteTable)
//!     → ArcSwap install
//!
//! Request
//!     → service.rs (route lookup against the installed table)
//!     → access.rs (gate, unless the route bypasses it)
//!     → forward.rs (rewrite, forward with timeout)
//!     → Response (backend's, 404, 502 or 504)
//! ```

pub mod access;
pub mod compiler;
pub mod forward;
pub mod service;

pub use access::{AccessGate, AllowAll};
pub use compiler::{compile_policy, CompileError, RouteEntry};
pub use forward::ReverseProxy;
pub use service::{ProxyError, ProxyService};
