//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, tracing, in-flight limit)
//!     → proxy::ProxyService::handle (route, gate, forward)
//!     → Send to client
//! ```

pub mod server;

pub use server::{AppState, HttpServer};
