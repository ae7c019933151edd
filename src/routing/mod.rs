//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (Host header or :authority)
//!     → host.rs (normalize host key)
//!     → router.rs (route lookup)
//!     → Return: matched RouteEntry or NoMatch
//!
//! Route Compilation (startup and every reload):
//!     Policy[]
//!     → proxy::compiler (one RouteEntry per policy)
//!     → table.rs (key by host, reject duplicates)
//!     → Freeze as immutable RouteTable
//! ```
//!
//! # Design Decisions
//! - Routes compiled off the hot path, immutable at runtime
//! - Deterministic: same input always matches same route
//! - Host is the only routing dimension

pub mod host;
pub mod router;
pub mod table;

pub use router::match_request;
pub use table::{BuildErrors, RouteTable, TableError};
