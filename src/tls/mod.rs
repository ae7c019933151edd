//! TLS material and outbound TLS configuration.
//!
//! # Data Flow
//! ```text
//! Policy (base64 PEM strings, skip-verify flag)
//!     → material.rs (base64 → PEM → DER certificates / keys)
//!     → client.rs (trust roots + client auth → rustls::ClientConfig)
//!     → verifier.rs (only when verification is disabled)
//!     → handed to the policy's HTTPS connector
//! ```
//!
//! # Design Decisions
//! - rustls with the ring provider, selected explicitly per config
//! - Every policy gets its own ClientConfig; nothing is shared across routes
//! - Decoding is a validation boundary: typed errors, never panics

pub mod client;
pub mod material;
pub mod verifier;

pub use client::{build_client_config, TlsError};
pub use material::{MaterialError, SigningKey};
