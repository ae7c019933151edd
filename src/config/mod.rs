//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (URLs, secrets, signing key, policies)
//!     → ProxyConfig (validated, immutable)
//!     → Options handed to the proxy service
//!
//! On reload signal:
//!     watcher.rs detects change (or SIGHUP)
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → proxy service rebuilds its route table off to the side
//!     → atomic swap of the live table
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require full reload
//! - Secrets and URLs stay strings until validation decodes them
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, ConfigError};
pub use schema::{ListenerConfig, ObservabilityConfig, Options, Policy, ProxyConfig};
pub use validation::{validate_options, validate_policy, ValidationError, ValidationErrors};
