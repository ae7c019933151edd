//! Route table construction.
//!
//! # Responsibilities
//! - Compile every policy of a snapshot
//! - Key compiled entries by normalized `from` host
//! - Reject ambiguous (duplicate) hosts
//!
//! # Design Decisions
//! - All-or-nothing: any failure discards the whole table
//! - Every failure is collected so one bad policy does not hide another
//! - The table is never mutated after build; reload replaces it wholesale

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::config::Policy;
use crate::proxy::compiler::{compile_policy, CompileError, RouteEntry};

/// A problem found while building a table.
#[derive(Debug, Error)]
pub enum TableError {
    #[error("policies[{index}] ({from}): {source}")]
    Compile {
        index: usize,
        from: String,
        #[source]
        source: CompileError,
    },

    #[error("policies[{second}]: host {host:?} is already routed by policies[{first}]")]
    DuplicateHost {
        host: String,
        first: usize,
        second: usize,
    },
}

/// Every failure from one build attempt.
#[derive(Debug)]
pub struct BuildErrors(pub Vec<TableError>);

impl BuildErrors {
    pub fn iter(&self) -> impl Iterator<Item = &TableError> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for BuildErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Route table build failed: ")?;
        for (i, err) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", err)?;
        }
        Ok(())
    }
}

impl std::error::Error for BuildErrors {}

/// Immutable mapping from inbound host to compiled route.
#[derive(Debug, Default)]
pub struct RouteTable {
    routes: HashMap<String, Arc<RouteEntry>>,
}

impl RouteTable {
    /// Compile `policies` into a table, or report every failure.
    pub fn build(policies: &[Policy], default_timeout: Duration) -> Result<Self, BuildErrors> {
        let mut routes = HashMap::with_capacity(policies.len());
        let mut owners: HashMap<String, usize> = HashMap::with_capacity(policies.len());
        let mut errors = Vec::new();

        for (index, policy) in policies.iter().enumerate() {
            let entry = match compile_policy(policy, default_timeout) {
                Ok(entry) => entry,
                Err(source) => {
                    errors.push(TableError::Compile {
                        index,
                        from: policy.from.clone(),
                        source,
                    });
                    continue;
                }
            };

            let host = entry.host().to_string();
            if let Some(&first) = owners.get(&host) {
                errors.push(TableError::DuplicateHost {
                    host,
                    first,
                    second: index,
                });
                continue;
            }
            owners.insert(host.clone(), index);
            routes.insert(host, Arc::new(entry));
        }

        if !errors.is_empty() {
            return Err(BuildErrors(errors));
        }
        Ok(Self { routes })
    }

    /// Exact lookup of a normalized host.
    pub fn get(&self, host: &str) -> Option<&Arc<RouteEntry>> {
        self.routes.get(host)
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Routed hosts, in no particular order.
    pub fn hosts(&self) -> impl Iterator<Item = &str> {
        self.routes.keys().map(String::as_str)
    }
}
