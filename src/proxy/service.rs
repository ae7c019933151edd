//! The proxy service: live route table, construction and hot reload.
//!
//! # Responsibilities
//! - Validate options and build the first route table
//! - Rebuild and atomically install tables on reload
//! - Route and dispatch requests against the installed table
//!
//! # Design Decisions
//! - Table, options and signing key are installed together as one
//!   generation behind an `ArcSwap`; readers never lock
//! - Reloads are serialized by a mutex and build off to the side, so a
//!   failed reload leaves the previous generation serving
//! - A request holds only its own route entry across the backend round
//!   trip, never the table or any lock

use std::sync::{Arc, Mutex, PoisonError};

use arc_swap::ArcSwap;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::config::validation::{validate_options, ValidationErrors};
use crate::config::Options;
use crate::proxy::access::{AccessGate, AllowAll};
use crate::proxy::compiler::RouteEntry;
use crate::routing::{match_request, BuildErrors, RouteTable};
use crate::tls::material::{decode_signing_key, MaterialError, SigningKey};

/// Failure to construct or reload the service.
#[derive(Debug, Error)]
pub enum ProxyError {
    #[error(transparent)]
    InvalidOptions(#[from] ValidationErrors),

    #[error(transparent)]
    SigningKey(#[from] MaterialError),

    #[error(transparent)]
    Build(#[from] BuildErrors),
}

/// Everything built from one options snapshot.
#[derive(Debug)]
struct Generation {
    table: Arc<RouteTable>,
    options: Options,
    signing_key: Option<SigningKey>,
}

impl Generation {
    fn build(options: Options) -> Result<Self, ProxyError> {
        validate_options(&options)?;

        let signing_key = options
            .signing_key
            .as_deref()
            .map(decode_signing_key)
            .transpose()?;
        let table = RouteTable::build(&options.policies, options.default_upstream_timeout())?;

        Ok(Self {
            table: Arc::new(table),
            options,
            signing_key,
        })
    }
}

/// Process-wide proxy state shared by every connection.
#[derive(Debug)]
pub struct ProxyService {
    current: ArcSwap<Generation>,
    reload_lock: Mutex<()>,
    gate: Arc<dyn AccessGate>,
}

impl ProxyService {
    /// Validate `options`, build its route table and return a ready service.
    pub fn new(options: Options) -> Result<Self, ProxyError> {
        let generation = Generation::build(options)?;

        tracing::info!(
            routes = generation.table.len(),
            signing_key = generation.signing_key.is_some(),
            "Route table installed"
        );

        Ok(Self {
            current: ArcSwap::from_pointee(generation),
            reload_lock: Mutex::new(()),
            gate: Arc::new(AllowAll),
        })
    }

    /// Replace the access gate consulted for non-public routes.
    pub fn with_access_gate(mut self, gate: Arc<dyn AccessGate>) -> Self {
        self.gate = gate;
        self
    }

    /// Rebuild from `options` and install the result.
    ///
    /// On error the running table is untouched. Concurrent calls run one
    /// after another.
    pub fn update_options(&self, options: Options) -> Result<(), ProxyError> {
        let _guard = self
            .reload_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        match Generation::build(options) {
            Ok(generation) => {
                let routes = generation.table.len();
                self.current.store(Arc::new(generation));
                tracing::info!(routes, "Route table reloaded");
                Ok(())
            }
            Err(e) => {
                tracing::error!(error = %e, "Reload rejected; keeping current route table");
                Err(e)
            }
        }
    }

    /// Find the route for `req` in the installed table.
    pub fn route<B>(&self, req: &Request<B>) -> Option<Arc<RouteEntry>> {
        match_request(&self.current.load().table, req)
    }

    /// Route `req` and forward it, or answer 404 when no route matches.
    pub async fn handle(&self, req: Request<Body>) -> Response {
        let Some(route) = self.route(&req) else {
            tracing::debug!(
                host = ?req.headers().get(axum::http::header::HOST),
                path = %req.uri().path(),
                "No route matched"
            );
            return (StatusCode::NOT_FOUND, "No matching route found").into_response();
        };

        if !route.bypasses_access_gate(&req) {
            if let Err(denied) = self.gate.check(&req, &route) {
                tracing::debug!(host = %route.host(), status = %denied.status(), "Access gate denied request");
                return denied;
            }
        }

        route.forward(req).await
    }

    /// The installed table. Holding it pins that generation's routes.
    pub fn table(&self) -> Arc<RouteTable> {
        Arc::clone(&self.current.load().table)
    }

    /// Options the installed table was built from.
    pub fn options(&self) -> Options {
        self.current.load().options.clone()
    }

    /// Parsed signing key of the installed generation.
    pub fn signing_key(&self) -> Option<SigningKey> {
        self.current.load().signing_key.clone()
    }
}
