//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router whose fallback hands every request to the proxy service
//! - Configure HTTP/1.1 and HTTP/2 support
//! - Wire up middleware (request ID, tracing)
//! - Bound requests in flight (backpressure)
//! - Apply configuration updates to the running service
//! - Serve until the shutdown signal fires, then drain

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    response::{IntoResponse, Response},
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc, Semaphore};
use tower::ServiceBuilder;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::config::ProxyConfig;
use crate::proxy::ProxyService;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<ProxyService>,
    /// Bounds requests in flight to `listener.max_connections`.
    pub in_flight: Arc<Semaphore>,
}

/// HTTP server for the reverse proxy.
pub struct HttpServer {
    router: Router,
    service: Arc<ProxyService>,
    config: ProxyConfig,
}

impl HttpServer {
    /// Create a new HTTP server around an already-built proxy service.
    pub fn new(service: Arc<ProxyService>, config: ProxyConfig) -> Self {
        let permits = config
            .listener
            .max_connections
            .clamp(1, Semaphore::MAX_PERMITS);
        let state = AppState {
            service: Arc::clone(&service),
            in_flight: Arc::new(Semaphore::new(permits)),
        };
        let router = Self::build_router(state);
        Self {
            router,
            service,
            config,
        }
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(state: AppState) -> Router {
        Router::new()
            .fallback(proxy_handler)
            .with_state(state)
            .layer(
                ServiceBuilder::new()
                    .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                    .layer(TraceLayer::new_for_http())
                    .layer(PropagateRequestIdLayer::x_request_id()),
            )
    }

    /// Run the server, accepting connections on the given listener.
    ///
    /// Each configuration received on `config_updates` is applied through
    /// [`ProxyService::update_options`]; a rejected one leaves the running
    /// table in place.
    pub async fn run(
        self,
        listener: TcpListener,
        mut config_updates: mpsc::UnboundedReceiver<ProxyConfig>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            routes = self.service.table().len(),
            max_in_flight = self.config.listener.max_connections,
            "HTTP server starting"
        );

        let service = Arc::clone(&self.service);
        let reloader = tokio::spawn(async move {
            while let Some(config) = config_updates.recv().await {
                let service = Arc::clone(&service);
                // Table builds load trust stores from disk.
                let applied =
                    tokio::task::spawn_blocking(move || service.update_options(config.options))
                        .await;
                if let Err(e) = applied {
                    tracing::error!(error = %e, "Reload task failed");
                }
            }
        });

        let app = self
            .router
            .into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received, draining connections");
            })
            .await?;

        reloader.abort();
        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// The proxy service this server dispatches to.
    pub fn service(&self) -> &Arc<ProxyService> {
        &self.service
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }
}

/// Every request, whatever its path or method, goes to the proxy service.
async fn proxy_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    // Waits for a slot when the limit is reached.
    let Ok(_permit) = state.in_flight.acquire().await else {
        return (StatusCode::SERVICE_UNAVAILABLE, "Server shutting down").into_response();
    };
    state.service.handle(request).await
}
