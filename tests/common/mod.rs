//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::Request;
use axum::response::Response;
use axum::Router;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use hyper::body::Incoming;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use rustls::pki_types::CertificateDer;
use rustls::server::WebPkiClientVerifier;
use rustls::{RootCertStore, ServerConfig};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_rustls::TlsAcceptor;

use policy_proxy::config::{Options, Policy, ProxyConfig};
use policy_proxy::{HttpServer, ProxyService, Shutdown};

pub const COOKIE_SECRET: &str = "OromP1gurwGWjQPYb1nNgSxtbVB5NnLzX6z5WOKr0Yw=";
pub const SHARED_SECRET: &str = "80ldlrU2d7w+wVpKNfevk6fmb8otEx6CqOfshj2LwhQ=";

pub fn signing_key() -> &'static str {
    include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/testdata/signing_key.b64")).trim()
}

/// Test CA issuing both TLS fixtures below.
pub const TLS_CA: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/testdata/tls/ca.pem"));
/// Backend certificate for `127.0.0.1` / `localhost`.
pub const TLS_SERVER_CERT: &str =
    include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/testdata/tls/server.pem"));
pub const TLS_SERVER_KEY: &str =
    include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/testdata/tls/server.key"));
/// Client certificate accepted by backends that require mutual TLS.
pub const TLS_CLIENT_CERT: &str =
    include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/testdata/tls/client.pem"));
pub const TLS_CLIENT_KEY: &str =
    include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/testdata/tls/client.key"));

/// Base64 of a PEM fixture, the form policies carry.
pub fn b64(pem: &str) -> String {
    STANDARD.encode(pem)
}

fn pem_certs(pem: &str) -> Vec<CertificateDer<'static>> {
    rustls_pemfile::certs(&mut pem.as_bytes())
        .collect::<Result<Vec<_>, _>>()
        .unwrap()
}

/// Valid options routing according to `policies`.
pub fn options(policies: Vec<Policy>) -> Options {
    Options {
        authenticate_url: "https://authenticate.corp.example".to_string(),
        authorize_url: "https://authorize.corp.example".to_string(),
        cookie_secret: COOKIE_SECRET.to_string(),
        shared_secret: SHARED_SECRET.to_string(),
        policies,
        ..Options::default()
    }
}

/// Policy routing `host` to a plain-HTTP backend at `backend`.
pub fn policy(host: &str, backend: SocketAddr) -> Policy {
    Policy::new(format!("https://{}", host), format!("http://{}", backend))
}

async fn serve(router: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });
    addr
}

/// Start a backend that describes the request it received.
///
/// The body is one `key=value` line each for the backend name, the Host
/// header, the request URI, X-Forwarded-For and X-Forwarded-Proto.
pub async fn start_echo_backend(name: &'static str) -> SocketAddr {
    let router = Router::new().fallback(move |req: Request<Body>| async move {
        let header = |key: &str| {
            req.headers()
                .get(key)
                .and_then(|v| v.to_str().ok())
                .unwrap_or("")
                .to_string()
        };
        format!(
            "backend={}\nhost={}\nuri={}\nxff={}\nproto={}\n",
            name,
            header("host"),
            req.uri(),
            header("x-forwarded-for"),
            header("x-forwarded-proto"),
        )
    });
    serve(router).await
}

/// Start an HTTPS backend presenting the test server certificate.
///
/// With `require_client_cert` the handshake only succeeds for clients
/// presenting a certificate issued by the test CA. The body reports
/// whether the client sent one: `tls client_cert=true|false`.
pub async fn start_tls_backend(require_client_cert: bool) -> SocketAddr {
    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let key = rustls_pemfile::private_key(&mut TLS_SERVER_KEY.as_bytes())
        .unwrap()
        .unwrap();

    let builder = ServerConfig::builder_with_provider(Arc::clone(&provider))
        .with_safe_default_protocol_versions()
        .unwrap();
    let builder = if require_client_cert {
        let mut roots = RootCertStore::empty();
        for cert in pem_certs(TLS_CA) {
            roots.add(cert).unwrap();
        }
        let verifier = WebPkiClientVerifier::builder_with_provider(Arc::new(roots), provider)
            .build()
            .unwrap();
        builder.with_client_cert_verifier(verifier)
    } else {
        builder.with_no_client_auth()
    };
    let config = builder
        .with_single_cert(pem_certs(TLS_SERVER_CERT), key)
        .unwrap();
    let acceptor = TlsAcceptor::from(Arc::new(config));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let acceptor = acceptor.clone();
            tokio::spawn(async move {
                let Ok(tls) = acceptor.accept(stream).await else {
                    return;
                };
                let client_cert = tls
                    .get_ref()
                    .1
                    .peer_certificates()
                    .is_some_and(|certs| !certs.is_empty());
                let service = service_fn(move |_req: Request<Incoming>| async move {
                    let body = format!("tls client_cert={}", client_cert);
                    Ok::<_, Infallible>(Response::new(Body::from(body)))
                });
                let _ = hyper::server::conn::http1::Builder::new()
                    .serve_connection(TokioIo::new(tls), service)
                    .await;
            });
        }
    });
    addr
}

/// Start a backend that waits `delay` before answering.
pub async fn start_slow_backend(delay: Duration) -> SocketAddr {
    let router = Router::new().fallback(move || async move {
        tokio::time::sleep(delay).await;
        "slow"
    });
    serve(router).await
}

/// An address nothing is listening on.
pub async fn unused_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

pub fn request(host: &str, path: &str) -> Request<Body> {
    Request::builder()
        .uri(path)
        .header("Host", host)
        .body(Body::empty())
        .unwrap()
}

pub async fn body_string(response: Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

/// A running proxy server on an ephemeral port.
pub struct RunningProxy {
    pub addr: SocketAddr,
    pub service: Arc<ProxyService>,
    pub updates: mpsc::UnboundedSender<ProxyConfig>,
    pub shutdown: Shutdown,
    pub task: tokio::task::JoinHandle<Result<(), std::io::Error>>,
}

pub async fn start_proxy(options: Options) -> RunningProxy {
    let config = ProxyConfig {
        options: options.clone(),
        ..ProxyConfig::default()
    };
    let service = Arc::new(ProxyService::new(options).unwrap());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (updates, config_updates) = mpsc::unbounded_channel();
    let shutdown = Shutdown::new();

    let server = HttpServer::new(Arc::clone(&service), config);
    let task = tokio::spawn(server.run(listener, config_updates, shutdown.subscribe()));

    RunningProxy {
        addr,
        service,
        updates,
        shutdown,
        task,
    }
}

pub fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}
