//! policy-proxy binary.
//!
//! ```text
//!   Client ──▶ HttpServer ──▶ ProxyService ──▶ RouteTable ──▶ RouteEntry ──▶ Backend
//!                                  ▲
//!                                  │ update_options (atomic swap)
//!                 ConfigWatcher / SIGHUP ──▶ load_config
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;

use policy_proxy::config::load_config;
use policy_proxy::config::watcher::{reload_into, ConfigWatcher};
use policy_proxy::lifecycle::{wait_for_signal, Shutdown, Signal};
use policy_proxy::observability::logging;
use policy_proxy::{HttpServer, ProxyService};

#[derive(Parser, Debug)]
#[command(name = "policy-proxy", version, about = "Identity-aware reverse proxy")]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "config/policy-proxy.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = load_config(&args.config)?;
    logging::init(&config.observability)?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = ?args.config,
        "policy-proxy starting"
    );

    let service = Arc::new(ProxyService::new(config.options.clone())?);

    let (watcher, config_updates) = ConfigWatcher::new(&args.config);
    let reload_tx = watcher.sender();
    let _watcher = watcher.run()?;

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    let server = HttpServer::new(service, config);
    let server_task = tokio::spawn(server.run(listener, config_updates, shutdown.subscribe()));

    loop {
        match wait_for_signal().await? {
            Signal::Reload => reload_into(&args.config, &reload_tx),
            Signal::Shutdown => break,
        }
    }

    shutdown.trigger();
    server_task.await??;

    tracing::info!("Shutdown complete");
    Ok(())
}
