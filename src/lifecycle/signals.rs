//! OS signal handling.
//!
//! # Responsibilities
//! - Register signal handlers (SIGTERM, SIGINT, SIGHUP)
//! - Translate signals to internal events
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe)
//! - SIGHUP triggers config reload, not shutdown
//! - Non-unix targets only see Ctrl+C

/// What the process should do in response to a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Shutdown,
    Reload,
}

/// Wait for the next signal of interest.
#[cfg(unix)]
pub async fn wait_for_signal() -> std::io::Result<Signal> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = signal(SignalKind::terminate())?;
    let mut hangup = signal(SignalKind::hangup())?;

    let received = tokio::select! {
        res = tokio::signal::ctrl_c() => {
            res?;
            tracing::info!("SIGINT received");
            Signal::Shutdown
        }
        _ = terminate.recv() => {
            tracing::info!("SIGTERM received");
            Signal::Shutdown
        }
        _ = hangup.recv() => {
            tracing::info!("SIGHUP received");
            Signal::Reload
        }
    };
    Ok(received)
}

/// Wait for the next signal of interest.
#[cfg(not(unix))]
pub async fn wait_for_signal() -> std::io::Result<Signal> {
    tokio::signal::ctrl_c().await?;
    tracing::info!("Ctrl+C received");
    Ok(Signal::Shutdown)
}
