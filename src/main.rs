//! Route proxy binary.
//!
//! ```text
//!                       ┌──────────────────────────────────────────┐
//!   Client ────────────▶│ public listener ──▶ RouteTable.resolve   │──▶ Backend
//!                       │        │                  ▲              │
//!                       │        └─ touch activity ─┤              │
//!   Hub ───────────────▶│ control API ──── add / remove / list     │
//!                       └──────────────────────────────────────────┘
//! ```

use clap::Parser;

use route_proxy::config::{cli::Cli, ObservabilityConfig};
use route_proxy::lifecycle::{self, signals::wait_for_signal, Shutdown};
use route_proxy::observability::logging::init_logging;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = match Cli::parse().into_config() {
        Ok(config) => config,
        Err(e) => {
            // No configured level yet; fall back to the default one.
            init_logging(&ObservabilityConfig::default().log_level);
            tracing::error!(error = %e, "Invalid configuration");
            return Err(e.into());
        }
    };

    init_logging(&config.observability.log_level);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "route-proxy starting");

    let shutdown = Shutdown::new();
    let running = lifecycle::start(config, &shutdown)
        .await
        .inspect_err(|e| tracing::error!(error = %e, "Startup failed"))?;

    let trigger = shutdown.clone();
    tokio::spawn(async move {
        wait_for_signal().await;
        trigger.trigger();
    });

    running
        .wait()
        .await
        .inspect_err(|e| tracing::error!(error = %e, "Proxy stopped with an error"))?;
    tracing::info!("Shutdown complete");
    Ok(())
}
