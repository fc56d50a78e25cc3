//! Startup orchestration.
//!
//! # Responsibilities
//! - Create the shared routing table
//! - Start the metrics exporter when enabled
//! - Load TLS material and bind both listeners
//! - Spawn the data plane and control API side by side
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Listeners start last (traffic only when ready)

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::admin::ControlServer;
use crate::config::ProxyConfig;
use crate::error::ProxyError;
use crate::http::ProxyServer;
use crate::lifecycle::Shutdown;
use crate::net::{bind, load_tls_config, ListenerError};
use crate::observability::metrics;
use crate::routing::RouteTable;

/// Handle to a started proxy.
#[derive(Debug)]
pub struct RunningProxy {
    /// The table shared by both listeners.
    pub routes: Arc<RouteTable>,
    /// Bound address of the public listener.
    pub proxy_addr: SocketAddr,
    /// Bound address of the control API.
    pub api_addr: SocketAddr,
    task: JoinHandle<Result<(), std::io::Error>>,
}

impl RunningProxy {
    /// Wait until both listeners have stopped.
    pub async fn wait(self) -> Result<(), ProxyError> {
        self.task.await??;
        Ok(())
    }
}

/// Bind both listeners and start serving. Returns once traffic is accepted.
pub async fn start(config: ProxyConfig, shutdown: &Shutdown) -> Result<RunningProxy, ProxyError> {
    let routes = Arc::new(RouteTable::new());

    if config.observability.metrics_enabled {
        let address = &config.observability.metrics_address;
        let addr = address.parse().map_err(|source| ListenerError::Address {
            address: address.clone(),
            source,
        })?;
        metrics::init_metrics(addr)?;
        metrics::set_route_count(0);
    }

    let tls = match &config.listener.tls {
        Some(tls) => Some(load_tls_config(tls).await?),
        None => None,
    };

    let proxy_listener = bind(&config.listener.bind_address).await?;
    let api_listener = bind(&config.api.bind_address).await?;
    let proxy_addr = proxy_listener.local_addr()?;
    let api_addr = api_listener.local_addr()?;

    let proxy = ProxyServer::new(&config, Arc::clone(&routes), tls)?;
    let control = ControlServer::new(&config.api, Arc::clone(&routes));

    if config.api.auth_token.is_none() {
        tracing::warn!(
            address = %api_addr,
            "No control API token configured; route API is unauthenticated"
        );
    }

    tracing::info!(
        proxy = %proxy_addr,
        api = %api_addr,
        default_target = config.default_target.as_deref().unwrap_or("<none>"),
        "Route proxy started"
    );

    let proxy_shutdown = shutdown.subscribe();
    let api_shutdown = shutdown.subscribe();
    let task = tokio::spawn(async move {
        tokio::try_join!(
            proxy.run(proxy_listener, proxy_shutdown),
            control.run(api_listener, api_shutdown),
        )?;
        Ok::<(), std::io::Error>(())
    });

    Ok(RunningProxy {
        routes,
        proxy_addr,
        api_addr,
        task,
    })
}
