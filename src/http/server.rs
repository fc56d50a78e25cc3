//! Data-plane HTTP server.
//!
//! # Responsibilities
//! - Create Axum Router with the catch-all proxy handler
//! - Wire up middleware (tracing, request ID, panic isolation)
//! - Serve plain HTTP or TLS on the public listener
//! - Resolve each request against the routing table and dispatch it

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::Body,
    extract::{ConnectInfo, FromRequestParts, State},
    extract::ws::WebSocketUpgrade,
    http::Request,
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use axum_server::tls_rustls::RustlsConfig;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{
    catch_panic::CatchPanicLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::config::ProxyConfig;
use crate::http::forward::{forward_http, Upstream};
use crate::http::request::{is_websocket_upgrade, RequestRewriter};
use crate::http::response::no_route;
use crate::http::websocket::forward_websocket;
use crate::lifecycle::shutdown::wait_for;
use crate::observability::metrics;
use crate::routing::{RouteTable, Target, TargetError};

/// Application state injected into the proxy handler.
#[derive(Clone)]
pub struct ProxyState {
    pub routes: Arc<RouteTable>,
    pub default_target: Option<Target>,
    pub client: Client<HttpConnector, Body>,
    pub rewriter: Arc<RequestRewriter>,
}

/// HTTP server for the data plane.
pub struct ProxyServer {
    router: Router,
    tls: Option<RustlsConfig>,
}

impl ProxyServer {
    /// Create the data-plane server sharing `routes` with the control API.
    pub fn new(
        config: &ProxyConfig,
        routes: Arc<RouteTable>,
        tls: Option<RustlsConfig>,
    ) -> Result<Self, TargetError> {
        let default_target = config
            .default_target
            .as_deref()
            .map(Target::parse)
            .transpose()?;

        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());

        let state = ProxyState {
            routes,
            default_target,
            client,
            rewriter: Arc::new(RequestRewriter::new(&config.forwarding, tls.is_some())),
        };

        Ok(Self {
            router: Self::build_router(state),
            tls,
        })
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(state: ProxyState) -> Router {
        Router::new()
            .route("/", any(proxy_handler))
            .route("/{*path}", any(proxy_handler))
            .with_state(state)
            .layer(CatchPanicLayer::new())
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    /// Serve on `listener` until `shutdown` fires, then drain.
    pub async fn run(
        self,
        listener: TcpListener,
        shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        let app = self
            .router
            .into_make_service_with_connect_info::<SocketAddr>();

        match self.tls {
            None => {
                tracing::info!(address = %addr, "Proxy listening (http)");
                axum::serve(listener, app)
                    .with_graceful_shutdown(wait_for(shutdown))
                    .await?;
            }
            Some(tls) => {
                tracing::info!(address = %addr, "Proxy listening (https)");
                let handle = axum_server::Handle::new();
                let stopper = handle.clone();
                tokio::spawn(async move {
                    wait_for(shutdown).await;
                    stopper.graceful_shutdown(None);
                });
                axum_server::from_tcp_rustls(listener.into_std()?, tls)
                    .handle(handle)
                    .serve(app)
                    .await?;
            }
        }

        tracing::info!("Proxy listener stopped");
        Ok(())
    }
}

/// Resolve the route, record activity and hand off to the forwarder.
async fn proxy_handler(
    State(state): State<ProxyState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    request: Request<Body>,
) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    let upstream = match state.routes.resolve(&path) {
        Some(resolved) => {
            let activity = state.routes.activity(resolved.prefix.as_str());
            activity.touch();
            Upstream {
                target: resolved.target,
                prefix: Some(resolved.prefix),
                activity: Some(activity),
            }
        }
        None => match &state.default_target {
            Some(target) => Upstream {
                target: target.clone(),
                prefix: None,
                activity: None,
            },
            None => {
                tracing::debug!(method = %method, path = %path, "No route and no default target");
                metrics::record_request(method.as_str(), 404, false, start);
                return no_route();
            }
        },
    };
    let routed = upstream.prefix.is_some();

    tracing::debug!(
        method = %method,
        path = %path,
        prefix = upstream.prefix.as_deref().unwrap_or("/"),
        upstream = %upstream.target,
        "Proxying request"
    );

    let response = if is_websocket_upgrade(request.headers()) {
        let (mut parts, _body) = request.into_parts();
        match WebSocketUpgrade::from_request_parts(&mut parts, &state).await {
            Ok(upgrade) => forward_websocket(&state, upgrade, &parts, peer, upstream).await,
            Err(rejection) => rejection.into_response(),
        }
    } else {
        forward_http(&state, request, peer, upstream).await
    };

    metrics::record_request(method.as_str(), response.status().as_u16(), routed, start);
    response
}
