//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;

use axum::{
    extract::ws::{Message, WebSocket, WebSocketUpgrade},
    http::{HeaderMap, Method, Uri},
    response::Response,
    Json, Router,
};
use route_proxy::config::ProxyConfig;
use route_proxy::{start, RunningProxy, Shutdown};
use route_proxy_sdk::ControlClient;
use serde_json::{json, Value};
use tokio::net::TcpListener;

pub const TOKEN: &str = "test-token";

/// A running proxy plus its shutdown handle. Dropping it stops both listeners.
pub struct TestProxy {
    pub running: RunningProxy,
    pub shutdown: Shutdown,
}

impl TestProxy {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.running.proxy_addr, path)
    }

    pub fn ws_url(&self, path: &str) -> String {
        format!("ws://{}{}", self.running.proxy_addr, path)
    }

    pub fn api_url(&self) -> String {
        format!("http://{}", self.running.api_addr)
    }

    pub fn control(&self) -> ControlClient {
        ControlClient::new(&self.api_url(), Some(TOKEN.to_string()))
    }
}

impl Drop for TestProxy {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

/// Config with both listeners on ephemeral loopback ports and a token set.
pub fn test_config() -> ProxyConfig {
    let mut config = ProxyConfig::default();
    config.listener.bind_address = "127.0.0.1:0".into();
    config.api.bind_address = "127.0.0.1:0".into();
    config.api.auth_token = Some(TOKEN.into());
    config
}

pub async fn start_proxy(config: ProxyConfig) -> TestProxy {
    let shutdown = Shutdown::new();
    let running = start(config, &shutdown).await.unwrap();
    TestProxy { running, shutdown }
}

async fn echo_request(method: Method, uri: Uri, headers: HeaderMap) -> Json<Value> {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned)
    };
    Json(json!({
        "method": method.as_str(),
        "uri": uri.to_string(),
        "host": header("host"),
        "x_forwarded_for": header("x-forwarded-for"),
        "x_forwarded_proto": header("x-forwarded-proto"),
        "connection": header("connection"),
        "custom": header("x-custom"),
    }))
}

/// HTTP backend that answers every request with a JSON description of it,
/// tagged with `name`.
pub async fn start_echo_backend(name: &'static str) -> SocketAddr {
    let app = Router::new().fallback(move |method: Method, uri: Uri, headers: HeaderMap| async move {
        let Json(mut body) = echo_request(method, uri, headers).await;
        body["backend"] = json!(name);
        Json(body)
    });
    serve(app).await
}

async fn echo_socket(mut socket: WebSocket, path: String) {
    if socket.send(Message::Text(format!("path {}", path).into())).await.is_err() {
        return;
    }
    while let Some(Ok(message)) = socket.recv().await {
        let reply = match message {
            Message::Text(text) => Message::Text(format!("echo: {}", text.as_str()).into()),
            Message::Binary(data) => Message::Binary(data),
            Message::Close(_) => break,
            _ => continue,
        };
        if socket.send(reply).await.is_err() {
            break;
        }
    }
}

/// WebSocket backend: greets with the requested path, then echoes.
/// Accepts the `echo-protocol` subprotocol when offered.
pub async fn start_ws_backend() -> SocketAddr {
    let app = Router::new().fallback(|ws: WebSocketUpgrade, uri: Uri| async move {
        let path = uri.path().to_string();
        let response: Response = ws
            .protocols(["echo-protocol"])
            .on_upgrade(move |socket| echo_socket(socket, path));
        response
    });
    serve(app).await
}

async fn serve(app: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

/// WebSocket backend with no subprotocol support: it accepts every
/// upgrade and never selects a protocol, even when one is offered.
pub async fn start_plain_ws_backend() -> SocketAddr {
    let app = Router::new().fallback(|ws: WebSocketUpgrade, uri: Uri| async move {
        let path = uri.path().to_string();
        let response: Response = ws.on_upgrade(move |socket| echo_socket(socket, path));
        response
    });
    serve(app).await
}

/// An address nothing listens on.
pub async fn unreachable_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}
