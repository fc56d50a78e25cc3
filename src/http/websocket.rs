//! WebSocket proxy handling.
//!
//! # Responsibilities
//! - Open the backend WebSocket before accepting the client upgrade
//! - Forward handshake headers (Host, subprotocols, cookies, auth, origin)
//! - Relay the backend's subprotocol choice, including none, to the client
//! - Bidirectional frame forwarding, touching route activity per frame
//!
//! # Data Flow
//! ```text
//! Client ←──── WebSocket frames ────→ Proxy ←──── WebSocket frames ────→ Backend
//! ```
//!
//! # Design Decisions
//! - A failed backend handshake is a 502; the client is never upgraded
//! - Frame-level forwarding (no message buffering)
//! - When either side ends, both sockets are dropped together

use std::net::SocketAddr;

use axum::{
    body::Body,
    extract::ws::{self, WebSocket, WebSocketUpgrade},
    http::{
        header,
        header::InvalidHeaderValue,
        request::Parts,
        uri::InvalidUri,
        HeaderMap, HeaderName, HeaderValue, Request, StatusCode,
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use hyper::upgrade::Upgraded;
use hyper_util::rt::TokioIo;
use tokio_tungstenite::{
    tungstenite::{
        self,
        handshake::{client::generate_key, derive_accept_key},
        protocol::{frame::coding::CloseCode, CloseFrame, Role},
    },
    WebSocketStream,
};
use uuid::Uuid;

use crate::http::forward::Upstream;
use crate::http::response::bad_gateway;
use crate::http::server::ProxyState;
use crate::observability::metrics;

type BackendSocket = WebSocketStream<TokioIo<Upgraded>>;

/// Headers the proxy sets itself on the backend handshake.
const HANDSHAKE_OWNED: [HeaderName; 11] = [
    header::CONNECTION,
    HeaderName::from_static("keep-alive"),
    header::TE,
    header::PROXY_AUTHORIZATION,
    header::UPGRADE,
    header::SEC_WEBSOCKET_KEY,
    header::SEC_WEBSOCKET_VERSION,
    header::SEC_WEBSOCKET_EXTENSIONS,
    header::SEC_WEBSOCKET_ACCEPT,
    header::CONTENT_LENGTH,
    header::TRANSFER_ENCODING,
];

/// Why the backend handshake failed.
#[derive(Debug, thiserror::Error)]
enum HandshakeError {
    #[error("invalid upstream URI: {0}")]
    Uri(#[from] InvalidUri),
    #[error("invalid handshake header: {0}")]
    Header(#[from] InvalidHeaderValue),
    #[error("upstream request failed: {0}")]
    Request(#[from] hyper_util::client::legacy::Error),
    #[error("upstream answered {0} instead of 101")]
    Status(StatusCode),
    #[error("upstream sent a wrong Sec-WebSocket-Accept")]
    Accept,
    #[error("connection upgrade failed: {0}")]
    Upgrade(#[from] hyper::Error),
}

/// Connect to the backend and, on success, upgrade the client and relay.
pub async fn forward_websocket(
    state: &ProxyState,
    upgrade: WebSocketUpgrade,
    parts: &Parts,
    peer: SocketAddr,
    upstream: Upstream,
) -> Response {
    let prefix = upstream.prefix.as_deref();
    let path = state
        .rewriter
        .upstream_path(&parts.uri, &upstream.target, prefix);

    let (backend, protocol) = match connect_backend(state, parts, peer, &upstream, &path).await {
        Ok(connected) => connected,
        Err(e) => {
            tracing::warn!(
                upstream = %upstream.target,
                prefix = prefix.unwrap_or("/"),
                path = %path,
                error = %e,
                "WebSocket upstream handshake failed"
            );
            metrics::record_upstream_error("websocket");
            return bad_gateway(prefix);
        }
    };

    // Offer the client exactly what the backend picked, or nothing.
    let upgrade = match protocol.as_ref().and_then(|v| v.to_str().ok()) {
        Some(protocol) => upgrade.protocols([protocol.to_string()]),
        None => upgrade,
    };

    let connection_id = Uuid::new_v4();
    tracing::debug!(%connection_id, upstream = %upstream.target, path = %path, "WebSocket upstream connected");

    upgrade.on_upgrade(move |client| relay(client, backend, upstream, connection_id))
}

/// Perform the backend handshake as a plain HTTP/1.1 upgrade.
///
/// The client's subprotocol offer is passed through untouched and the
/// backend's answer, including no answer, is returned as-is.
async fn connect_backend(
    state: &ProxyState,
    parts: &Parts,
    peer: SocketAddr,
    upstream: &Upstream,
    path: &str,
) -> Result<(BackendSocket, Option<HeaderValue>), HandshakeError> {
    let key = generate_key();

    let mut request = Request::new(Body::empty());
    *request.uri_mut() = upstream.target.http_uri(path)?;
    let headers = request.headers_mut();
    copy_handshake_headers(&parts.headers, headers);
    state.rewriter.apply_headers(headers, peer);
    headers.insert(header::CONNECTION, HeaderValue::from_static("upgrade"));
    headers.insert(header::UPGRADE, HeaderValue::from_static("websocket"));
    headers.insert(header::SEC_WEBSOCKET_VERSION, HeaderValue::from_static("13"));
    headers.insert(header::SEC_WEBSOCKET_KEY, HeaderValue::from_str(&key)?);

    let mut response = state.client.request(request).await?;
    if response.status() != StatusCode::SWITCHING_PROTOCOLS {
        return Err(HandshakeError::Status(response.status()));
    }
    if !accept_matches(response.headers(), &key) {
        return Err(HandshakeError::Accept);
    }
    let protocol = response.headers().get(header::SEC_WEBSOCKET_PROTOCOL).cloned();

    let upgraded = hyper::upgrade::on(&mut response).await?;
    let socket = WebSocketStream::from_raw_socket(TokioIo::new(upgraded), Role::Client, None).await;
    Ok((socket, protocol))
}

fn accept_matches(headers: &HeaderMap, key: &str) -> bool {
    headers
        .get(header::SEC_WEBSOCKET_ACCEPT)
        .map(|accept| accept.as_bytes() == derive_accept_key(key.as_bytes()).as_bytes())
        .unwrap_or(false)
}

fn copy_handshake_headers(from: &HeaderMap, to: &mut HeaderMap) {
    for (name, value) in from {
        if HANDSHAKE_OWNED.contains(name) {
            continue;
        }
        to.append(name.clone(), value.clone());
    }
}

/// Relay frames until either side closes or errors.
async fn relay(client: WebSocket, backend: BackendSocket, upstream: Upstream, connection_id: Uuid) {
    let _open = metrics::OpenWebSocket::new();
    upstream.touch();

    let (mut client_tx, mut client_rx) = client.split();
    let (mut backend_tx, mut backend_rx) = backend.split();

    let client_to_backend = async {
        while let Some(Ok(message)) = client_rx.next().await {
            upstream.touch();
            if backend_tx.send(to_backend(message)).await.is_err() {
                break;
            }
        }
    };

    let backend_to_client = async {
        while let Some(Ok(message)) = backend_rx.next().await {
            upstream.touch();
            let Some(message) = to_client(message) else {
                continue;
            };
            if client_tx.send(message).await.is_err() {
                break;
            }
        }
    };

    tokio::select! {
        _ = client_to_backend => {
            tracing::debug!(%connection_id, "Client side of WebSocket ended");
        }
        _ = backend_to_client => {
            tracing::debug!(%connection_id, "Backend side of WebSocket ended");
        }
    }

    tracing::debug!(%connection_id, "WebSocket relay closed");
}

fn to_backend(message: ws::Message) -> tungstenite::Message {
    match message {
        ws::Message::Text(text) => tungstenite::Message::text(text.as_str().to_owned()),
        ws::Message::Binary(data) => tungstenite::Message::Binary(data),
        ws::Message::Ping(data) => tungstenite::Message::Ping(data),
        ws::Message::Pong(data) => tungstenite::Message::Pong(data),
        ws::Message::Close(frame) => tungstenite::Message::Close(frame.map(|frame| CloseFrame {
            code: CloseCode::from(frame.code),
            reason: frame.reason.as_str().to_owned().into(),
        })),
    }
}

fn to_client(message: tungstenite::Message) -> Option<ws::Message> {
    let message = match message {
        tungstenite::Message::Text(text) => ws::Message::Text(text.as_str().to_owned().into()),
        tungstenite::Message::Binary(data) => ws::Message::Binary(data),
        tungstenite::Message::Ping(data) => ws::Message::Ping(data),
        tungstenite::Message::Pong(data) => ws::Message::Pong(data),
        tungstenite::Message::Close(frame) => ws::Message::Close(frame.map(|frame| ws::CloseFrame {
            code: frame.code.into(),
            reason: frame.reason.as_str().to_owned().into(),
        })),
        tungstenite::Message::Frame(_) => return None,
    };
    Some(message)
}
