//! Streaming HTTP forwarding.
//!
//! # Responsibilities
//! - Send the rewritten request to the backend without buffering the body
//! - Stream the backend response back to the client
//! - Record route activity on every body chunk, in both directions
//!
//! # Design Decisions
//! - No retries: one failed attempt is a 502
//! - Dropping the client response drops the upstream body, which closes the
//!   upstream connection (no orphaned sockets)

use std::net::SocketAddr;

use axum::{
    body::Body,
    http::{Request, Version},
    response::Response,
};
use futures_util::StreamExt;
use hyper::body::Incoming;

use crate::http::request::strip_hop_by_hop;
use crate::http::response::bad_gateway;
use crate::http::server::ProxyState;
use crate::observability::metrics;
use crate::routing::{Activity, Target};

/// Where a request is going.
#[derive(Debug, Clone)]
pub struct Upstream {
    /// Backend to forward to.
    pub target: Target,
    /// Matched prefix; `None` for the default target.
    pub prefix: Option<String>,
    /// Activity recorder; `None` for the default target.
    pub activity: Option<Activity>,
}

impl Upstream {
    /// Mark the route active, if this is a tracked route.
    pub fn touch(&self) {
        if let Some(activity) = &self.activity {
            activity.touch();
        }
    }
}

/// Forward a plain HTTP request and stream the response back.
pub async fn forward_http(
    state: &ProxyState,
    request: Request<Body>,
    peer: SocketAddr,
    upstream: Upstream,
) -> Response {
    let (mut parts, body) = request.into_parts();
    let path = state
        .rewriter
        .upstream_path(&parts.uri, &upstream.target, upstream.prefix.as_deref());

    let uri = match upstream.target.http_uri(&path) {
        Ok(uri) => uri,
        Err(e) => {
            tracing::warn!(upstream = %upstream.target, path = %path, error = %e, "Cannot build upstream URI");
            metrics::record_upstream_error("uri");
            return bad_gateway(upstream.prefix.as_deref());
        }
    };

    strip_hop_by_hop(&mut parts.headers);
    state.rewriter.apply_headers(&mut parts.headers, peer);
    parts.uri = uri;
    // The upstream client speaks HTTP/1.1 regardless of the client's version.
    parts.version = Version::HTTP_11;

    let request = Request::from_parts(parts, track_body(body, upstream.activity.clone()));

    match state.client.request(request).await {
        Ok(response) => {
            upstream.touch();
            relay_response(response, upstream.activity)
        }
        Err(e) => {
            tracing::warn!(
                upstream = %upstream.target,
                prefix = upstream.prefix.as_deref().unwrap_or("/"),
                path = %path,
                error = %e,
                "Upstream request failed"
            );
            metrics::record_upstream_error("http");
            bad_gateway(upstream.prefix.as_deref())
        }
    }
}

fn relay_response(response: hyper::Response<Incoming>, activity: Option<Activity>) -> Response {
    let (mut parts, body) = response.into_parts();
    strip_hop_by_hop(&mut parts.headers);
    Response::from_parts(parts, track_body(Body::new(body), activity))
}

/// Wrap `body` so every chunk marks the route active.
fn track_body(body: Body, activity: Option<Activity>) -> Body {
    match activity {
        Some(activity) => Body::from_stream(body.into_data_stream().inspect(move |_| activity.touch())),
        None => body,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::{RouteEntry, RouteTable};
    use chrono::Utc;
    use std::sync::Arc;

    #[tokio::test]
    async fn tracked_body_touches_per_chunk() {
        let table = Arc::new(RouteTable::new());
        let mut entry = RouteEntry::new(Target::parse("http://h:1").unwrap(), Default::default());
        entry.last_activity = Utc::now() - chrono::Duration::minutes(10);
        table.add_route("/foo", entry).unwrap();

        let chunks = futures_util::stream::iter(vec![
            Ok::<_, std::io::Error>("a"),
            Ok("b"),
        ]);
        let body = track_body(Body::from_stream(chunks), Some(table.activity("/foo")));

        let before = Utc::now();
        let bytes = axum::body::to_bytes(body, 1024).await.unwrap();
        assert_eq!(&bytes[..], b"ab");
        assert!(table.get("/foo").unwrap().last_activity >= before);
    }
}
