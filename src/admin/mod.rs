//! Control API: runtime route management.
//!
//! # Endpoints
//! ```text
//! GET    /api/routes[?inactive_since=<RFC3339>]  → 200 {prefix: entry}
//! POST   /api/routes/<path>   {"target": ...}    → 201
//! DELETE /api/routes/<path>                      → 202 | 404
//! ```
//!
//! Every endpoint sits behind [`auth::require_token`]; a rejected request
//! never reaches the table.

pub mod auth;
pub mod handlers;

use std::any::Any;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{catch_panic::CatchPanicLayer, trace::TraceLayer};

use crate::config::ApiConfig;
use crate::lifecycle::shutdown::wait_for;
use crate::routing::RouteTable;

use self::auth::{require_token, AuthGuard};
use self::handlers::{add_route, list_routes, remove_route, ErrorDetail};

/// Path under which routes are managed.
pub const ROUTES_PATH: &str = "/api/routes";

/// State shared by the control handlers.
#[derive(Clone)]
pub struct ControlState {
    pub routes: Arc<RouteTable>,
    pub auth: Arc<AuthGuard>,
}

/// Build the control router over `routes`.
pub fn control_router(routes: Arc<RouteTable>, auth_token: Option<String>) -> Router {
    let state = ControlState {
        routes,
        auth: Arc::new(AuthGuard::new(auth_token)),
    };

    Router::new()
        .route(ROUTES_PATH, get(list_routes))
        .route("/api/routes/", post(add_route).delete(remove_route))
        .route("/api/routes/{*path}", post(add_route).delete(remove_route))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_token))
        .with_state(state)
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(middleware::from_fn(log_failures))
        .layer(TraceLayer::new_for_http())
}

/// Log every non-2xx control response with method, path and status.
async fn log_failures(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let response = next.run(request).await;

    let status = response.status();
    if !status.is_success() {
        let detail = response
            .extensions()
            .get::<ErrorDetail>()
            .map(|d| d.0.as_str())
            .unwrap_or_default();
        tracing::warn!(
            method = %method,
            path = %path,
            status = status.as_u16(),
            detail,
            "Control API request failed"
        );
    }
    response
}

fn handle_panic(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = panic
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| panic.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    tracing::error!(panic = detail, "Control API handler panicked");
    (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response()
}

/// HTTP server for the control API.
pub struct ControlServer {
    router: Router,
}

impl ControlServer {
    /// Create the control server over the shared table.
    pub fn new(config: &ApiConfig, routes: Arc<RouteTable>) -> Self {
        Self {
            router: control_router(routes, config.auth_token.clone()),
        }
    }

    /// Serve on `listener` until `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "Control API listening");

        axum::serve(
            listener,
            self.router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(wait_for(shutdown))
        .await?;

        tracing::info!("Control API stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn request(method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> Request<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("token {}", token));
        }
        let body = match body {
            Some(value) => Body::from(value.to_string()),
            None => Body::empty(),
        };
        builder.body(body).unwrap()
    }

    async fn json_body(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn add_list_remove() {
        let routes = Arc::new(RouteTable::new());
        let app = control_router(Arc::clone(&routes), Some("s3cret".into()));

        let response = app
            .clone()
            .oneshot(request(
                "POST",
                "/api/routes/user/alice/",
                Some("s3cret"),
                Some(json!({"target": "http://127.0.0.1:9000", "user": "alice"})),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let response = app
            .clone()
            .oneshot(request("GET", "/api/routes", Some("s3cret"), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let listed = json_body(response).await;
        assert_eq!(listed["/user/alice"]["target"], "http://127.0.0.1:9000");
        assert_eq!(listed["/user/alice"]["user"], "alice");
        assert!(listed["/user/alice"]["last_activity"].is_string());

        let response = app
            .clone()
            .oneshot(request("DELETE", "/api/routes/user/alice", Some("s3cret"), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        assert!(routes.is_empty());

        let response = app
            .oneshot(request("DELETE", "/api/routes/user/alice", Some("s3cret"), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn bad_token_never_reaches_table() {
        let routes = Arc::new(RouteTable::new());
        let app = control_router(Arc::clone(&routes), Some("s3cret".into()));

        for token in [None, Some("wrong")] {
            let response = app
                .clone()
                .oneshot(request(
                    "POST",
                    "/api/routes/foo",
                    token,
                    Some(json!({"target": "http://127.0.0.1:9000"})),
                ))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::FORBIDDEN);

            let response = app
                .clone()
                .oneshot(request("GET", "/api/routes", token, None))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::FORBIDDEN);
            let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
            assert!(!String::from_utf8_lossy(&bytes).contains("/foo"));
        }
        assert!(routes.is_empty());
    }

    #[tokio::test]
    async fn rejects_bad_bodies() {
        let app = control_router(Arc::new(RouteTable::new()), None);

        let cases = [
            Body::from("not json"),
            Body::from("[1, 2]"),
            Body::from(r#"{"user": "alice"}"#),
            Body::from(r#"{"target": 42}"#),
            Body::from(r#"{"target": "ftp://example.com"}"#),
        ];
        for body in cases {
            let response = app
                .clone()
                .oneshot(
                    Request::builder()
                        .method("POST")
                        .uri("/api/routes/foo")
                        .body(body)
                        .unwrap(),
                )
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        }
    }

    #[tokio::test]
    async fn filters_by_inactivity() {
        let routes = Arc::new(RouteTable::new());
        let app = control_router(Arc::clone(&routes), None);

        let response = app
            .clone()
            .oneshot(request(
                "POST",
                "/api/routes/idle",
                None,
                Some(json!({"target": "http://127.0.0.1:9000"})),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let response = app
            .clone()
            .oneshot(request(
                "GET",
                "/api/routes?inactive_since=2000-01-01T00:00:00Z",
                None,
                None,
            ))
            .await
            .unwrap();
        assert_eq!(json_body(response).await, json!({}));

        let response = app
            .clone()
            .oneshot(request(
                "GET",
                "/api/routes?inactive_since=2999-01-01T00:00:00Z",
                None,
                None,
            ))
            .await
            .unwrap();
        assert!(json_body(response).await["/idle"].is_object());

        let response = app
            .oneshot(request("GET", "/api/routes?inactive_since=yesterday", None, None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    async fn explode() -> &'static str {
        panic!("handler exploded")
    }

    #[tokio::test]
    async fn handler_panic_is_500_and_listener_survives() {
        let app = Router::new()
            .route("/boom", get(explode))
            .route("/ok", get(|| async { "still here" }))
            .layer(CatchPanicLayer::custom(handle_panic));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let response = reqwest::get(format!("http://{}/boom", addr)).await.unwrap();
        assert_eq!(response.status().as_u16(), 500);
        assert_eq!(response.text().await.unwrap(), "Internal Server Error");

        for _ in 0..2 {
            let response = reqwest::get(format!("http://{}/ok", addr)).await.unwrap();
            assert_eq!(response.status().as_u16(), 200);
            assert_eq!(response.text().await.unwrap(), "still here");
        }
    }

    #[tokio::test]
    async fn root_prefix_rejected() {
        let app = control_router(Arc::new(RouteTable::new()), None);
        let response = app
            .clone()
            .oneshot(request(
                "POST",
                "/api/routes/",
                None,
                Some(json!({"target": "http://127.0.0.1:9000"})),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = app
            .oneshot(request("DELETE", "/api/routes/", None, None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
