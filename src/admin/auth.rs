//! Shared-secret guard for the control API.

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::admin::ControlState;

/// Checks `Authorization: token <secret>` against the configured secret.
#[derive(Debug, Clone, Default)]
pub struct AuthGuard {
    token: Option<String>,
}

impl AuthGuard {
    /// `None` leaves the control API open.
    pub fn new(token: Option<String>) -> Self {
        Self { token }
    }

    /// True if the request may proceed.
    pub fn permits(&self, headers: &HeaderMap) -> bool {
        let Some(expected) = &self.token else {
            return true;
        };

        headers
            .get(header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .and_then(|value| value.strip_prefix("token "))
            .map(|presented| presented == expected)
            .unwrap_or(false)
    }
}

/// Reject unauthenticated requests before any handler or table access.
pub async fn require_token(
    State(state): State<ControlState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if state.auth.permits(request.headers()) {
        return next.run(request).await;
    }

    tracing::warn!(
        method = %request.method(),
        path = %request.uri().path(),
        "Rejected control API request: bad or missing token"
    );
    (StatusCode::FORBIDDEN, "Forbidden").into_response()
}
