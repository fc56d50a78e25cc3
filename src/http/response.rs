//! Data-plane error responses.
//!
//! Bodies are short and never name the backend address.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// The backend could not be reached or failed mid-handshake.
pub fn bad_gateway(route: Option<&str>) -> Response {
    let body = match route {
        Some(prefix) => format!("Bad Gateway: upstream for {} is unavailable", prefix),
        None => "Bad Gateway: default upstream is unavailable".to_string(),
    };
    (StatusCode::BAD_GATEWAY, body).into_response()
}

/// No route matched and no default target is configured.
pub fn no_route() -> Response {
    (StatusCode::NOT_FOUND, "No matching route and no default target").into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn bad_gateway_names_route_not_backend() {
        let response = bad_gateway(Some("/broken"));
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        assert_eq!(&body[..], b"Bad Gateway: upstream for /broken is unavailable");
    }
}
