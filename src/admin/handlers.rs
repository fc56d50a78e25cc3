//! Control API handlers.

use std::collections::BTreeMap;

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{StatusCode, Uri},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;

use crate::admin::{ControlState, ROUTES_PATH};
use crate::observability::metrics;
use crate::routing::matcher::normalize_prefix;
use crate::routing::{RouteEntry, Target};

/// Error returned by a control handler.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("no route at {0}")]
    NotFound(String),
}

/// Error text attached to failed responses for the request logger.
#[derive(Debug, Clone)]
pub struct ErrorDetail(pub String);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
        };
        let message = self.to_string();
        let mut response = (status, message.clone()).into_response();
        response.extensions_mut().insert(ErrorDetail(message));
        response
    }
}

/// Query string of `GET /api/routes`.
#[derive(Debug, Deserialize)]
pub struct ListQuery {
    /// Only list routes idle since before this RFC 3339 instant.
    pub inactive_since: Option<String>,
}

/// `GET /api/routes`
pub async fn list_routes(
    State(state): State<ControlState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<BTreeMap<String, RouteEntry>>, ApiError> {
    let mut routes = state.routes.list_routes();

    if let Some(raw) = query.inactive_since {
        let since = DateTime::parse_from_rfc3339(&raw)
            .map_err(|e| ApiError::BadRequest(format!("invalid inactive_since {:?}: {}", raw, e)))?
            .with_timezone(&Utc);
        routes.retain(|_, entry| entry.last_activity < since);
    }

    Ok(Json(routes))
}

/// `POST /api/routes/<path>`
pub async fn add_route(
    State(state): State<ControlState>,
    uri: Uri,
    body: Bytes,
) -> Result<StatusCode, ApiError> {
    let value: Value = serde_json::from_slice(&body)
        .map_err(|e| ApiError::BadRequest(format!("invalid JSON body: {}", e)))?;
    let Value::Object(mut fields) = value else {
        return Err(ApiError::BadRequest("body must be a JSON object".into()));
    };

    let target = match fields.remove("target") {
        Some(Value::String(target)) => target,
        Some(_) => return Err(ApiError::BadRequest("`target` must be a string".into())),
        None => return Err(ApiError::BadRequest("missing `target`".into())),
    };
    let target = Target::parse(&target).map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let prefix = route_path(&uri);
    let key = state
        .routes
        .add_route(prefix, RouteEntry::new(target.clone(), fields))
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;

    tracing::info!(prefix = %key, upstream = %target, "Route added");
    metrics::set_route_count(state.routes.len());
    Ok(StatusCode::CREATED)
}

/// `DELETE /api/routes/<path>`
pub async fn remove_route(
    State(state): State<ControlState>,
    uri: Uri,
) -> Result<StatusCode, ApiError> {
    let key = normalize_prefix(route_path(&uri));
    if !state.routes.remove_route(&key) {
        return Err(ApiError::NotFound(key));
    }

    tracing::info!(prefix = %key, "Route removed");
    metrics::set_route_count(state.routes.len());
    Ok(StatusCode::ACCEPTED)
}

/// The raw (still percent-encoded) path after `/api/routes`, so stored
/// prefixes compare equal to data-plane request paths.
fn route_path(uri: &Uri) -> &str {
    uri.path().strip_prefix(ROUTES_PATH).unwrap_or_default()
}
