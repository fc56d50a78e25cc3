use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::{header::AUTHORIZATION, Client, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A route as reported by `GET /api/routes`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteInfo {
    pub target: String,
    pub last_activity: DateTime<Utc>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("control API returned {status}: {body}")]
    Status { status: StatusCode, body: String },
    #[error("extra fields must be a JSON object")]
    NotAnObject,
}

pub struct ControlClient {
    client: Client,
    api_url: String,
    token: Option<String>,
}

impl ControlClient {
    /// `api_url` is the control listener, e.g. `http://127.0.0.1:8001`.
    pub fn new(api_url: &str, token: Option<String>) -> Self {
        Self {
            client: Client::new(),
            api_url: api_url.trim_end_matches('/').to_string(),
            token,
        }
    }

    fn routes_url(&self, path: &str) -> String {
        format!("{}/api/routes/{}", self.api_url, path.trim_start_matches('/'))
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => builder.header(AUTHORIZATION, format!("token {}", token)),
            None => builder,
        }
    }

    /// Every stored route keyed by prefix.
    pub async fn list_routes(&self) -> Result<BTreeMap<String, RouteInfo>, ClientError> {
        let request = self.client.get(format!("{}/api/routes", self.api_url));
        let resp = check(self.authorized(request).send().await?).await?;
        Ok(resp.json().await?)
    }

    /// Routes with no traffic since `since`.
    pub async fn list_inactive_since(
        &self,
        since: DateTime<Utc>,
    ) -> Result<BTreeMap<String, RouteInfo>, ClientError> {
        let request = self
            .client
            .get(format!("{}/api/routes", self.api_url))
            .query(&[("inactive_since", since.to_rfc3339_opts(SecondsFormat::Micros, true))]);
        let resp = check(self.authorized(request).send().await?).await?;
        Ok(resp.json().await?)
    }

    /// Create or replace the route at `path`. `extra` must be a JSON object
    /// (or null) and is stored alongside the target.
    pub async fn add_route(&self, path: &str, target: &str, extra: Value) -> Result<(), ClientError> {
        let mut body = match extra {
            Value::Object(fields) => fields,
            Value::Null => Map::new(),
            _ => return Err(ClientError::NotAnObject),
        };
        body.insert("target".into(), Value::String(target.to_string()));

        let request = self.client.post(self.routes_url(path)).json(&body);
        check(self.authorized(request).send().await?).await?;
        Ok(())
    }

    /// Remove the route at `path`. Returns `false` if none existed.
    pub async fn remove_route(&self, path: &str) -> Result<bool, ClientError> {
        let request = self.client.delete(self.routes_url(path));
        let resp = self.authorized(request).send().await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(false);
        }
        check(resp).await?;
        Ok(true)
    }
}

async fn check(resp: reqwest::Response) -> Result<reqwest::Response, ClientError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(ClientError::Status { status, body })
}
