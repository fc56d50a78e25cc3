//! Control API behaviour over real sockets.

mod common;

use chrono::{Duration, Utc};
use reqwest::StatusCode;
use route_proxy_sdk::{ClientError, ControlClient};
use serde_json::json;

use common::{start_proxy, test_config};

#[tokio::test]
async fn routes_round_trip() {
    let proxy = start_proxy(test_config()).await;
    let control = proxy.control();
    let before = Utc::now();

    control
        .add_route("/user/alice", "http://127.0.0.1:9000", json!({"user": "alice", "server": 3}))
        .await
        .unwrap();

    let routes = control.list_routes().await.unwrap();
    let entry = &routes["/user/alice"];
    assert_eq!(entry.target, "http://127.0.0.1:9000");
    assert_eq!(entry.extra["user"], "alice");
    assert_eq!(entry.extra["server"], 3);
    assert!(entry.last_activity >= before - Duration::seconds(1));

    assert!(control.remove_route("/user/alice").await.unwrap());
    assert!(control.list_routes().await.unwrap().is_empty());
    assert!(!control.remove_route("/user/alice").await.unwrap());
}

#[tokio::test]
async fn duplicate_add_replaces_entry() {
    let proxy = start_proxy(test_config()).await;
    let control = proxy.control();

    control
        .add_route("/svc", "http://127.0.0.1:9000", json!({"owner": "a"}))
        .await
        .unwrap();
    control
        .add_route("/svc/", "ws://127.0.0.1:9001", json!(null))
        .await
        .unwrap();

    let routes = control.list_routes().await.unwrap();
    assert_eq!(routes.len(), 1);
    assert_eq!(routes["/svc"].target, "ws://127.0.0.1:9001");
    assert!(routes["/svc"].extra.get("owner").is_none());
}

#[tokio::test]
async fn wrong_token_is_forbidden_and_leaks_nothing() {
    let proxy = start_proxy(test_config()).await;
    proxy
        .control()
        .add_route("/secret", "http://127.0.0.1:9000", json!(null))
        .await
        .unwrap();

    for token in [None, Some("nope".to_string())] {
        let intruder = ControlClient::new(&proxy.api_url(), token);

        match intruder.list_routes().await {
            Err(ClientError::Status { status, body }) => {
                assert_eq!(status, StatusCode::FORBIDDEN);
                assert!(!body.contains("/secret"));
            }
            other => panic!("expected 403, got {:?}", other),
        }
        match intruder.add_route("/evil", "http://127.0.0.1:1", json!(null)).await {
            Err(ClientError::Status { status, .. }) => assert_eq!(status, StatusCode::FORBIDDEN),
            other => panic!("expected 403, got {:?}", other),
        }
        match intruder.remove_route("/secret").await {
            Err(ClientError::Status { status, .. }) => assert_eq!(status, StatusCode::FORBIDDEN),
            other => panic!("expected 403, got {:?}", other),
        }
    }

    let routes = proxy.running.routes.list_routes();
    assert_eq!(routes.len(), 1);
    assert!(routes.contains_key("/secret"));
}

#[tokio::test]
async fn inactive_since_filters_routes() {
    let proxy = start_proxy(test_config()).await;
    let control = proxy.control();
    control
        .add_route("/a", "http://127.0.0.1:9000", json!(null))
        .await
        .unwrap();

    let past = Utc::now() - Duration::hours(1);
    assert!(control.list_inactive_since(past).await.unwrap().is_empty());

    let future = Utc::now() + Duration::hours(1);
    let idle = control.list_inactive_since(future).await.unwrap();
    assert!(idle.contains_key("/a"));
}

#[tokio::test]
async fn rejects_unsupported_targets() {
    let proxy = start_proxy(test_config()).await;
    let control = proxy.control();

    for target in ["https://example.com", "ftp://example.com", ""] {
        match control.add_route("/bad", target, json!(null)).await {
            Err(ClientError::Status { status, .. }) => assert_eq!(status, StatusCode::BAD_REQUEST),
            other => panic!("expected 400 for {:?}, got {:?}", target, other),
        }
    }
    assert!(proxy.running.routes.is_empty());
}

#[tokio::test]
async fn open_api_without_token() {
    let mut config = test_config();
    config.api.auth_token = None;
    let proxy = start_proxy(config).await;

    let anonymous = ControlClient::new(&proxy.api_url(), None);
    anonymous
        .add_route("/open", "http://127.0.0.1:9000", json!(null))
        .await
        .unwrap();
    assert!(anonymous.list_routes().await.unwrap().contains_key("/open"));
}
