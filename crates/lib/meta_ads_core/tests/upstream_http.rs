//! Integration tests: run the Graph and OAuth clients against an in-process
//! mock of the Meta endpoints.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Duration;

use axum::extract::Query;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{Value, json};

use meta_ads_core::auth::{AuthError, MetaOAuthClient, OAuthProvider};
use meta_ads_core::config::{ConnectorConfig, GraphConfig, OAuthConfig};
use meta_ads_core::connect::ConnectedAccounts;
use meta_ads_core::graph::{GraphApi, GraphClient, GraphError, UpstreamAuth};

fn bearer(headers: &HeaderMap) -> Option<String> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(String::from)
}

async fn campaigns(headers: HeaderMap, Query(q): Query<HashMap<String, String>>) -> (StatusCode, Json<Value>) {
    if bearer(&headers).as_deref() != Some("good-token") {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"error": {"message": "Invalid OAuth access token.", "code": 190}})),
        );
    }
    (
        StatusCode::OK,
        Json(json!({
            "data": [{"id": "1", "name": "Spring"}],
            "echo_fields": q.get("fields"),
        })),
    )
}

async fn create_campaign(Json(body): Json<Value>) -> Json<Value> {
    Json(json!({"id": "99", "received": body}))
}

async fn slow() -> Json<Value> {
    tokio::time::sleep(Duration::from_secs(2)).await;
    Json(json!({}))
}

async fn token(Query(q): Query<HashMap<String, String>>) -> (StatusCode, Json<Value>) {
    if q.get("client_secret").map(String::as_str) != Some("app-secret") {
        return (StatusCode::BAD_REQUEST, Json(json!({"error": {"message": "bad secret"}})));
    }
    match (q.get("grant_type").map(String::as_str), q.get("code"), q.get("fb_exchange_token")) {
        (None, Some(code), _) if code == "good-code" => (
            StatusCode::OK,
            Json(json!({"access_token": "long-lived", "token_type": "bearer", "expires_in": 5183944})),
        ),
        (Some("fb_exchange_token"), _, Some(basis)) if basis == "long-lived" => (
            StatusCode::OK,
            Json(json!({"access_token": "renewed", "token_type": "bearer", "expires_in": 5184000})),
        ),
        _ => (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": {"message": "Error validating verification code.", "code": 100}})),
        ),
    }
}

fn connect_authorized(headers: &HeaderMap) -> bool {
    bearer(headers).as_deref() == Some("pd-key")
        && headers.get("x-pd-environment").and_then(|v| v.to_str().ok()) == Some("development")
}

async fn connect_accounts(headers: HeaderMap, Query(q): Query<HashMap<String, String>>) -> (StatusCode, Json<Value>) {
    if !connect_authorized(&headers) {
        return (StatusCode::UNAUTHORIZED, Json(json!({"error": "invalid api key"})));
    }
    let data = match (q.get("external_user_id").map(String::as_str), q.get("app").map(String::as_str)) {
        (Some("alice"), Some("facebook_marketing")) => json!([{"id": "apn_1", "app": {"name_slug": "facebook_marketing"}}]),
        _ => json!([]),
    };
    (StatusCode::OK, Json(json!({"data": data, "page_info": {"count": data.as_array().map_or(0, Vec::len)}})))
}

async fn connect_token(headers: HeaderMap, Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    if !connect_authorized(&headers) {
        return (StatusCode::UNAUTHORIZED, Json(json!({"error": "invalid api key"})));
    }
    let user = body["external_user_id"].as_str().unwrap_or_default();
    (
        StatusCode::OK,
        Json(json!({
            "token": format!("ctok_{user}"),
            "expires_at": "2030-01-01T00:00:00Z",
            "connect_link_url": format!("https://pipedream.com/_static/connect.html?token=ctok_{user}&connectLink=true"),
        })),
    )
}

async fn spawn_mock() -> SocketAddr {
    let app = Router::new()
        .route("/v21.0/act_1/campaigns", get(campaigns).post(create_campaign))
        .route("/v21.0/slow", get(slow))
        .route("/v21.0/oauth/access_token", get(token))
        .route("/v1/connect/proj_1/accounts", get(connect_accounts))
        .route("/v1/connect/proj_1/tokens", post(connect_token));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind mock");
    let addr = listener.local_addr().expect("mock addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("mock server");
    });
    addr
}

fn graph_client(addr: SocketAddr, timeout: Duration) -> GraphClient {
    GraphClient::new(GraphConfig {
        graph_url: format!("http://{addr}"),
        timeout,
        ..GraphConfig::default()
    })
    .expect("graph client")
}

fn connector_client(addr: SocketAddr) -> GraphClient {
    GraphClient::new(GraphConfig {
        connector: Some(ConnectorConfig {
            api_url: format!("http://{addr}"),
            project_id: "proj_1".into(),
            environment: "development".into(),
            api_key: "pd-key".into(),
            app: "facebook_marketing".into(),
            account_id: None,
        }),
        ..GraphConfig::default()
    })
    .expect("connector client")
}

fn oauth_client(addr: SocketAddr) -> MetaOAuthClient {
    let mut config = OAuthConfig::new("1234", "app-secret", "http://localhost/auth/meta/callback");
    config.graph_url = format!("http://{addr}");
    MetaOAuthClient::new(config).expect("oauth client")
}

#[tokio::test]
async fn get_returns_json_for_2xx() {
    let addr = spawn_mock().await;
    let client = graph_client(addr, Duration::from_secs(5));

    let body = client
        .get(
            "act_1/campaigns",
            &[("fields".into(), "id,name".into())],
            &UpstreamAuth::Bearer("good-token".into()),
        )
        .await
        .expect("campaigns");

    assert_eq!(body["data"][0]["name"], "Spring");
    assert_eq!(body["echo_fields"], "id,name");
}

#[tokio::test]
async fn non_2xx_maps_to_status_error_with_graph_message() {
    let addr = spawn_mock().await;
    let client = graph_client(addr, Duration::from_secs(5));

    let err = client
        .get("act_1/campaigns", &[], &UpstreamAuth::Bearer("stale".into()))
        .await
        .expect_err("should be rejected");

    match err {
        GraphError::Status { status, message } => {
            assert_eq!(status, 401);
            assert_eq!(message, "Invalid OAuth access token.");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn post_sends_json_body() {
    let addr = spawn_mock().await;
    let client = graph_client(addr, Duration::from_secs(5));

    let body = client
        .post(
            "act_1/campaigns",
            &json!({"name": "Summer", "status": "PAUSED"}),
            &UpstreamAuth::Bearer("good-token".into()),
        )
        .await
        .expect("create");

    assert_eq!(body["id"], "99");
    assert_eq!(body["received"]["name"], "Summer");
}

#[tokio::test]
async fn slow_upstream_times_out() {
    let addr = spawn_mock().await;
    let client = graph_client(addr, Duration::from_millis(200));

    let err = client
        .get("slow", &[], &UpstreamAuth::Bearer("good-token".into()))
        .await
        .expect_err("should time out");

    assert!(matches!(err, GraphError::Timeout(_)), "got {err:?}");
}

#[tokio::test]
async fn exchange_code_returns_grant() {
    let addr = spawn_mock().await;
    let grant = oauth_client(addr).exchange_code("good-code").await.expect("exchange");
    assert_eq!(grant.access_token, "long-lived");
    assert_eq!(grant.expires_in, Some(5183944));
}

#[tokio::test]
async fn exchange_code_failure_is_exchange_failed() {
    let addr = spawn_mock().await;
    let err = oauth_client(addr).exchange_code("bad-code").await.expect_err("rejected");
    match err {
        AuthError::ExchangeFailed(msg) => assert!(msg.contains("Error validating verification code.")),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn refresh_uses_fb_exchange_token_grant() {
    let addr = spawn_mock().await;
    let client = oauth_client(addr);

    let grant = client.refresh("long-lived").await.expect("refresh");
    assert_eq!(grant.access_token, "renewed");

    let err = client.refresh("unknown").await.expect_err("rejected");
    assert!(matches!(err, AuthError::RefreshFailed(_)));
}

#[tokio::test]
async fn connected_accounts_are_looked_up_per_user() {
    let addr = spawn_mock().await;
    let client = connector_client(addr);

    assert!(client.is_connected("alice").await.expect("lookup"));
    assert!(!client.is_connected("never-connected").await.expect("lookup"));
}

#[tokio::test]
async fn connect_url_carries_token_and_app() {
    let addr = spawn_mock().await;
    let url = connector_client(addr).connect_url("bob").await.expect("connect url");
    assert_eq!(
        url,
        "https://pipedream.com/_static/connect.html?token=ctok_bob&connectLink=true&app=facebook_marketing"
    );
}
