// @zen-component: GRAPH-UpstreamClient
//
//! Meta Graph API client.
//!
//! Issues GET/POST calls against the Graph API, either directly with the
//! user's bearer token or through a Pipedream Connect proxy that holds the
//! token on the server's behalf. Non-2xx responses become typed errors
//! carrying the Graph `error.message`.

use std::fmt;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use reqwest::{Client, Method, RequestBuilder};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

use crate::config::GraphConfig;

/// Longest upstream body excerpt kept in an error message.
const MAX_ERROR_BODY_CHARS: usize = 500;

/// Errors returned by upstream Graph API calls.
#[derive(Debug, Error)]
pub enum GraphError {
    #[error("Graph API returned HTTP {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Graph API request timed out: {0}")]
    Timeout(String),

    #[error("Graph API request failed: {0}")]
    Transport(String),

    #[error("Graph API response could not be decoded: {0}")]
    Decode(String),

    #[error("Graph client misconfigured: {0}")]
    Config(String),
}

impl GraphError {
    pub(crate) fn from_reqwest(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            GraphError::Timeout(e.to_string())
        } else {
            GraphError::Transport(e.to_string())
        }
    }
}

/// How an upstream call authenticates.
#[derive(Clone, PartialEq, Eq)]
pub enum UpstreamAuth {
    /// Direct mode: the user's Meta access token.
    Bearer(String),
    /// Connector mode: the connector resolves the token for this user.
    Connector { external_user_id: String },
}

impl fmt::Debug for UpstreamAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UpstreamAuth::Bearer(_) => f.write_str("Bearer(<redacted>)"),
            UpstreamAuth::Connector { external_user_id } => f
                .debug_struct("Connector")
                .field("external_user_id", external_user_id)
                .finish(),
        }
    }
}

/// Upstream Graph API operations used by the tool executors.
#[async_trait]
pub trait GraphApi: Send + Sync {
    /// `GET /{path}?{query}`.
    async fn get(
        &self,
        path: &str,
        query: &[(String, String)],
        auth: &UpstreamAuth,
    ) -> Result<Value, GraphError>;

    /// `POST /{path}` with a JSON body.
    async fn post(&self, path: &str, body: &Value, auth: &UpstreamAuth)
    -> Result<Value, GraphError>;
}

/// reqwest-backed [`GraphApi`] implementation.
pub struct GraphClient {
    pub(crate) http: Client,
    pub(crate) config: GraphConfig,
}

impl GraphClient {
    /// Build a client whose every request is bounded by `config.timeout`.
    pub fn new(config: GraphConfig) -> Result<Self, GraphError> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| GraphError::Config(format!("HTTP client build failed: {e}")))?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &GraphConfig {
        &self.config
    }

    /// Absolute Graph API URL for `path` with `query` appended.
    pub fn target_url(&self, path: &str, query: &[(String, String)]) -> Result<Url, GraphError> {
        let raw = format!(
            "{}/{}/{}",
            self.config.graph_url.trim_end_matches('/'),
            self.config.api_version,
            path.trim_start_matches('/')
        );
        let mut url = Url::parse(&raw)
            .map_err(|e| GraphError::Config(format!("invalid Graph URL {raw}: {e}")))?;
        if !query.is_empty() {
            url.query_pairs_mut()
                .extend_pairs(query.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        }
        Ok(url)
    }

    /// Attach authentication, rewriting the target through the connector
    /// proxy when required.
    pub fn request(
        &self,
        method: Method,
        target: Url,
        auth: &UpstreamAuth,
    ) -> Result<RequestBuilder, GraphError> {
        match auth {
            UpstreamAuth::Bearer(token) => Ok(self.http.request(method, target).bearer_auth(token)),
            UpstreamAuth::Connector { external_user_id } => {
                let connector = self.config.connector.as_ref().ok_or_else(|| {
                    GraphError::Config("connector auth requested but no connector is configured".into())
                })?;
                let raw = format!(
                    "{}/v1/connect/{}/proxy/{}",
                    connector.api_url.trim_end_matches('/'),
                    connector.project_id,
                    URL_SAFE_NO_PAD.encode(target.as_str())
                );
                let mut proxy = Url::parse(&raw)
                    .map_err(|e| GraphError::Config(format!("invalid connector URL: {e}")))?;
                {
                    let mut pairs = proxy.query_pairs_mut();
                    pairs.append_pair("external_user_id", external_user_id);
                    if let Some(account_id) = &connector.account_id {
                        pairs.append_pair("account_id", account_id);
                    }
                }
                Ok(self
                    .http
                    .request(method, proxy)
                    .bearer_auth(&connector.api_key)
                    .header("x-pd-environment", &connector.environment))
            }
        }
    }

    pub(crate) async fn send(&self, builder: RequestBuilder, path: &str) -> Result<Value, GraphError> {
        let resp = builder.send().await.map_err(GraphError::from_reqwest)?;
        let status = resp.status();

        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            let message = upstream_message(&body);
            warn!(status = %status, path, message = %message, "Graph API call failed");
            return Err(GraphError::Status {
                status: status.as_u16(),
                message,
            });
        }

        debug!(status = %status, path, "Graph API call succeeded");
        resp.json::<Value>().await.map_err(|e| {
            if e.is_timeout() {
                GraphError::Timeout(e.to_string())
            } else {
                GraphError::Decode(e.to_string())
            }
        })
    }
}

#[async_trait]
impl GraphApi for GraphClient {
    async fn get(
        &self,
        path: &str,
        query: &[(String, String)],
        auth: &UpstreamAuth,
    ) -> Result<Value, GraphError> {
        let target = self.target_url(path, query)?;
        let builder = self.request(Method::GET, target, auth)?;
        self.send(builder, path).await
    }

    async fn post(
        &self,
        path: &str,
        body: &Value,
        auth: &UpstreamAuth,
    ) -> Result<Value, GraphError> {
        let target = self.target_url(path, &[])?;
        let builder = self.request(Method::POST, target, auth)?.json(body);
        self.send(builder, path).await
    }
}

/// Extract a readable message from a Graph error body.
///
/// Graph errors look like `{"error": {"message": "...", "type": "...", "code": 190}}`;
/// anything else is passed through (truncated).
pub fn upstream_message(body: &str) -> String {
    #[derive(Deserialize)]
    struct Envelope {
        error: Detail,
    }

    #[derive(Deserialize)]
    struct Detail {
        message: String,
    }

    match serde_json::from_str::<Envelope>(body) {
        Ok(envelope) => envelope.error.message,
        Err(_) => {
            let trimmed = body.trim();
            if trimmed.is_empty() {
                "<no body>".to_string()
            } else {
                trimmed.chars().take(MAX_ERROR_BODY_CHARS).collect()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConnectorConfig;

    fn direct_client() -> GraphClient {
        GraphClient::new(GraphConfig::default()).expect("client")
    }

    #[test]
    fn upstream_message_prefers_graph_error_message() {
        let body = r#"{"error":{"message":"Invalid OAuth access token.","type":"OAuthException","code":190}}"#;
        assert_eq!(upstream_message(body), "Invalid OAuth access token.");
    }

    #[test]
    fn upstream_message_falls_back_to_raw_body() {
        assert_eq!(upstream_message("  Bad Gateway "), "Bad Gateway");
        assert_eq!(upstream_message(""), "<no body>");
        assert_eq!(upstream_message(&"x".repeat(2000)).len(), MAX_ERROR_BODY_CHARS);
    }

    #[test]
    fn target_url_joins_version_path_and_query() {
        let client = direct_client();
        let url = client
            .target_url(
                "/act_123/campaigns",
                &[("fields".into(), "id,name".into()), ("limit".into(), "25".into())],
            )
            .expect("url");
        assert_eq!(
            url.as_str(),
            "https://graph.facebook.com/v21.0/act_123/campaigns?fields=id%2Cname&limit=25"
        );
    }

    #[test]
    fn bearer_request_carries_access_token() {
        let client = direct_client();
        let target = client.target_url("me", &[]).expect("url");
        let request = client
            .request(Method::GET, target, &UpstreamAuth::Bearer("tok-1".into()))
            .expect("builder")
            .build()
            .expect("request");
        assert_eq!(request.url().as_str(), "https://graph.facebook.com/v21.0/me");
        assert_eq!(request.headers()["authorization"], "Bearer tok-1");
    }

    #[test]
    fn connector_request_is_rewritten_through_proxy() {
        let client = GraphClient::new(GraphConfig {
            connector: Some(ConnectorConfig {
                api_url: "https://api.pipedream.com/".into(),
                project_id: "proj_9".into(),
                environment: "production".into(),
                api_key: "pd-key".into(),
                app: "facebook_marketing".into(),
                account_id: Some("apn_1".into()),
            }),
            ..GraphConfig::default()
        })
        .expect("client");

        let target = client.target_url("123", &[("fields".into(), "id".into())]).expect("url");
        let encoded = URL_SAFE_NO_PAD.encode(target.as_str());
        let request = client
            .request(
                Method::GET,
                target,
                &UpstreamAuth::Connector {
                    external_user_id: "alice".into(),
                },
            )
            .expect("builder")
            .build()
            .expect("request");

        assert_eq!(
            request.url().as_str(),
            format!(
                "https://api.pipedream.com/v1/connect/proj_9/proxy/{encoded}?external_user_id=alice&account_id=apn_1"
            )
        );
        assert_eq!(request.headers()["authorization"], "Bearer pd-key");
        assert_eq!(request.headers()["x-pd-environment"], "production");
    }

    #[test]
    fn connector_auth_without_connector_config_is_rejected() {
        let client = direct_client();
        let target = client.target_url("me", &[]).expect("url");
        let err = client
            .request(
                Method::GET,
                target,
                &UpstreamAuth::Connector {
                    external_user_id: "alice".into(),
                },
            )
            .expect_err("should fail");
        assert!(matches!(err, GraphError::Config(_)));
    }

    #[test]
    fn upstream_auth_debug_redacts_token() {
        let rendered = format!("{:?}", UpstreamAuth::Bearer("secret-token".into()));
        assert!(!rendered.contains("secret-token"));
    }
}
