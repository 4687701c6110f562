// @zen-component: GRAPH-ConnectAccounts
//
//! Pipedream Connect account lookup.
//!
//! In connector mode the connector owns the Meta tokens, so a user counts as
//! authenticated when the project holds a connected Meta account for their
//! external user id. Users without one are handed a Connect link.

use async_trait::async_trait;
use reqwest::Method;
use serde_json::{Value, json};
use tracing::debug;
use url::Url;

use crate::config::ConnectorConfig;
use crate::graph::{GraphClient, GraphError};

/// Connected-account queries against the connector.
#[async_trait]
pub trait ConnectedAccounts: Send + Sync {
    /// Whether a Meta account is connected for `external_user_id`.
    async fn is_connected(&self, external_user_id: &str) -> Result<bool, GraphError>;

    /// Short-lived link the user opens to connect their Meta account.
    async fn connect_url(&self, external_user_id: &str) -> Result<String, GraphError>;
}

// =============================================================================
// Pipedream Connect REST API
// =============================================================================

impl GraphClient {
    fn connector(&self) -> Result<&ConnectorConfig, GraphError> {
        self.config
            .connector
            .as_ref()
            .ok_or_else(|| GraphError::Config("no connector is configured".into()))
    }

    /// `{api}/v1/connect/{project}/{tail}`.
    pub fn connect_endpoint(&self, tail: &str) -> Result<Url, GraphError> {
        let connector = self.connector()?;
        let raw = format!(
            "{}/v1/connect/{}/{}",
            connector.api_url.trim_end_matches('/'),
            connector.project_id,
            tail
        );
        Url::parse(&raw).map_err(|e| GraphError::Config(format!("invalid connector URL: {e}")))
    }

    fn connect_request(&self, method: Method, url: Url) -> Result<reqwest::RequestBuilder, GraphError> {
        let connector = self.connector()?;
        Ok(self
            .http
            .request(method, url)
            .bearer_auth(&connector.api_key)
            .header("x-pd-environment", &connector.environment))
    }
}

#[async_trait]
impl ConnectedAccounts for GraphClient {
    async fn is_connected(&self, external_user_id: &str) -> Result<bool, GraphError> {
        let connector = self.connector()?;
        let mut url = self.connect_endpoint("accounts")?;
        url.query_pairs_mut()
            .append_pair("external_user_id", external_user_id)
            .append_pair("app", &connector.app);

        let body = self.send(self.connect_request(Method::GET, url)?, "connect/accounts").await?;
        let connected = has_account(&body, connector.account_id.as_deref());
        debug!(external_user_id, connected, "checked connected accounts");
        Ok(connected)
    }

    async fn connect_url(&self, external_user_id: &str) -> Result<String, GraphError> {
        let connector = self.connector()?;
        let url = self.connect_endpoint("tokens")?;
        let builder = self
            .connect_request(Method::POST, url)?
            .json(&json!({"external_user_id": external_user_id}));

        let body = self.send(builder, "connect/tokens").await?;
        let link = body
            .get("connect_link_url")
            .and_then(Value::as_str)
            .ok_or_else(|| GraphError::Decode("connect token response has no connect_link_url".into()))?;
        let mut link = Url::parse(link).map_err(|e| GraphError::Decode(format!("invalid connect link: {e}")))?;
        link.query_pairs_mut().append_pair("app", &connector.app);
        Ok(link.into())
    }
}

/// `{"data": [{"id": ..}, ..]}`; a pinned account id must be among them.
fn has_account(body: &Value, pinned: Option<&str>) -> bool {
    let Some(accounts) = body.get("data").and_then(Value::as_array) else {
        return false;
    };
    match pinned {
        Some(id) => accounts.iter().any(|a| a.get("id").and_then(Value::as_str) == Some(id)),
        None => !accounts.is_empty(),
    }
}
