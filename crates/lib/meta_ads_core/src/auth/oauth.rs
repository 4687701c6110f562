// @zen-component: AUTH-MetaOAuth
//
//! Meta OAuth support.
//!
//! Builds the login dialog URL, exchanges authorization codes for access
//! tokens, and renews tokens through Meta's `fb_exchange_token` grant.

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, warn};
use url::Url;

use super::{AuthError, TokenGrant};
use crate::config::OAuthConfig;
use crate::graph::upstream_message;

/// OAuth operations the token lifecycle depends on.
#[async_trait]
pub trait OAuthProvider: Send + Sync {
    /// Login dialog URL carrying `state` back to the callback.
    fn authorization_url(&self, state: &str) -> String;

    /// Exchange an authorization code (authorization-code grant).
    async fn exchange_code(&self, code: &str) -> Result<TokenGrant, AuthError>;

    /// Obtain a fresh token from a stored refresh basis.
    async fn refresh(&self, refresh_basis: &str) -> Result<TokenGrant, AuthError>;
}

/// reqwest-backed [`OAuthProvider`] for Meta.
pub struct MetaOAuthClient {
    http: Client,
    config: OAuthConfig,
    dialog_endpoint: Url,
    token_endpoint: Url,
}

impl MetaOAuthClient {
    pub fn new(config: OAuthConfig) -> Result<Self, AuthError> {
        let dialog_raw = format!(
            "{}/{}/dialog/oauth",
            config.dialog_url.trim_end_matches('/'),
            config.api_version
        );
        let token_raw = format!(
            "{}/{}/oauth/access_token",
            config.graph_url.trim_end_matches('/'),
            config.api_version
        );
        let dialog_endpoint = Url::parse(&dialog_raw)
            .map_err(|e| AuthError::Config(format!("invalid dialog URL {dialog_raw}: {e}")))?;
        let token_endpoint = Url::parse(&token_raw)
            .map_err(|e| AuthError::Config(format!("invalid token URL {token_raw}: {e}")))?;
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| AuthError::Config(format!("HTTP client build failed: {e}")))?;

        Ok(Self {
            http,
            config,
            dialog_endpoint,
            token_endpoint,
        })
    }

    pub fn config(&self) -> &OAuthConfig {
        &self.config
    }

    /// Call the token endpoint; errors are returned as plain messages so the
    /// caller can pick the error kind.
    async fn request_token(&self, params: &[(&str, &str)], what: &str) -> Result<TokenGrant, String> {
        let resp = self
            .http
            .get(self.token_endpoint.clone())
            .query(params)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    format!("{what} timed out: {e}")
                } else {
                    format!("{what} failed: {e}")
                }
            })?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(format!("{what} HTTP {status}: {}", upstream_message(&body)));
        }

        resp.json::<TokenGrant>()
            .await
            .map_err(|e| format!("{what} response parse error: {e}"))
    }
}

#[async_trait]
impl OAuthProvider for MetaOAuthClient {
    fn authorization_url(&self, state: &str) -> String {
        let mut url = self.dialog_endpoint.clone();
        url.query_pairs_mut()
            .append_pair("client_id", &self.config.app_id)
            .append_pair("redirect_uri", &self.config.redirect_uri)
            .append_pair("state", state)
            .append_pair("scope", &self.config.scopes.join(","))
            .append_pair("response_type", "code");
        url.into()
    }

    async fn exchange_code(&self, code: &str) -> Result<TokenGrant, AuthError> {
        let params = [
            ("client_id", self.config.app_id.as_str()),
            ("client_secret", self.config.app_secret.as_str()),
            ("redirect_uri", self.config.redirect_uri.as_str()),
            ("code", code),
        ];
        let grant = self
            .request_token(&params, "Token exchange")
            .await
            .map_err(|msg| {
                warn!(error = %msg, "authorization code exchange rejected");
                AuthError::ExchangeFailed(msg)
            })?;
        debug!(expires_in = ?grant.expires_in, "authorization code exchanged");
        Ok(grant)
    }

    async fn refresh(&self, refresh_basis: &str) -> Result<TokenGrant, AuthError> {
        let params = [
            ("grant_type", "fb_exchange_token"),
            ("client_id", self.config.app_id.as_str()),
            ("client_secret", self.config.app_secret.as_str()),
            ("fb_exchange_token", refresh_basis),
        ];
        let grant = self
            .request_token(&params, "Token refresh")
            .await
            .map_err(|msg| {
                warn!(error = %msg, "token refresh rejected");
                AuthError::RefreshFailed(msg)
            })?;
        debug!(expires_in = ?grant.expires_in, "token refreshed");
        Ok(grant)
    }
}
