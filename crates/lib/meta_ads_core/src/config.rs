//! Typed configuration for the OAuth provider and the Graph API client.
//!
//! Nothing in this crate reads the environment; the server binary resolves
//! these values from flags / env vars and hands them in.

use std::fmt;
use std::time::Duration;

/// Graph API version used when none is configured.
pub const DEFAULT_API_VERSION: &str = "v21.0";

/// Graph API host.
pub const DEFAULT_GRAPH_URL: &str = "https://graph.facebook.com";

/// Host serving the OAuth login dialog.
pub const DEFAULT_DIALOG_URL: &str = "https://www.facebook.com";

/// Pipedream API host used in connector mode.
pub const DEFAULT_CONNECTOR_API_URL: &str = "https://api.pipedream.com";

/// Pipedream app slug for Meta Ads.
pub const DEFAULT_CONNECTOR_APP: &str = "facebook_marketing";

/// Upstream timeout applied when none is configured.
pub const DEFAULT_UPSTREAM_TIMEOUT: Duration = Duration::from_secs(30);

/// Scopes requested from the login dialog by default.
pub const DEFAULT_SCOPES: &[&str] = &["ads_read", "ads_management", "business_management"];

/// OAuth application settings for the Meta login dialog and token endpoint.
#[derive(Clone)]
pub struct OAuthConfig {
    /// Meta app id (`client_id`).
    pub app_id: String,
    /// Meta app secret (`client_secret`).
    pub app_secret: String,
    /// Redirect URI registered with the app; must point at `/auth/meta/callback`.
    pub redirect_uri: String,
    pub scopes: Vec<String>,
    pub api_version: String,
    pub graph_url: String,
    pub dialog_url: String,
    pub timeout: Duration,
}

impl OAuthConfig {
    /// Config with default hosts, version, scopes and timeout.
    pub fn new(
        app_id: impl Into<String>,
        app_secret: impl Into<String>,
        redirect_uri: impl Into<String>,
    ) -> Self {
        Self {
            app_id: app_id.into(),
            app_secret: app_secret.into(),
            redirect_uri: redirect_uri.into(),
            scopes: DEFAULT_SCOPES.iter().map(|s| s.to_string()).collect(),
            api_version: DEFAULT_API_VERSION.to_string(),
            graph_url: DEFAULT_GRAPH_URL.to_string(),
            dialog_url: DEFAULT_DIALOG_URL.to_string(),
            timeout: DEFAULT_UPSTREAM_TIMEOUT,
        }
    }
}

impl fmt::Debug for OAuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuthConfig")
            .field("app_id", &self.app_id)
            .field("app_secret_set", &!self.app_secret.is_empty())
            .field("redirect_uri", &self.redirect_uri)
            .field("scopes", &self.scopes)
            .field("api_version", &self.api_version)
            .field("graph_url", &self.graph_url)
            .field("dialog_url", &self.dialog_url)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Settings for calls against the Graph API.
#[derive(Clone, Debug)]
pub struct GraphConfig {
    pub graph_url: String,
    pub api_version: String,
    pub timeout: Duration,
    /// Present when upstream calls go through a Pipedream Connect proxy.
    pub connector: Option<ConnectorConfig>,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            graph_url: DEFAULT_GRAPH_URL.to_string(),
            api_version: DEFAULT_API_VERSION.to_string(),
            timeout: DEFAULT_UPSTREAM_TIMEOUT,
            connector: None,
        }
    }
}

/// Pipedream Connect credentials. The connector holds the Meta tokens on
/// the server's behalf and proxies Graph API requests.
#[derive(Clone)]
pub struct ConnectorConfig {
    pub api_url: String,
    pub project_id: String,
    /// `development` or `production`.
    pub environment: String,
    pub api_key: String,
    /// App slug the connected accounts belong to.
    pub app: String,
    /// Connected account id, when the project pins one.
    pub account_id: Option<String>,
}

impl fmt::Debug for ConnectorConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectorConfig")
            .field("api_url", &self.api_url)
            .field("project_id", &self.project_id)
            .field("environment", &self.environment)
            .field("api_key_set", &!self.api_key.is_empty())
            .field("app", &self.app)
            .field("account_id", &self.account_id)
            .finish()
    }
}
