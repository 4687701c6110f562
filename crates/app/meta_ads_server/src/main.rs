//! Meta Ads MCP server binary.
//!
//! Serves the MCP endpoint and the Meta OAuth flow over HTTP. Every option
//! can be set through the environment (or a `.env` file).

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use meta_ads_api::{AppState, config::ApiConfig};
use meta_ads_core::auth::{MetaOAuthClient, TokenStore};
use meta_ads_core::config::{
    ConnectorConfig, DEFAULT_API_VERSION, DEFAULT_CONNECTOR_API_URL, DEFAULT_CONNECTOR_APP,
    DEFAULT_DIALOG_URL, DEFAULT_GRAPH_URL, GraphConfig, OAuthConfig,
};
use meta_ads_core::graph::GraphClient;
use meta_ads_mcp::dispatcher::DEFAULT_USER_ID;
use meta_ads_mcp::{Dispatcher, ToolDefaults, ToolRegistry};

/// CLI arguments for the server.
#[derive(Parser, Debug)]
#[command(name = "meta_ads_server", about = "Meta Ads MCP server")]
struct Args {
    /// Port to listen on.
    #[arg(long, env = "PORT", default_value_t = 3000)]
    port: u16,

    /// Interface to bind.
    #[arg(long, env = "BIND_HOST", default_value = "0.0.0.0")]
    host: String,

    /// Meta app id (OAuth client id).
    #[arg(long, env = "META_APP_ID")]
    app_id: String,

    /// Meta app secret.
    #[arg(long, env = "META_APP_SECRET", hide_env_values = true)]
    app_secret: String,

    /// Redirect URI registered with the Meta app, normally `<public url>/auth/meta/callback`.
    #[arg(long, env = "META_REDIRECT_URI")]
    redirect_uri: String,

    /// Comma-separated OAuth scopes.
    #[arg(
        long,
        env = "META_SCOPES",
        value_delimiter = ',',
        default_value = "ads_read,ads_management,business_management"
    )]
    scopes: Vec<String>,

    #[arg(long, env = "META_API_VERSION", default_value = DEFAULT_API_VERSION)]
    api_version: String,

    #[arg(long, env = "META_GRAPH_URL", default_value = DEFAULT_GRAPH_URL)]
    graph_url: String,

    #[arg(long, env = "META_DIALOG_URL", default_value = DEFAULT_DIALOG_URL)]
    dialog_url: String,

    /// Ad account used when a tool call names none.
    #[arg(long, env = "META_AD_ACCOUNT_ID")]
    ad_account_id: Option<String>,

    /// Timeout for every upstream request, in seconds.
    #[arg(long, env = "UPSTREAM_TIMEOUT_SECS", default_value_t = 30)]
    upstream_timeout_secs: u64,

    /// User id for requests that carry none.
    #[arg(long, env = "DEFAULT_USER_ID", default_value = DEFAULT_USER_ID)]
    default_user_id: String,

    /// Pipedream Connect API key. Together with the project id, switches to connector mode.
    #[arg(long, env = "PIPEDREAM_API_KEY", hide_env_values = true)]
    pipedream_api_key: Option<String>,

    #[arg(long, env = "PIPEDREAM_PROJECT_ID")]
    pipedream_project_id: Option<String>,

    #[arg(long, env = "PIPEDREAM_ENVIRONMENT", default_value = "production")]
    pipedream_environment: String,

    #[arg(long, env = "PIPEDREAM_API_URL", default_value = DEFAULT_CONNECTOR_API_URL)]
    pipedream_api_url: String,

    /// Pipedream app slug of the connected Meta accounts.
    #[arg(long, env = "PIPEDREAM_APP", default_value = DEFAULT_CONNECTOR_APP)]
    pipedream_app: String,

    /// Connected account to proxy through; Pipedream picks the user's account when unset.
    #[arg(long, env = "PIPEDREAM_ACCOUNT_ID")]
    pipedream_account_id: Option<String>,
}

impl Args {
    fn connector(&self) -> Option<ConnectorConfig> {
        let (Some(api_key), Some(project_id)) = (&self.pipedream_api_key, &self.pipedream_project_id) else {
            return None;
        };
        Some(ConnectorConfig {
            api_url: self.pipedream_api_url.clone(),
            project_id: project_id.clone(),
            environment: self.pipedream_environment.clone(),
            api_key: api_key.clone(),
            app: self.pipedream_app.clone(),
            account_id: self.pipedream_account_id.clone(),
        })
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new(
                    "info,meta_ads_api=debug,meta_ads_core=debug,meta_ads_mcp=debug",
                )
            }),
        )
        .init();

    let args = Args::parse();
    let timeout = Duration::from_secs(args.upstream_timeout_secs);

    let mut oauth = OAuthConfig::new(&args.app_id, &args.app_secret, &args.redirect_uri);
    oauth.scopes = args
        .scopes
        .iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();
    oauth.api_version = args.api_version.clone();
    oauth.graph_url = args.graph_url.clone();
    oauth.dialog_url = args.dialog_url.clone();
    oauth.timeout = timeout;

    let connector = args.connector();
    let connector_mode = connector.is_some();
    if args.pipedream_api_key.is_some() != args.pipedream_project_id.is_some() {
        warn!("PIPEDREAM_API_KEY and PIPEDREAM_PROJECT_ID must both be set for connector mode; using direct OAuth");
    }

    let graph = Arc::new(GraphClient::new(GraphConfig {
        graph_url: args.graph_url.clone(),
        api_version: args.api_version.clone(),
        timeout,
        connector,
    })?);
    let provider = MetaOAuthClient::new(oauth)?;
    let tokens = Arc::new(TokenStore::in_memory(Arc::new(provider)));

    let registry = ToolRegistry::meta_ads()?;
    info!(tools = registry.len(), "tool registry ready");

    let mut dispatcher = Dispatcher::new(Arc::new(registry), tokens.clone(), graph.clone())
        .with_defaults(ToolDefaults {
            ad_account_id: args.ad_account_id.clone(),
        })
        .with_default_user(args.default_user_id.clone());
    if connector_mode {
        dispatcher = dispatcher.with_connector(graph);
    }
    info!(mode = ?dispatcher.mode(), "dispatcher ready");

    let config = ApiConfig::new(&args.host, args.port);
    let state = AppState {
        tokens,
        dispatcher: Arc::new(dispatcher),
    };
    let app = meta_ads_api::router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    let local_addr = listener.local_addr()?;
    info!(addr = %local_addr, api_version = %args.api_version, "Meta Ads MCP listening");

    let ct = CancellationToken::new();
    tokio::spawn({
        let ct = ct.clone();
        async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "failed to listen for Ctrl-C");
                return;
            }
            info!("shutdown requested");
            ct.cancel();
        }
    });

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { ct.cancelled().await })
        .await?;

    info!("server stopped");
    Ok(())
}
