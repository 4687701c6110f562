//! # meta_ads_api
//!
//! HTTP surface for Meta Ads MCP: the JSON-RPC endpoint, the Meta OAuth
//! flow and a per-user connection status probe.

pub mod config;
pub mod error;
pub mod handlers;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};

use meta_ads_core::auth::TokenStore;
use meta_ads_mcp::Dispatcher;

use crate::handlers::{health, mcp, oauth, status};

pub const ROUTE_HEALTH: &str = "/health";
pub const ROUTE_MCP: &str = "/mcp";
pub const ROUTE_AUTH_START: &str = "/auth/meta";
pub const ROUTE_AUTH_CALLBACK: &str = "/auth/meta/callback";
pub const ROUTE_AUTH_STATUS: &str = "/auth/status/{user_id}";

/// Shared application state passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Per-user Meta credentials.
    pub tokens: Arc<TokenStore>,
    /// JSON-RPC dispatcher behind `POST /mcp`.
    pub dispatcher: Arc<Dispatcher>,
}

/// Builds the Axum router with all routes and shared state.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route(ROUTE_HEALTH, get(health::health))
        .route(ROUTE_MCP, post(mcp::mcp_handler))
        .route(ROUTE_AUTH_START, get(oauth::start_handler))
        .route(ROUTE_AUTH_CALLBACK, get(oauth::callback_handler))
        .route(ROUTE_AUTH_STATUS, get(status::status_handler))
        .fallback(error::not_found)
        .layer(cors)
        .with_state(state)
}
