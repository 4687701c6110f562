// @zen-component: MCP-Dispatcher
//
//! JSON-RPC dispatcher.
//!
//! Stateless between requests. `initialize` and `tools/list` are answered
//! from static data; `tools/call` resolves the caller, makes sure a fresh
//! Meta credential is on file, and runs the tool.
//!
//! Missing credentials and upstream failures are reported inside a
//! successful result so conversational clients render them as text. Only
//! envelope problems, unknown methods/tools and internal faults become
//! JSON-RPC errors.


use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::FutureExt;
use rmcp::model::{CallToolResult, Content, ErrorCode};
use serde::Serialize;
use serde_json::{Value, json};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use meta_ads_core::auth::{AuthError, TokenStore, validate_user_id};
use meta_ads_core::connect::ConnectedAccounts;
use meta_ads_core::graph::{GraphApi, UpstreamAuth};

use crate::protocol::{
    CallToolParams, InitializeResult, JSONRPC_VERSION, JsonRpcRequest, JsonRpcResponse,
    ListToolsResult, METHOD_INITIALIZE, METHOD_TOOLS_CALL, METHOD_TOOLS_LIST,
    NOTIFICATION_INITIALIZED, PROTOCOL_VERSION, ServerCapabilities, ServerInfo, ToolsCapability,
};
use crate::tools::{ToolContext, ToolDefaults, ToolError, ToolRegistry};

/// User id used when a request carries none.
pub const DEFAULT_USER_ID: &str = "default";

/// Errors surfaced as JSON-RPC error objects.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("Internal error: unparsable request body: {0}")]
    Parse(String),

    #[error("Internal error: malformed request: {0}")]
    MalformedRequest(String),

    #[error("Method not found")]
    UnknownMethod(String),

    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Invalid params: {0}")]
    InvalidParams(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl DispatchError {
    pub fn code(&self) -> i32 {
        match self {
            DispatchError::UnknownMethod(_) => ErrorCode::METHOD_NOT_FOUND.0,
            DispatchError::UnknownTool(_) | DispatchError::InvalidParams(_) => {
                ErrorCode::INVALID_PARAMS.0
            }
            DispatchError::Parse(_)
            | DispatchError::MalformedRequest(_)
            | DispatchError::Internal(_) => ErrorCode::INTERNAL_ERROR.0,
        }
    }

    fn into_response(self, id: Option<Value>) -> JsonRpcResponse {
        JsonRpcResponse::error(id, self.code(), self.to_string())
    }
}

/// Where upstream credentials come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UpstreamMode {
    /// Tokens from the OAuth flow, kept fresh by the token store.
    #[default]
    Direct,
    /// A connector proxy holds the tokens; the token store is not consulted
    /// and the connector is asked whether the user has a connected account.
    Connector,
}

/// Caller identity candidates extracted by the transport, in precedence order.
#[derive(Debug, Clone, Default)]
pub struct CallerHints {
    /// `X-User-Id` header.
    pub header: Option<String>,
    /// `Authorization: Bearer <id>`.
    pub bearer: Option<String>,
    /// `userId` query parameter.
    pub query: Option<String>,
}

impl CallerHints {
    pub fn user(user_id: impl Into<String>) -> Self {
        Self {
            header: Some(user_id.into()),
            ..Self::default()
        }
    }
}

/// Routes JSON-RPC requests to the handshake, the tool listing, or tools.
pub struct Dispatcher {
    registry: Arc<ToolRegistry>,
    tokens: Arc<TokenStore>,
    graph: Arc<dyn GraphApi>,
    defaults: ToolDefaults,
    connector: Option<Arc<dyn ConnectedAccounts>>,
    default_user_id: String,
}

impl Dispatcher {
    pub fn new(registry: Arc<ToolRegistry>, tokens: Arc<TokenStore>, graph: Arc<dyn GraphApi>) -> Self {
        Self {
            registry,
            tokens,
            graph,
            defaults: ToolDefaults::default(),
            connector: None,
            default_user_id: DEFAULT_USER_ID.to_string(),
        }
    }

    pub fn with_defaults(mut self, defaults: ToolDefaults) -> Self {
        self.defaults = defaults;
        self
    }

    /// Switch to connector mode, checking accounts through `accounts`.
    pub fn with_connector(mut self, accounts: Arc<dyn ConnectedAccounts>) -> Self {
        self.connector = Some(accounts);
        self
    }

    pub fn with_default_user(mut self, user_id: impl Into<String>) -> Self {
        self.default_user_id = user_id.into();
        self
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub fn mode(&self) -> UpstreamMode {
        if self.connector.is_some() {
            UpstreamMode::Connector
        } else {
            UpstreamMode::Direct
        }
    }

    /// Handle a raw request body. `None` means no response body (notification).
    pub async fn handle_body(&self, body: &[u8], hints: &CallerHints) -> Option<JsonRpcResponse> {
        let value: Value = match serde_json::from_slice(body) {
            Ok(value) => value,
            Err(e) => {
                debug!(error = %e, "unparsable JSON-RPC body");
                return Some(DispatchError::Parse(e.to_string()).into_response(None));
            }
        };

        let id = match &value {
            Value::Object(map) => map.get("id").filter(|id| !id.is_null()).cloned(),
            Value::Array(_) => {
                return Some(
                    DispatchError::MalformedRequest("batch requests are not supported".into())
                        .into_response(None),
                );
            }
            _ => None,
        };

        match serde_json::from_value::<JsonRpcRequest>(value) {
            Ok(request) => self.dispatch(request, hints).await,
            Err(e) => Some(DispatchError::MalformedRequest(e.to_string()).into_response(id)),
        }
    }

    /// Dispatch a parsed request. Panics inside handlers are reported as
    /// internal errors.
    pub async fn dispatch(&self, request: JsonRpcRequest, hints: &CallerHints) -> Option<JsonRpcResponse> {
        let id = request.id.clone();
        let notification = request.is_notification();
        let method = request.method.clone();

        let outcome = match AssertUnwindSafe(self.route(request, hints)).catch_unwind().await {
            Ok(outcome) => outcome,
            Err(panic) => {
                let details = panic_message(panic.as_ref());
                error!(method = %method, details = %details, "dispatch panicked");
                Err(DispatchError::Internal(details))
            }
        };

        match outcome {
            Ok(Some(result)) => Some(JsonRpcResponse::success(id, result)),
            Ok(None) => None,
            Err(e) if notification => {
                debug!(method = %method, error = %e, "dropping error for notification");
                None
            }
            Err(e) => {
                debug!(method = %method, code = e.code(), error = %e, "request failed");
                Some(e.into_response(id))
            }
        }
    }

    async fn route(&self, request: JsonRpcRequest, hints: &CallerHints) -> Result<Option<Value>, DispatchError> {
        if request.jsonrpc != JSONRPC_VERSION {
            return Err(DispatchError::MalformedRequest(format!(
                "unsupported jsonrpc version {:?}",
                request.jsonrpc
            )));
        }

        match request.method.as_str() {
            METHOD_INITIALIZE => to_json(&initialize_result()).map(Some),
            METHOD_TOOLS_LIST => to_json(&ListToolsResult {
                tools: self.registry.definitions(),
            })
            .map(Some),
            METHOD_TOOLS_CALL => self.call_tool(request.params, hints).await.map(Some),
            NOTIFICATION_INITIALIZED => {
                debug!("client initialized");
                Ok(None)
            }
            method if request.is_notification() => {
                debug!(method, "ignoring notification");
                Ok(None)
            }
            method => Err(DispatchError::UnknownMethod(method.to_string())),
        }
    }

    async fn call_tool(&self, params: Option<Value>, hints: &CallerHints) -> Result<Value, DispatchError> {
        let params: CallToolParams = serde_json::from_value(params.unwrap_or(Value::Null))
            .map_err(|e| DispatchError::InvalidParams(e.to_string()))?;
        let tool = self
            .registry
            .get(&params.name)
            .ok_or_else(|| DispatchError::UnknownTool(params.name.clone()))?;
        let user_id = self.resolve_user(hints)?;

        let auth = match &self.connector {
            None => match self.tokens.ensure_fresh(&user_id).await {
                Ok(credential) => UpstreamAuth::Bearer(credential.access_token),
                Err(e @ (AuthError::NotAuthenticated { .. } | AuthError::RefreshFailed(_))) => {
                    info!(user_id = %user_id, tool = %params.name, reason = %e, "authentication required");
                    return self.auth_prompt(&user_id, &e);
                }
                Err(e) => return Err(DispatchError::Internal(e.to_string())),
            },
            Some(accounts) => match accounts.is_connected(&user_id).await {
                Ok(true) => UpstreamAuth::Connector {
                    external_user_id: user_id.clone(),
                },
                Ok(false) => {
                    info!(user_id = %user_id, tool = %params.name, "no connected account");
                    return match accounts.connect_url(&user_id).await {
                        Ok(url) => prompt(NOT_CONNECTED, &url),
                        Err(e) => tool_failure(&params.name, &ToolError::Upstream(e)),
                    };
                }
                Err(e) => {
                    warn!(user_id = %user_id, tool = %params.name, error = %e, "connected account lookup failed");
                    return tool_failure(&params.name, &ToolError::Upstream(e));
                }
            },
        };

        let ctx = ToolContext {
            graph: self.graph.as_ref(),
            auth: &auth,
            defaults: &self.defaults,
        };

        info!(user_id = %user_id, tool = %params.name, "calling tool");
        match tool.execute(&ctx, params.arguments).await {
            Ok(value) => {
                let text = serde_json::to_string_pretty(&value)
                    .map_err(|e| DispatchError::Internal(e.to_string()))?;
                to_json(&CallToolResult::success(vec![Content::text(text)]))
            }
            Err(e) => {
                warn!(user_id = %user_id, tool = %params.name, error = %e, "tool call failed");
                tool_failure(&params.name, &e)
            }
        }
    }

    /// First non-empty hint wins; otherwise the default user.
    fn resolve_user(&self, hints: &CallerHints) -> Result<String, DispatchError> {
        let candidate = [&hints.header, &hints.bearer, &hints.query]
            .into_iter()
            .flatten()
            .map(|s| s.trim())
            .find(|s| !s.is_empty())
            .unwrap_or(self.default_user_id.as_str());
        validate_user_id(candidate)
            .map(str::to_string)
            .map_err(|e| DispatchError::InvalidParams(e.to_string()))
    }

    fn auth_prompt(&self, user_id: &str, reason: &AuthError) -> Result<Value, DispatchError> {
        let url = self.tokens.provider().authorization_url(user_id);
        let headline = match reason {
            AuthError::RefreshFailed(_) => SESSION_EXPIRED,
            _ => NOT_CONNECTED,
        };
        prompt(headline, &url)
    }
}

const NOT_CONNECTED: &str = "Meta Ads is not connected yet.";
const SESSION_EXPIRED: &str =
    "Your Meta Ads session has expired and could not be renewed automatically.";

/// Successful result asking the user to (re)connect their account.
fn prompt(headline: &str, url: &str) -> Result<Value, DispatchError> {
    let text = format!(
        "{headline}\n\nTo connect your Meta Ads account, open this link and approve access:\n{url}\n\nThen run your request again."
    );
    to_json(&CallToolResult::success(vec![Content::text(text)]))
}

/// Fixed handshake payload.
pub fn initialize_result() -> InitializeResult {
    InitializeResult {
        protocol_version: PROTOCOL_VERSION,
        capabilities: ServerCapabilities {
            tools: ToolsCapability {
                list_changed: false,
            },
        },
        server_info: ServerInfo {
            name: crate::SERVER_NAME,
            version: crate::version(),
        },
    }
}

/// In-band failure result: the client sees it as tool output, not a protocol error.
fn tool_failure(tool: &str, e: &ToolError) -> Result<Value, DispatchError> {
    let body = json!({
        "error": true,
        "tool": tool,
        "message": e.to_string(),
        "timestamp": chrono::Utc::now().to_rfc3339(),
    });
    let text = serde_json::to_string_pretty(&body).map_err(|e| DispatchError::Internal(e.to_string()))?;
    to_json(&CallToolResult::error(vec![Content::text(text)]))
}

fn to_json<T: Serialize>(value: &T) -> Result<Value, DispatchError> {
    serde_json::to_value(value).map_err(|e| DispatchError::Internal(e.to_string()))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "handler panicked".to_string()
    }
}
