// @zen-component: MCP-ToolRegistry
//
//! Tool registry and the Meta Ads tool executors.
//!
//! The registry is built once at startup and never mutated afterwards.
//! Registration order is the order `tools/list` reports.

pub mod get;
pub mod query;
pub mod report;
pub mod summary;

use std::sync::Arc;

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use thiserror::Error;

use meta_ads_core::graph::{GraphApi, GraphError, UpstreamAuth};

use crate::protocol::ToolDefinition;

pub const GET_TOOL: &str = "meta_ads_get";
pub const QUERY_TOOL: &str = "meta_ads_query";
pub const REPORT_TOOL: &str = "meta_ads_report";

/// Errors raised while executing a tool.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    #[error(transparent)]
    Upstream(#[from] GraphError),
}

/// Registry construction errors.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Duplicate tool name: {0}")]
    DuplicateTool(String),
}

/// Server-wide defaults applied to tool arguments.
#[derive(Debug, Clone, Default)]
pub struct ToolDefaults {
    /// Ad account used when a call omits `account_id`.
    pub ad_account_id: Option<String>,
}

/// Everything an executor needs besides its arguments.
pub struct ToolContext<'a> {
    pub graph: &'a dyn GraphApi,
    pub auth: &'a UpstreamAuth,
    pub defaults: &'a ToolDefaults,
}

/// A tool implementation: arguments + credential in, JSON out.
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    async fn execute(&self, ctx: &ToolContext<'_>, arguments: Value) -> Result<Value, ToolError>;
}

/// A registered tool: its listing entry plus executor.
pub struct RegisteredTool {
    definition: ToolDefinition,
    executor: Arc<dyn ToolExecutor>,
}

impl RegisteredTool {
    pub fn definition(&self) -> &ToolDefinition {
        &self.definition
    }

    pub async fn execute(&self, ctx: &ToolContext<'_>, arguments: Value) -> Result<Value, ToolError> {
        self.executor.execute(ctx, arguments).await
    }
}

/// Ordered name → tool mapping with unique names.
#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<RegisteredTool>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The three Meta Ads tools, in listing order.
    pub fn meta_ads() -> Result<Self, RegistryError> {
        let mut registry = Self::new();
        registry.register(get::definition(), Arc::new(get::GetTool))?;
        registry.register(query::definition(), Arc::new(query::QueryTool))?;
        registry.register(report::definition(), Arc::new(report::ReportTool))?;
        Ok(registry)
    }

    /// Add a tool. Fails if the name is already taken.
    pub fn register(
        &mut self,
        definition: ToolDefinition,
        executor: Arc<dyn ToolExecutor>,
    ) -> Result<(), RegistryError> {
        if self.get(&definition.name).is_some() {
            return Err(RegistryError::DuplicateTool(definition.name));
        }
        self.tools.push(RegisteredTool {
            definition,
            executor,
        });
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&RegisteredTool> {
        self.tools.iter().find(|t| t.definition.name == name)
    }

    /// Tool definitions in registration order.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(|t| t.definition.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

/// JSON schema for an argument struct.
pub(crate) fn schema_of<T: JsonSchema>() -> Value {
    serde_json::to_value(schemars::schema_for!(T)).unwrap_or_else(|_| json!({"type": "object"}))
}

/// Deserialize tool arguments; a missing argument object counts as `{}`.
pub(crate) fn parse_args<T: DeserializeOwned>(arguments: Value) -> Result<T, ToolError> {
    let arguments = if arguments.is_null() { json!({}) } else { arguments };
    serde_json::from_value(arguments).map_err(|e| ToolError::InvalidArguments(e.to_string()))
}

/// Graph object ids go into the URL path, so only plain id characters pass.
pub(crate) fn validate_object_id(id: &str) -> Result<&str, ToolError> {
    if id.is_empty() || !id.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(ToolError::InvalidArguments(format!("invalid object id {id:?}")));
    }
    Ok(id)
}

/// Resolve the ad account for a call as `act_<digits>`.
pub(crate) fn resolve_account(
    explicit: Option<&str>,
    defaults: &ToolDefaults,
) -> Result<String, ToolError> {
    let raw = explicit
        .or(defaults.ad_account_id.as_deref())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| {
            ToolError::InvalidArguments(
                "account_id is required (no default ad account configured)".into(),
            )
        })?;
    let digits = raw.strip_prefix("act_").unwrap_or(raw);
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(ToolError::InvalidArguments(format!("invalid ad account id {raw:?}")));
    }
    Ok(format!("act_{digits}"))
}
