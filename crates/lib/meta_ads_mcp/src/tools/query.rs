//! `meta_ads_query`: list campaigns, ad sets or ads of an ad account.

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::debug;

use super::{QUERY_TOOL, ToolContext, ToolError, ToolExecutor, parse_args, resolve_account, schema_of};
use crate::protocol::ToolDefinition;

pub const DEFAULT_LIMIT: u32 = 25;
pub const MAX_LIMIT: u32 = 500;

/// Collection to list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum CollectionType {
    Campaigns,
    Adsets,
    Ads,
}

impl CollectionType {
    pub fn edge(self) -> &'static str {
        match self {
            CollectionType::Campaigns => "campaigns",
            CollectionType::Adsets => "adsets",
            CollectionType::Ads => "ads",
        }
    }

    pub fn fields(self) -> &'static str {
        match self {
            CollectionType::Campaigns => {
                "id,name,status,effective_status,objective,daily_budget,lifetime_budget,created_time"
            }
            CollectionType::Adsets => {
                "id,name,status,effective_status,campaign_id,daily_budget,optimization_goal,created_time"
            }
            CollectionType::Ads => "id,name,status,effective_status,adset_id,campaign_id,created_time",
        }
    }
}

/// Arguments for `meta_ads_query`.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct QueryArgs {
    /// Collection: campaigns, adsets or ads.
    pub resource_type: CollectionType,
    /// Maximum number of items (default 25, max 500).
    #[serde(default)]
    pub limit: Option<u32>,
    /// Effective status filter, e.g. ACTIVE or PAUSED.
    #[serde(default)]
    pub status: Option<String>,
    /// Ad account id (`act_123` or `123`); defaults to the configured account.
    #[serde(default)]
    pub account_id: Option<String>,
}

pub fn definition() -> ToolDefinition {
    ToolDefinition {
        name: QUERY_TOOL.to_string(),
        description: "List Meta Ads campaigns, ad sets or ads in an ad account, optionally filtered by status."
            .to_string(),
        input_schema: schema_of::<QueryArgs>(),
    }
}

fn status_filter(status: &str) -> Result<String, ToolError> {
    let status = status.trim().to_ascii_uppercase();
    if status.is_empty() || !status.chars().all(|c| c.is_ascii_uppercase() || c == '_') {
        return Err(ToolError::InvalidArguments(format!("invalid status {status:?}")));
    }
    Ok(json!([status]).to_string())
}

pub struct QueryTool;

#[async_trait]
impl ToolExecutor for QueryTool {
    async fn execute(&self, ctx: &ToolContext<'_>, arguments: Value) -> Result<Value, ToolError> {
        let args: QueryArgs = parse_args(arguments)?;
        let account = resolve_account(args.account_id.as_deref(), ctx.defaults)?;
        let limit = args.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);

        let mut query = vec![
            ("fields".to_string(), args.resource_type.fields().to_string()),
            ("limit".to_string(), limit.to_string()),
        ];
        if let Some(status) = args.status.as_deref() {
            query.push(("effective_status".to_string(), status_filter(status)?));
        }

        let path = format!("{account}/{}", args.resource_type.edge());
        debug!(path = %path, limit, "listing objects");
        let response = ctx.graph.get(&path, &query, ctx.auth).await?;

        let data = response.get("data").cloned().unwrap_or_else(|| json!([]));
        let count = data.as_array().map_or(0, Vec::len);
        let mut result = json!({
            "resource_type": args.resource_type.edge(),
            "account_id": account,
            "count": count,
            "data": data,
        });
        if let Some(paging) = response.get("paging") {
            result["paging"] = paging.clone();
        }
        Ok(result)
    }
}
