//! `meta_ads_get`: fetch one campaign, ad set or ad by id.

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use super::{GET_TOOL, ToolContext, ToolError, ToolExecutor, parse_args, schema_of, validate_object_id};
use crate::protocol::ToolDefinition;

/// Kind of object to fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ObjectType {
    Campaign,
    Adset,
    Ad,
}

impl ObjectType {
    /// Field projection requested from the Graph API.
    pub fn fields(self) -> &'static str {
        match self {
            ObjectType::Campaign => {
                "id,name,status,effective_status,objective,daily_budget,lifetime_budget,budget_remaining,start_time,stop_time,created_time,updated_time"
            }
            ObjectType::Adset => {
                "id,name,status,effective_status,campaign_id,daily_budget,lifetime_budget,optimization_goal,billing_event,bid_amount,targeting,start_time,end_time,created_time"
            }
            ObjectType::Ad => {
                "id,name,status,effective_status,adset_id,campaign_id,creative{id,name,title,body},created_time,updated_time"
            }
        }
    }
}

/// Arguments for `meta_ads_get`.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct GetArgs {
    /// Object type: campaign, adset or ad.
    pub resource_type: ObjectType,
    /// Graph object id.
    pub id: String,
}

pub fn definition() -> ToolDefinition {
    ToolDefinition {
        name: GET_TOOL.to_string(),
        description: "Get a single Meta Ads campaign, ad set or ad by id.".to_string(),
        input_schema: schema_of::<GetArgs>(),
    }
}

pub struct GetTool;

#[async_trait]
impl ToolExecutor for GetTool {
    async fn execute(&self, ctx: &ToolContext<'_>, arguments: Value) -> Result<Value, ToolError> {
        let args: GetArgs = parse_args(arguments)?;
        let id = validate_object_id(&args.id)?;
        debug!(resource_type = ?args.resource_type, id, "fetching object");

        let query = [("fields".to_string(), args.resource_type.fields().to_string())];
        Ok(ctx.graph.get(id, &query, ctx.auth).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::ToolDefaults;
    use crate::tools::testing::{RecordingGraph, bearer};
    use serde_json::json;

    #[tokio::test]
    async fn fetches_object_with_fixed_projection() {
        let graph = RecordingGraph::ok(json!({"id": "42", "name": "Spring"}));
        let auth = bearer();
        let defaults = ToolDefaults::default();
        let ctx = ToolContext {
            graph: &graph,
            auth: &auth,
            defaults: &defaults,
        };

        let result = GetTool
            .execute(&ctx, json!({"resource_type": "adset", "id": "42"}))
            .await
            .expect("get");

        assert_eq!(result["name"], "Spring");
        let (path, _) = graph.last_call();
        assert_eq!(path, "42");
        assert_eq!(graph.query_value("fields").as_deref(), Some(ObjectType::Adset.fields()));
    }

    #[tokio::test]
    async fn rejects_unknown_resource_type() {
        let graph = RecordingGraph::ok(json!({}));
        let auth = bearer();
        let defaults = ToolDefaults::default();
        let ctx = ToolContext {
            graph: &graph,
            auth: &auth,
            defaults: &defaults,
        };

        let err = GetTool
            .execute(&ctx, json!({"resource_type": "campaigns", "id": "42"}))
            .await
            .expect_err("invalid");
        assert!(matches!(err, ToolError::InvalidArguments(_)));
        assert!(graph.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn upstream_failure_is_propagated() {
        let graph = RecordingGraph::failing(400, "Unsupported get request.");
        let auth = bearer();
        let defaults = ToolDefaults::default();
        let ctx = ToolContext {
            graph: &graph,
            auth: &auth,
            defaults: &defaults,
        };

        let err = GetTool
            .execute(&ctx, json!({"resource_type": "ad", "id": "7"}))
            .await
            .expect_err("upstream");
        assert!(matches!(err, ToolError::Upstream(_)));
    }
}
