//! `meta_ads_report`: insight rows plus an aggregate summary.

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::debug;

use super::summary::summarize;
use super::{REPORT_TOOL, ToolContext, ToolError, ToolExecutor, parse_args, resolve_account, schema_of};
use crate::protocol::ToolDefinition;

pub const DEFAULT_DATE_PRESET: &str = "last_30d";

pub const DEFAULT_METRICS: &[&str] = &["impressions", "clicks", "spend", "ctr", "cpc", "cpm", "reach"];

/// Aggregation level of insight rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Account,
    Campaign,
    Adset,
    Ad,
}

impl Level {
    pub fn as_str(self) -> &'static str {
        match self {
            Level::Account => "account",
            Level::Campaign => "campaign",
            Level::Adset => "adset",
            Level::Ad => "ad",
        }
    }
}

/// Arguments for `meta_ads_report`.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct ReportArgs {
    /// Reporting period, e.g. today, yesterday, last_7d, last_30d (default), this_month.
    #[serde(default)]
    pub date_preset: Option<String>,
    /// Metrics to fetch (default impressions, clicks, spend, ctr, cpc, cpm, reach).
    #[serde(default)]
    pub metrics: Option<Vec<String>>,
    /// Breakdown dimension, e.g. age, gender, country, publisher_platform.
    #[serde(default)]
    pub breakdown: Option<String>,
    /// Row level: account (default), campaign, adset or ad.
    #[serde(default)]
    pub level: Option<Level>,
    /// Ad account id (`act_123` or `123`); defaults to the configured account.
    #[serde(default)]
    pub account_id: Option<String>,
}

pub fn definition() -> ToolDefinition {
    ToolDefinition {
        name: REPORT_TOOL.to_string(),
        description: "Get Meta Ads performance insights for a period, with an aggregate summary of the requested metrics."
            .to_string(),
        input_schema: schema_of::<ReportArgs>(),
    }
}

/// Graph parameter values are lower-case identifiers.
fn identifier(kind: &str, value: &str) -> Result<String, ToolError> {
    let value = value.trim();
    if value.is_empty()
        || !value
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
    {
        return Err(ToolError::InvalidArguments(format!("invalid {kind} {value:?}")));
    }
    Ok(value.to_string())
}

/// Requested metrics, validated and de-duplicated in order.
fn metric_list(requested: Option<Vec<String>>) -> Result<Vec<String>, ToolError> {
    let requested = match requested {
        Some(list) if !list.is_empty() => list,
        _ => DEFAULT_METRICS.iter().map(|m| m.to_string()).collect(),
    };
    let mut metrics: Vec<String> = Vec::with_capacity(requested.len());
    for metric in requested {
        let metric = identifier("metric", &metric)?;
        if !metrics.contains(&metric) {
            metrics.push(metric);
        }
    }
    Ok(metrics)
}

pub struct ReportTool;

#[async_trait]
impl ToolExecutor for ReportTool {
    async fn execute(&self, ctx: &ToolContext<'_>, arguments: Value) -> Result<Value, ToolError> {
        let args: ReportArgs = parse_args(arguments)?;
        let account = resolve_account(args.account_id.as_deref(), ctx.defaults)?;
        let date_preset = identifier(
            "date_preset",
            args.date_preset.as_deref().unwrap_or(DEFAULT_DATE_PRESET),
        )?;
        let metrics = metric_list(args.metrics)?;
        let breakdown = args
            .breakdown
            .as_deref()
            .map(|b| identifier("breakdown", b))
            .transpose()?;
        let level = args.level.unwrap_or(Level::Account);

        let mut query = vec![
            ("fields".to_string(), metrics.join(",")),
            ("date_preset".to_string(), date_preset.clone()),
            ("level".to_string(), level.as_str().to_string()),
        ];
        if let Some(breakdown) = &breakdown {
            query.push(("breakdowns".to_string(), breakdown.clone()));
        }

        let path = format!("{account}/insights");
        debug!(path = %path, date_preset = %date_preset, "fetching insights");
        let response = ctx.graph.get(&path, &query, ctx.auth).await?;

        let rows = response
            .get("data")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        let summary = summarize(&rows, &metrics);

        Ok(json!({
            "account_id": account,
            "date_preset": date_preset,
            "level": level.as_str(),
            "breakdown": breakdown,
            "metrics": metrics,
            "count": rows.len(),
            "data": rows,
            "summary": summary,
        }))
    }
}
