//! Aggregate summary over insight rows.
//!
//! Rate metrics (ctr, cpc, cpm) are averaged across rows; every other metric
//! is summed. Missing or non-numeric values count as zero.

use serde_json::{Map, Value};

/// Metrics whose aggregate is a mean rather than a sum.
pub const RATE_METRICS: &[&str] = &["ctr", "cpc", "cpm"];

pub fn is_rate_metric(metric: &str) -> bool {
    RATE_METRICS.contains(&metric)
}

/// Numeric value of `row[metric]`. Graph returns metrics as strings, so
/// numeric strings count.
fn metric_value(row: &Value, metric: &str) -> f64 {
    let value = match row.get(metric) {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    value.filter(|v| v.is_finite()).unwrap_or(0.0)
}

/// Summarise `rows` for each of `metrics`. No rows yields an empty object.
pub fn summarize(rows: &[Value], metrics: &[String]) -> Map<String, Value> {
    let mut summary = Map::new();
    if rows.is_empty() {
        return summary;
    }

    for metric in metrics {
        let total: f64 = rows.iter().map(|row| metric_value(row, metric)).sum();
        let aggregate = if is_rate_metric(metric) {
            total / rows.len() as f64
        } else {
            total
        };
        summary.insert(metric.clone(), Value::from(aggregate));
    }
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn metrics(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn averages_rates_and_sums_the_rest() {
        let rows = vec![json!({"ctr": 2.0, "spend": 10}), json!({"ctr": 4.0, "spend": 20})];
        let summary = summarize(&rows, &metrics(&["ctr", "spend"]));
        assert_eq!(summary["ctr"].as_f64(), Some(3.0));
        assert_eq!(summary["spend"].as_f64(), Some(30.0));
    }

    #[test]
    fn empty_rows_give_empty_summary() {
        let summary = summarize(&[], &metrics(&["ctr", "spend", "impressions"]));
        assert!(summary.is_empty());
    }

    #[test]
    fn missing_and_non_numeric_values_count_as_zero() {
        let rows = vec![
            json!({"cpc": "1.5", "clicks": "10"}),
            json!({"cpc": "n/a"}),
            json!({"clicks": null, "cpc": 0.5}),
        ];
        let summary = summarize(&rows, &metrics(&["cpc", "clicks"]));
        assert_eq!(summary["cpc"].as_f64(), Some((1.5 + 0.0 + 0.5) / 3.0));
        assert_eq!(summary["clicks"].as_f64(), Some(10.0));
    }

    #[test]
    fn unrequested_metrics_are_not_summarised() {
        let rows = vec![json!({"ctr": 1.0, "reach": 100})];
        let summary = summarize(&rows, &metrics(&["reach"]));
        assert_eq!(summary.len(), 1);
        assert!(!summary.contains_key("ctr"));
    }
}
