//! Liveness probe.

use axum::Json;
use serde::Serialize;

pub const SERVICE_NAME: &str = "Meta Ads MCP";

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub service: &'static str,
}

/// `GET /health`
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        ok: true,
        service: SERVICE_NAME,
    })
}
