//! `GET /auth/status/{user_id}`: whether a Meta credential is on file.

use axum::Json;
use axum::extract::{Path, State};
use serde::Serialize;

use meta_ads_core::auth::validate_user_id;

use crate::AppState;
use crate::error::AppResult;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub user_id: String,
    pub authenticated: bool,
    /// Consent URL; `null` once connected.
    pub auth_url: Option<String>,
}

pub async fn status_handler(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> AppResult<Json<StatusResponse>> {
    let user_id = validate_user_id(&user_id)?;
    let authenticated = state.tokens.is_authenticated(user_id).await?;
    let auth_url = (!authenticated).then(|| state.tokens.provider().authorization_url(user_id));

    Ok(Json(StatusResponse {
        user_id: user_id.to_string(),
        authenticated,
        auth_url,
    }))
}
