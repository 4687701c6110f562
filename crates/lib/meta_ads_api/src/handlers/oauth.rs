// @zen-component: API-OAuthHandler
//
//! Meta OAuth flow: redirect to the consent dialog, then exchange the
//! returned code and store the credential under the `state` user.
//!
//! These routes are browser-facing, so failures use HTTP status codes.

use axum::extract::{Query, State};
use axum::response::{Html, Redirect};
use chrono::Utc;
use serde::Deserialize;
use tracing::{info, warn};

use meta_ads_core::auth::validate_user_id;

use crate::AppState;
use crate::error::{AppError, AppResult};

#[derive(Debug, Deserialize)]
pub struct StartParams {
    #[serde(rename = "userId")]
    pub user_id: Option<String>,
}

/// Query parameters Meta appends to the redirect URI.
#[derive(Debug, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

/// `GET /auth/meta?userId=<id>`: redirect to the Meta consent dialog.
pub async fn start_handler(
    State(state): State<AppState>,
    Query(params): Query<StartParams>,
) -> AppResult<Redirect> {
    let user_id = params
        .user_id
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| AppError::Validation("userId query parameter is required".into()))?;
    let user_id = validate_user_id(user_id.trim())?;

    info!(user_id = %user_id, "starting Meta OAuth flow");
    Ok(Redirect::to(&state.tokens.provider().authorization_url(user_id)))
}

/// `GET /auth/meta/callback?code=<c>&state=<id>`
pub async fn callback_handler(
    State(state): State<AppState>,
    Query(params): Query<CallbackParams>,
) -> AppResult<Html<String>> {
    if let Some(error) = params.error {
        let reason = params.error_description.unwrap_or(error);
        warn!(reason = %reason, "Meta OAuth authorization was not granted");
        return Err(AppError::Validation(format!("Authorization was not granted: {reason}")));
    }

    let code = params
        .code
        .filter(|c| !c.is_empty())
        .ok_or_else(|| AppError::Validation("missing code parameter".into()))?;
    let user_id = params
        .state
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AppError::Validation("missing state parameter".into()))?;
    let user_id = validate_user_id(&user_id)?.to_string();

    let grant = state
        .tokens
        .provider()
        .exchange_code(&code)
        .await
        .inspect_err(|e| warn!(user_id = %user_id, error = %e, "Meta code exchange failed"))?;

    let credential = grant.into_credential(Utc::now());
    let expires_at = credential.expires_at;
    state.tokens.put(&user_id, credential).await?;
    info!(user_id = %user_id, expires_at = ?expires_at, "Meta account connected");

    Ok(Html(confirmation_page(&user_id)))
}

fn confirmation_page(user_id: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html>\n<head><title>Meta Ads connected</title></head>\n<body>\n\
         <h1>Meta Ads connected</h1>\n\
         <p>Your Meta Ads account is now connected for <strong>{}</strong>.</p>\n\
         <p>You can close this window and return to your assistant.</p>\n\
         </body>\n</html>\n",
        escape_html(user_id)
    )
}

fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
