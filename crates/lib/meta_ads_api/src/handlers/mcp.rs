// @zen-component: API-McpEndpoint
//
//! `POST /mcp`: JSON-RPC over plain HTTP request/response.

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::header::AUTHORIZATION;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use tracing::{Instrument, debug, info_span};
use uuid::Uuid;

use meta_ads_mcp::CallerHints;

use crate::AppState;

/// Header naming the calling user.
pub const USER_ID_HEADER: &str = "x-user-id";

#[derive(Debug, Default, Deserialize)]
pub struct McpQuery {
    #[serde(rename = "userId")]
    pub user_id: Option<String>,
}

/// The body is taken raw so malformed JSON becomes a JSON-RPC parse error
/// instead of a framework rejection.
pub async fn mcp_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<McpQuery>,
    body: Bytes,
) -> Response {
    let hints = caller_hints(&headers, query);
    let span = info_span!("mcp", request_id = %Uuid::now_v7());

    async move {
        debug!(bytes = body.len(), "received JSON-RPC body");
        match state.dispatcher.handle_body(&body, &hints).await {
            Some(response) => Json(response).into_response(),
            None => StatusCode::ACCEPTED.into_response(),
        }
    }
    .instrument(span)
    .await
}

/// Collects every identity candidate; the dispatcher picks by precedence.
pub fn caller_hints(headers: &HeaderMap, query: McpQuery) -> CallerHints {
    let header = headers
        .get(USER_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let bearer = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim_start().split_once(' '))
        .filter(|(scheme, _)| scheme.eq_ignore_ascii_case("bearer"))
        .map(|(_, token)| token.trim().to_string());

    CallerHints {
        header,
        bearer,
        query: query.user_id,
    }
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    #[test]
    fn hints_collect_header_bearer_and_query() {
        let mut headers = HeaderMap::new();
        headers.insert(USER_ID_HEADER, HeaderValue::from_static("alice"));
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer  bob "));

        let hints = caller_hints(
            &headers,
            McpQuery {
                user_id: Some("carol".into()),
            },
        );
        assert_eq!(hints.header.as_deref(), Some("alice"));
        assert_eq!(hints.bearer.as_deref(), Some("bob"));
        assert_eq!(hints.query.as_deref(), Some("carol"));
    }

    #[test]
    fn bearer_scheme_is_case_insensitive() {
        for value in ["bearer alice", "BEARER alice", "BeArEr   alice"] {
            let mut headers = HeaderMap::new();
            headers.insert(AUTHORIZATION, HeaderValue::from_static(value));
            let hints = caller_hints(&headers, McpQuery::default());
            assert_eq!(hints.bearer.as_deref(), Some("alice"), "{value}");
        }
    }

    #[test]
    fn non_bearer_authorization_is_ignored() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic Zm9vOmJhcg=="));
        let hints = caller_hints(&headers, McpQuery::default());
        assert!(hints.bearer.is_none());
        assert!(hints.header.is_none());
    }
}
