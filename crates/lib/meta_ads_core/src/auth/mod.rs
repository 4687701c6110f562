//! Per-user Meta credentials.
//!
//! A [`Credential`] is created by the OAuth code exchange, held in the
//! [`TokenStore`], and replaced wholesale when the store refreshes it ahead
//! of expiry.

pub mod oauth;
pub mod store;

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use thiserror::Error;

pub use oauth::{MetaOAuthClient, OAuthProvider};
pub use store::{CredentialBackend, MemoryBackend, TokenStore};

/// Refresh when the credential expires within this many seconds.
pub const REFRESH_MARGIN_SECS: i64 = 60;

/// Maximum accepted length of a user identifier.
pub const MAX_USER_ID_LEN: usize = 128;

/// Credential lifecycle errors.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("No Meta credential on file for user {user_id}")]
    NotAuthenticated { user_id: String },

    #[error("Token refresh failed: {0}")]
    RefreshFailed(String),

    #[error("Authorization code exchange failed: {0}")]
    ExchangeFailed(String),

    #[error("Invalid user identifier: {0}")]
    InvalidUserId(String),

    #[error("Credential storage error: {0}")]
    Storage(String),

    #[error("OAuth client misconfigured: {0}")]
    Config(String),
}

/// Stored access credential for one user.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    pub access_token: String,
    /// Value presented to the token endpoint on refresh.
    pub refresh_basis: String,
    /// `None` means the token does not expire.
    pub expires_at: Option<DateTime<Utc>>,
}

impl Credential {
    /// Whether the credential is expired or expires within
    /// [`REFRESH_MARGIN_SECS`].
    pub fn needs_refresh(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            Some(expires_at) => expires_at - now <= Duration::seconds(REFRESH_MARGIN_SECS),
            None => false,
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("access_token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Token endpoint response.
#[derive(Clone, Deserialize)]
pub struct TokenGrant {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    /// Lifetime in seconds.
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

impl TokenGrant {
    /// Build the credential to store for this grant.
    ///
    /// The refresh basis is the returned refresh token when the provider
    /// issues one, otherwise the access token itself (Meta's long-lived
    /// token exchange takes the current token as input).
    pub fn into_credential(self, now: DateTime<Utc>) -> Credential {
        let expires_at = self
            .expires_in
            .filter(|ttl| *ttl > 0)
            .map(|ttl| now + Duration::seconds(ttl));
        let refresh_basis = self
            .refresh_token
            .unwrap_or_else(|| self.access_token.clone());
        Credential {
            access_token: self.access_token,
            refresh_basis,
            expires_at,
        }
    }
}

impl fmt::Debug for TokenGrant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenGrant")
            .field("token_type", &self.token_type)
            .field("expires_in", &self.expires_in)
            .field("refresh_token_set", &self.refresh_token.is_some())
            .finish()
    }
}

/// Check an untrusted user identifier before it is used as a store key or
/// echoed into an OAuth `state` parameter.
pub fn validate_user_id(user_id: &str) -> Result<&str, AuthError> {
    if user_id.is_empty() {
        return Err(AuthError::InvalidUserId("must not be empty".into()));
    }
    if user_id.len() > MAX_USER_ID_LEN {
        return Err(AuthError::InvalidUserId(format!(
            "must be at most {MAX_USER_ID_LEN} characters"
        )));
    }
    if let Some(bad) = user_id
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '@' | ':' | '-')))
    {
        return Err(AuthError::InvalidUserId(format!(
            "unsupported character {bad:?}"
        )));
    }
    Ok(user_id)
}
