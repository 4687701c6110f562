// @zen-component: AUTH-TokenStore
//
//! Token store: per-user credentials with proactive refresh.
//!
//! Credentials live in a [`CredentialBackend`]. The in-memory backend is
//! process-lifetime only; a durable backend can be substituted without
//! touching callers. [`TokenStore::ensure_fresh`] serialises the
//! read-refresh-write sequence per user so concurrent calls never issue
//! duplicate refresh exchanges.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::{AuthError, Credential, OAuthProvider};

/// Storage for credentials keyed by user identifier.
#[async_trait]
pub trait CredentialBackend: Send + Sync {
    async fn get(&self, user_id: &str) -> Result<Option<Credential>, AuthError>;

    /// Unconditional overwrite.
    async fn put(&self, user_id: &str, credential: Credential) -> Result<(), AuthError>;
}

/// Non-durable in-memory backend. Contents are lost on restart.
#[derive(Default)]
pub struct MemoryBackend {
    credentials: DashMap<String, Credential>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.credentials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.credentials.is_empty()
    }
}

#[async_trait]
impl CredentialBackend for MemoryBackend {
    async fn get(&self, user_id: &str) -> Result<Option<Credential>, AuthError> {
        Ok(self.credentials.get(user_id).map(|entry| entry.value().clone()))
    }

    async fn put(&self, user_id: &str, credential: Credential) -> Result<(), AuthError> {
        self.credentials.insert(user_id.to_string(), credential);
        Ok(())
    }
}

/// Per-user credential store backed by a [`CredentialBackend`] and an
/// [`OAuthProvider`] used for refresh exchanges.
pub struct TokenStore {
    backend: Arc<dyn CredentialBackend>,
    provider: Arc<dyn OAuthProvider>,
    refresh_guards: DashMap<String, Arc<Mutex<()>>>,
}

impl TokenStore {
    pub fn new(backend: Arc<dyn CredentialBackend>, provider: Arc<dyn OAuthProvider>) -> Self {
        Self {
            backend,
            provider,
            refresh_guards: DashMap::new(),
        }
    }

    /// Store backed by a fresh [`MemoryBackend`].
    pub fn in_memory(provider: Arc<dyn OAuthProvider>) -> Self {
        Self::new(Arc::new(MemoryBackend::new()), provider)
    }

    pub fn provider(&self) -> &Arc<dyn OAuthProvider> {
        &self.provider
    }

    pub async fn get(&self, user_id: &str) -> Result<Option<Credential>, AuthError> {
        self.backend.get(user_id).await
    }

    /// Store a credential, waiting for any refresh in flight for the same
    /// user so the refresh cannot overwrite it afterwards.
    pub async fn put(&self, user_id: &str, credential: Credential) -> Result<(), AuthError> {
        let guard = self.guard_for(user_id);
        let _held = guard.lock().await;
        debug!(user_id, expires_at = ?credential.expires_at, "storing credential");
        self.backend.put(user_id, credential).await
    }

    /// Whether a credential is on file for `user_id`.
    pub async fn is_authenticated(&self, user_id: &str) -> Result<bool, AuthError> {
        Ok(self.backend.get(user_id).await?.is_some())
    }

    /// Return a credential that is valid for at least the refresh margin,
    /// refreshing it first when it is about to expire.
    ///
    /// A failed refresh leaves the stale credential in place.
    pub async fn ensure_fresh(&self, user_id: &str) -> Result<Credential, AuthError> {
        let current = self.require(user_id).await?;
        if !current.needs_refresh(Utc::now()) {
            return Ok(current);
        }

        let guard = self.guard_for(user_id);
        let _held = guard.lock().await;

        // Another caller may have refreshed while we waited.
        let current = self.require(user_id).await?;
        if !current.needs_refresh(Utc::now()) {
            debug!(user_id, "credential refreshed by concurrent caller");
            return Ok(current);
        }

        info!(user_id, expires_at = ?current.expires_at, "refreshing credential");
        let grant = self
            .provider
            .refresh(&current.refresh_basis)
            .await
            .map_err(|e| match e {
                AuthError::RefreshFailed(msg) => AuthError::RefreshFailed(msg),
                other => AuthError::RefreshFailed(other.to_string()),
            })
            .inspect_err(|e| warn!(user_id, error = %e, "credential refresh failed"))?;

        let refreshed = grant.into_credential(Utc::now());
        self.backend.put(user_id, refreshed.clone()).await?;
        info!(user_id, expires_at = ?refreshed.expires_at, "credential refreshed");
        Ok(refreshed)
    }

    async fn require(&self, user_id: &str) -> Result<Credential, AuthError> {
        self.backend
            .get(user_id)
            .await?
            .ok_or_else(|| AuthError::NotAuthenticated {
                user_id: user_id.to_string(),
            })
    }

    fn guard_for(&self, user_id: &str) -> Arc<Mutex<()>> {
        self.refresh_guards
            .entry(user_id.to_string())
            .or_default()
            .clone()
    }
}
