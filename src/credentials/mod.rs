//! Ambient credentials: providers and the lock-guarded cache
//!
//! The cache is an owned object shared through `Arc`, never process-global
//! state. The session broker receives it explicitly and uses
//! [`CredentialCache::force_refresh`] for its expire-then-refresh step.

mod assume_role;
mod providers;

pub use assume_role::AssumeRoleProvider;
pub use providers::{
    ChainProvider, ContainerProvider, EnvironmentProvider, ProfileProvider, StaticProvider,
};

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::Mutex;

/// Credentials the process itself signs requests with
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
    /// `None` for long-lived keys or providers that do not report an expiry
    pub expiration: Option<DateTime<Utc>>,
    pub provider: &'static str,
}

impl Credentials {
    pub fn new(
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<String>,
        session_token: Option<String>,
        provider: &'static str,
    ) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
            session_token: session_token.filter(|t| !t.is_empty()),
            expiration: None,
            provider,
        }
    }

    pub fn with_expiration(mut self, expiration: DateTime<Utc>) -> Self {
        self.expiration = Some(expiration);
        self
    }

    /// Temporary credentials carry a non-empty session token
    pub fn is_temporary(&self) -> bool {
        self.session_token.as_deref().is_some_and(|t| !t.is_empty())
    }

    pub fn expires_within(&self, window: Duration, now: DateTime<Utc>) -> bool {
        match self.expiration {
            Some(expiration) => {
                let window = chrono::Duration::from_std(window).unwrap_or(chrono::Duration::zero());
                expiration - window <= now
            }
            None => false,
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"** redacted **")
            .field(
                "session_token",
                &self.session_token.as_ref().map(|_| "** redacted **"),
            )
            .field("expiration", &self.expiration)
            .field("provider", &self.provider)
            .finish()
    }
}

#[derive(Error, Debug, Clone)]
pub enum CredentialsError {
    /// The provider has nothing to offer; a chain moves on to the next one
    #[error("{provider}: no credentials available: {reason}")]
    NotLoaded {
        provider: &'static str,
        reason: String,
    },

    /// The provider applies but failed
    #[error("{provider}: {message}")]
    ProviderFailed {
        provider: &'static str,
        message: String,
    },

    #[error("no provider in the chain returned credentials ({0})")]
    ChainExhausted(String),
}

impl CredentialsError {
    pub fn not_loaded(provider: &'static str, reason: impl Into<String>) -> Self {
        Self::NotLoaded {
            provider,
            reason: reason.into(),
        }
    }

    pub fn failed(provider: &'static str, message: impl Into<String>) -> Self {
        Self::ProviderFailed {
            provider,
            message: message.into(),
        }
    }
}

#[async_trait]
pub trait ProvideCredentials: Send + Sync {
    async fn provide_credentials(&self) -> Result<Credentials, CredentialsError>;

    fn name(&self) -> &'static str;
}

/// Shared cache in front of one provider.
///
/// All reads and writes go through one async mutex, so a forced refresh is
/// never observed half-done by a concurrent caller.
pub struct CredentialCache {
    provider: Arc<dyn ProvideCredentials>,
    slot: Mutex<Option<Credentials>>,
    expiry_window: Duration,
}

impl CredentialCache {
    pub fn new(provider: Arc<dyn ProvideCredentials>) -> Self {
        Self::with_expiry_window(provider, crate::config::CREDENTIAL_EXPIRY_WINDOW)
    }

    pub fn with_expiry_window(provider: Arc<dyn ProvideCredentials>, expiry_window: Duration) -> Self {
        Self {
            provider,
            slot: Mutex::new(None),
            expiry_window,
        }
    }

    pub fn provider_name(&self) -> &'static str {
        self.provider.name()
    }

    /// Cached credentials, refreshed first if missing or close to expiry
    pub async fn get(&self) -> Result<Credentials, CredentialsError> {
        let mut slot = self.slot.lock().await;
        if let Some(cached) = slot.as_ref() {
            if !cached.expires_within(self.expiry_window, Utc::now()) {
                return Ok(cached.clone());
            }
            tracing::debug!(
                provider = self.provider.name(),
                "Cached credentials are inside the expiry window, refreshing"
            );
        }
        self.load_into(&mut slot).await
    }

    /// Drop the cached value; the next `get` re-resolves
    pub async fn expire(&self) {
        *self.slot.lock().await = None;
    }

    /// Expire, re-resolve and read back as one step under the lock
    pub async fn force_refresh(&self) -> Result<Credentials, CredentialsError> {
        let mut slot = self.slot.lock().await;
        *slot = None;
        tracing::debug!(provider = self.provider.name(), "Forcing credential refresh");
        self.load_into(&mut slot).await
    }

    async fn load_into(&self, slot: &mut Option<Credentials>) -> Result<Credentials, CredentialsError> {
        let fresh = self.provider.provide_credentials().await?;
        *slot = Some(fresh.clone());
        Ok(fresh)
    }
}

impl std::fmt::Debug for CredentialCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialCache")
            .field("provider", &self.provider.name())
            .field("expiry_window", &self.expiry_window)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingProvider {
        calls: AtomicUsize,
        lifetime: Option<chrono::Duration>,
    }

    #[async_trait]
    impl ProvideCredentials for CountingProvider {
        async fn provide_credentials(&self) -> Result<Credentials, CredentialsError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            let creds = Credentials::new(format!("AKID{}", n), "secret", Some("token".into()), "counting");
            Ok(match self.lifetime {
                Some(lifetime) => creds.with_expiration(Utc::now() + lifetime),
                None => creds,
            })
        }

        fn name(&self) -> &'static str {
            "counting"
        }
    }

    fn cache(lifetime: Option<chrono::Duration>) -> (Arc<CountingProvider>, CredentialCache) {
        let provider = Arc::new(CountingProvider {
            calls: AtomicUsize::new(0),
            lifetime,
        });
        let cache = CredentialCache::new(provider.clone());
        (provider, cache)
    }

    #[tokio::test]
    async fn get_reuses_cached_credentials() {
        let (provider, cache) = cache(None);
        assert_eq!(cache.get().await.unwrap().access_key_id, "AKID1");
        assert_eq!(cache.get().await.unwrap().access_key_id, "AKID1");
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn credentials_inside_expiry_window_are_refreshed() {
        let (provider, cache) = cache(Some(chrono::Duration::minutes(2)));
        cache.get().await.unwrap();
        let second = cache.get().await.unwrap();
        assert_eq!(second.access_key_id, "AKID2");
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn force_refresh_always_hits_provider() {
        let (provider, cache) = cache(None);
        cache.get().await.unwrap();
        let refreshed = cache.force_refresh().await.unwrap();
        assert_eq!(refreshed.access_key_id, "AKID2");
        assert_eq!(cache.get().await.unwrap().access_key_id, "AKID2");
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn expire_drops_cached_value() {
        let (_, cache) = cache(None);
        cache.get().await.unwrap();
        cache.expire().await;
        assert_eq!(cache.get().await.unwrap().access_key_id, "AKID2");
    }

    #[test]
    fn empty_session_token_is_not_temporary() {
        let creds = Credentials::new("AKID", "secret", Some(String::new()), "static");
        assert!(!creds.is_temporary());
        let creds = Credentials::new("AKID", "secret", Some("token".into()), "static");
        assert!(creds.is_temporary());
    }
}
