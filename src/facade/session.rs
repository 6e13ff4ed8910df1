//! Session cache
//!
//! One [`Session`] per distinct settings value (credentials, role, region,
//! endpoint). Sessions are built lazily and then only read; a racing build
//! keeps whichever session was published first.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use url::Url;

use super::http::HttpTokenService;
use super::user_agent::UserAgent;
use crate::config::{AuthType, DataSourceSettings, HTTP_TIMEOUT};
use crate::credentials::{
    AssumeRoleProvider, ChainProvider, CredentialCache, ProvideCredentials, StaticProvider,
};
use crate::error::SessionError;

/// Resolved connection material for one service configuration
pub struct Session {
    region: String,
    endpoint: Option<Url>,
    credentials: Arc<CredentialCache>,
    http: reqwest::Client,
    user_agent: Arc<str>,
}

impl Session {
    pub fn new(
        region: impl Into<String>,
        endpoint: Option<Url>,
        credentials: Arc<CredentialCache>,
        http: reqwest::Client,
        user_agent: &UserAgent,
    ) -> Self {
        Self {
            region: region.into(),
            endpoint,
            credentials,
            http,
            user_agent: Arc::from(user_agent.to_string()),
        }
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn endpoint(&self) -> Option<&Url> {
        self.endpoint.as_ref()
    }

    /// The ambient credential cache requests from this session are signed with
    pub fn credentials(&self) -> &Arc<CredentialCache> {
        &self.credentials
    }

    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("region", &self.region)
            .field("endpoint", &self.endpoint.as_ref().map(Url::as_str))
            .field("credentials", &self.credentials)
            .finish_non_exhaustive()
    }
}

pub struct SessionCache {
    http: reqwest::Client,
    user_agent: UserAgent,
    sessions: RwLock<HashMap<DataSourceSettings, Arc<Session>>>,
}

impl SessionCache {
    pub fn new(user_agent: UserAgent) -> Result<Self, SessionError> {
        let http = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(SessionError::HttpClient)?;
        Ok(Self::with_client(http, user_agent))
    }

    pub fn with_client(http: reqwest::Client, user_agent: UserAgent) -> Self {
        Self {
            http,
            user_agent,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    pub fn user_agent(&self) -> &UserAgent {
        &self.user_agent
    }

    /// Cached session for `settings`, built on first use
    pub fn session(&self, settings: &DataSourceSettings) -> Result<Arc<Session>, SessionError> {
        {
            let sessions = self.sessions.read().unwrap_or_else(|e| e.into_inner());
            if let Some(session) = sessions.get(settings) {
                return Ok(session.clone());
            }
        }

        let built = Arc::new(self.build(settings)?);
        tracing::debug!(
            auth_type = settings.auth.name(),
            region = built.region(),
            endpoint = ?built.endpoint().map(Url::as_str),
            role = settings.role().is_some(),
            "Created service session"
        );

        let mut sessions = self.sessions.write().unwrap_or_else(|e| e.into_inner());
        Ok(sessions
            .entry(settings.clone())
            .or_insert(built)
            .clone())
    }

    pub fn len(&self) -> usize {
        self.sessions.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn build(&self, settings: &DataSourceSettings) -> Result<Session, SessionError> {
        settings.validate_keys()?;
        let region = settings.resolve_region()?;
        let endpoint = settings
            .endpoint
            .as_deref()
            .filter(|e| !e.trim().is_empty())
            .map(parse_endpoint)
            .transpose()?;

        let base: Arc<dyn ProvideCredentials> = match &settings.auth {
            AuthType::Default => Arc::new(ChainProvider::default_chain(self.http.clone())),
            AuthType::Keys {
                access_key,
                secret_key,
            } => Arc::new(StaticProvider::new(access_key, secret_key, None)),
            AuthType::SessionKeys {
                access_key,
                secret_key,
                session_token,
            } => Arc::new(StaticProvider::new(access_key, secret_key, Some(session_token.as_str()))),
        };

        let provider: Arc<dyn ProvideCredentials> = match settings.role() {
            Some(role_arn) => {
                // The role is assumed with the base credentials on the standard token endpoint
                let base_session = Arc::new(Session::new(
                    region.clone(),
                    None,
                    Arc::new(CredentialCache::new(base)),
                    self.http.clone(),
                    &self.user_agent,
                ));
                let tokens = Arc::new(HttpTokenService::new(base_session)?);
                Arc::new(
                    AssumeRoleProvider::new(tokens, role_arn)
                        .with_external_id(settings.external_id.clone()),
                )
            }
            None => base,
        };

        Ok(Session::new(
            region,
            endpoint,
            Arc::new(CredentialCache::new(provider)),
            self.http.clone(),
            &self.user_agent,
        ))
    }
}

/// Accepts a full URL or a bare host, which is taken as https
fn parse_endpoint(endpoint: &str) -> Result<Url, SessionError> {
    let endpoint = endpoint.trim();
    let candidate = if endpoint.contains("://") {
        endpoint.to_string()
    } else {
        format!("https://{}", endpoint)
    };

    let url = Url::parse(&candidate).map_err(|e| SessionError::InvalidEndpoint {
        endpoint: endpoint.to_string(),
        reason: e.to_string(),
    })?;

    match url.scheme() {
        "http" | "https" if url.host_str().is_some() => Ok(url),
        scheme => Err(SessionError::InvalidEndpoint {
            endpoint: endpoint.to_string(),
            reason: format!("unsupported scheme '{}'", scheme),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache() -> SessionCache {
        SessionCache::with_client(reqwest::Client::new(), UserAgent::detect("twinmaker-access"))
    }

    fn keys() -> AuthType {
        AuthType::Keys {
            access_key: "AKID".into(),
            secret_key: "secret".into(),
        }
    }

    #[test]
    fn sessions_are_cached_per_settings() {
        let cache = cache();
        let settings = DataSourceSettings::new(keys(), "us-east-1");

        let first = cache.session(&settings).unwrap();
        let second = cache.session(&settings).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 1);

        let other = cache
            .session(&settings.clone().with_endpoint("https://gamma.example.com"))
            .unwrap();
        assert!(!Arc::ptr_eq(&first, &other));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn bare_host_endpoint_becomes_https() {
        let url = parse_endpoint("gamma.us-east-1.twinmaker.iot.aws.dev").unwrap();
        assert_eq!(url.as_str(), "https://gamma.us-east-1.twinmaker.iot.aws.dev/");
    }

    #[test]
    fn unsupported_endpoint_scheme_is_a_session_error() {
        assert!(matches!(
            parse_endpoint("ftp://example.com"),
            Err(SessionError::InvalidEndpoint { .. })
        ));
    }

    #[test]
    fn blank_keys_fail_session_construction() {
        let cache = cache();
        let settings = DataSourceSettings::new(
            AuthType::SessionKeys {
                access_key: "AKID".into(),
                secret_key: "secret".into(),
                session_token: String::new(),
            },
            "us-east-1",
        );
        assert!(matches!(
            cache.session(&settings),
            Err(SessionError::MissingStaticKeys { .. })
        ));
        assert!(cache.is_empty());
    }

    #[test]
    fn role_sessions_use_assume_role_credentials() {
        let cache = cache();
        let settings = DataSourceSettings::new(keys(), "us-east-1")
            .with_assume_role("arn:aws:iam::111122223333:role/DashboardRole");
        let session = cache.session(&settings).unwrap();
        assert_eq!(session.credentials().provider_name(), "assume-role");

        let base = cache.session(&settings.token_settings()).unwrap();
        assert_eq!(base.credentials().provider_name(), "static");
    }
}
