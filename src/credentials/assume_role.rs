use std::sync::Arc;

use async_trait::async_trait;

use super::{Credentials, CredentialsError, ProvideCredentials};
use crate::config::{DEFAULT_ROLE_SESSION_NAME, DEFAULT_SESSION_DURATION};
use crate::facade::TokenService;
use crate::models::sts::AssumeRoleRequest;

/// Credentials for the catalog session when a role is configured: the base
/// credentials assume the role without any inline policy.
pub struct AssumeRoleProvider {
    tokens: Arc<dyn TokenService>,
    role_arn: String,
    external_id: Option<String>,
}

impl AssumeRoleProvider {
    pub fn new(tokens: Arc<dyn TokenService>, role_arn: impl Into<String>) -> Self {
        Self {
            tokens,
            role_arn: role_arn.into(),
            external_id: None,
        }
    }

    pub fn with_external_id(mut self, external_id: Option<String>) -> Self {
        self.external_id = external_id.filter(|id| !id.is_empty());
        self
    }
}

#[async_trait]
impl ProvideCredentials for AssumeRoleProvider {
    async fn provide_credentials(&self) -> Result<Credentials, CredentialsError> {
        let request = AssumeRoleRequest {
            role_arn: self.role_arn.clone(),
            role_session_name: DEFAULT_ROLE_SESSION_NAME.to_string(),
            duration_seconds: DEFAULT_SESSION_DURATION.as_secs() as i64,
            policy: None,
            external_id: self.external_id.clone(),
        };

        let issued = self
            .tokens
            .assume_role(&request)
            .await
            .map_err(|e| CredentialsError::failed("assume-role", e.to_string()))?;

        tracing::debug!(role_arn = %self.role_arn, expiration = %issued.expiration, "Assumed catalog role");

        Ok(Credentials::new(
            issued.access_key_id,
            issued.secret_access_key,
            Some(issued.session_token),
            "assume-role",
        )
        .with_expiration(issued.expiration))
    }

    fn name(&self) -> &'static str {
        "assume-role"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{RemoteError, Result};
    use crate::models::sts::{CredentialSet, GetSessionTokenRequest};
    use chrono::Utc;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingTokens {
        requests: Mutex<Vec<AssumeRoleRequest>>,
        fail: bool,
    }

    #[async_trait]
    impl TokenService for RecordingTokens {
        async fn assume_role(&self, request: &AssumeRoleRequest) -> Result<CredentialSet> {
            self.requests.lock().unwrap().push(request.clone());
            if self.fail {
                return Err(RemoteError::new("sts", "AssumeRole", "denied").into());
            }
            Ok(CredentialSet {
                access_key_id: "ASIAROLE".into(),
                secret_access_key: "secret".into(),
                session_token: "token".into(),
                expiration: Utc::now() + chrono::Duration::hours(1),
            })
        }

        async fn get_session_token(&self, _request: &GetSessionTokenRequest) -> Result<CredentialSet> {
            unreachable!("catalog role provider never asks for a plain session token")
        }
    }

    #[tokio::test]
    async fn assumes_role_without_inline_policy() {
        let tokens = Arc::new(RecordingTokens::default());
        let provider = AssumeRoleProvider::new(tokens.clone(), "arn:aws:iam::111122223333:role/R")
            .with_external_id(Some("ext-1".into()));

        let creds = provider.provide_credentials().await.unwrap();
        assert_eq!(creds.access_key_id, "ASIAROLE");
        assert!(creds.is_temporary());
        assert!(creds.expiration.is_some());

        let requests = tokens.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].policy, None);
        assert_eq!(requests[0].external_id.as_deref(), Some("ext-1"));
        assert_eq!(requests[0].role_session_name, "grafana");
    }

    #[tokio::test]
    async fn remote_failure_is_provider_failure() {
        let tokens = Arc::new(RecordingTokens {
            fail: true,
            ..Default::default()
        });
        let provider = AssumeRoleProvider::new(tokens, "arn:aws:iam::111122223333:role/R");
        assert!(matches!(
            provider.provide_credentials().await,
            Err(CredentialsError::ProviderFailed { provider: "assume-role", .. })
        ));
    }
}
