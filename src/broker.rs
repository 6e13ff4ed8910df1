//! Session broker
//!
//! Issues a short-lived credential set for the dashboard frontend. The
//! strategy is picked once per call from two facts: whether a downscoping
//! role is configured, and whether the process's own credentials are
//! already temporary.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use crate::config::{DEFAULT_ROLE_SESSION_NAME, DEFAULT_SESSION_DURATION};
use crate::context::RequestContext;
use crate::credentials::CredentialCache;
use crate::error::{Result, TwinMakerError, ValidationError};
use crate::facade::{CatalogService, TokenService};
use crate::models::catalog::GetWorkspaceRequest;
use crate::models::sts::{AssumeRoleRequest, CredentialSet, GetSessionTokenRequest};
use crate::policy::PolicySynthesizer;

/// How one broker call obtains credentials
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialStrategy {
    /// Assume the configured role with a workspace-scoped inline policy
    DownscopedRole { role_arn: String },
    /// Hand out the refreshed ambient credentials, which are already temporary
    AmbientTemporary,
    /// Mint a session token from long-lived ambient keys
    AmbientPermanent,
}

impl CredentialStrategy {
    pub fn select(role_arn: Option<&str>, ambient_is_temporary: bool) -> Self {
        match role_arn.filter(|r| !r.is_empty()) {
            Some(role_arn) => Self::DownscopedRole {
                role_arn: role_arn.to_string(),
            },
            None if ambient_is_temporary => Self::AmbientTemporary,
            None => Self::AmbientPermanent,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::DownscopedRole { .. } => "downscoped-role",
            Self::AmbientTemporary => "ambient-temporary",
            Self::AmbientPermanent => "ambient-permanent",
        }
    }
}

pub struct SessionBroker {
    catalog: Arc<dyn CatalogService>,
    tokens: Arc<dyn TokenService>,
    ambient: Arc<CredentialCache>,
    policy: Arc<dyn PolicySynthesizer>,
    role_arn: Option<String>,
}

impl SessionBroker {
    pub fn new(
        catalog: Arc<dyn CatalogService>,
        tokens: Arc<dyn TokenService>,
        ambient: Arc<CredentialCache>,
        policy: Arc<dyn PolicySynthesizer>,
    ) -> Self {
        Self {
            catalog,
            tokens,
            ambient,
            policy,
            role_arn: None,
        }
    }

    pub fn with_role(mut self, role_arn: Option<String>) -> Self {
        self.role_arn = role_arn.filter(|r| !r.is_empty());
        self
    }

    /// Credentials valid for `duration`, scoped to `workspace_id` when a role is configured
    pub async fn issue_credentials(
        &self,
        ctx: &RequestContext,
        duration: Duration,
        workspace_id: &str,
    ) -> Result<CredentialSet> {
        let strategy = self.strategy(ctx).await?;
        tracing::info!(
            strategy = strategy.name(),
            workspace_id,
            duration_secs = duration.as_secs(),
            "Issuing dashboard credentials"
        );

        match strategy {
            CredentialStrategy::DownscopedRole { role_arn } => {
                self.assume_downscoped_role(ctx, &role_arn, duration, workspace_id)
                    .await
            }
            CredentialStrategy::AmbientTemporary => self.refresh_ambient(ctx).await,
            CredentialStrategy::AmbientPermanent => self.mint_session_token(ctx, duration).await,
        }
    }

    /// Ambient credentials are only consulted when no role is configured
    async fn strategy(&self, ctx: &RequestContext) -> Result<CredentialStrategy> {
        if self.role_arn.is_some() {
            return Ok(CredentialStrategy::select(self.role_arn.as_deref(), false));
        }
        let ambient = ctx
            .run(async {
                self.ambient
                    .get()
                    .await
                    .map_err(TwinMakerError::CredentialRefresh)
            })
            .await?;
        Ok(CredentialStrategy::select(None, ambient.is_temporary()))
    }

    async fn assume_downscoped_role(
        &self,
        ctx: &RequestContext,
        role_arn: &str,
        duration: Duration,
        workspace_id: &str,
    ) -> Result<CredentialSet> {
        if workspace_id.is_empty() {
            return Err(ValidationError::MissingWorkspaceId.into());
        }

        let request = GetWorkspaceRequest {
            workspace_id: workspace_id.to_string(),
        };
        let workspace = ctx
            .run(self.catalog.get_workspace(&request))
            .await
            .map_err(|e| e.wrap_unless_cancelled(TwinMakerError::WorkspaceLookup))?;

        let policy = self.policy.synthesize(&workspace)?;

        let request = AssumeRoleRequest {
            role_arn: role_arn.to_string(),
            role_session_name: DEFAULT_ROLE_SESSION_NAME.to_string(),
            duration_seconds: duration.as_secs() as i64,
            policy: Some(policy),
            external_id: None,
        };
        let issued = ctx
            .run(self.tokens.assume_role(&request))
            .await
            .map_err(|e| e.wrap_unless_cancelled(TwinMakerError::AssumeRole))?;

        tracing::debug!(role_arn, expiration = %issued.expiration, "Assumed downscoped role");
        Ok(issued)
    }

    /// Expire, refresh and read back the shared cache in one locked step.
    ///
    /// The expiration is always now plus the provider chain's default
    /// duration, whatever the refreshed credentials report.
    async fn refresh_ambient(&self, ctx: &RequestContext) -> Result<CredentialSet> {
        let refreshed = ctx
            .run(async {
                self.ambient
                    .force_refresh()
                    .await
                    .map_err(TwinMakerError::CredentialRefresh)
            })
            .await?;

        let lifetime = chrono::Duration::from_std(DEFAULT_SESSION_DURATION)
            .unwrap_or_else(|_| chrono::Duration::minutes(15));
        let expiration = Utc::now() + lifetime;
        tracing::debug!(
            provider = refreshed.provider,
            reported = ?refreshed.expiration,
            %expiration,
            "Refreshed ambient temporary credentials"
        );

        Ok(CredentialSet {
            access_key_id: refreshed.access_key_id,
            secret_access_key: refreshed.secret_access_key,
            session_token: refreshed.session_token.unwrap_or_default(),
            expiration,
        })
    }

    async fn mint_session_token(&self, ctx: &RequestContext, duration: Duration) -> Result<CredentialSet> {
        let request = GetSessionTokenRequest {
            duration_seconds: duration.as_secs() as i64,
        };
        ctx.run(self.tokens.get_session_token(&request))
            .await
            .map_err(|e| e.wrap_unless_cancelled(TwinMakerError::TokenIssuance))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_takes_precedence_over_ambient_state() {
        assert_eq!(
            CredentialStrategy::select(Some("arn:aws:iam::111122223333:role/Dash"), true),
            CredentialStrategy::DownscopedRole {
                role_arn: "arn:aws:iam::111122223333:role/Dash".into()
            }
        );
        assert_eq!(
            CredentialStrategy::select(Some(""), true),
            CredentialStrategy::AmbientTemporary
        );
        assert_eq!(
            CredentialStrategy::select(None, false),
            CredentialStrategy::AmbientPermanent
        );
    }
}
