//! Client surface consumed by the dashboard query layer

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use super::http::{HttpCatalogService, HttpTokenService};
use super::session::SessionCache;
use super::user_agent::UserAgent;
use crate::broker::SessionBroker;
use crate::config::DataSourceSettings;
use crate::context::RequestContext;
use crate::error::Result;
use crate::executor::QueryExecutor;
use crate::models::catalog::*;
use crate::models::sts::CredentialSet;
use crate::models::AggregatedResult;
use crate::policy::WorkspaceReadPolicy;
use crate::query::TwinMakerQuery;

/// Plugin name reported in the identification string
pub const PLUGIN_NAME: &str = "grafana-iot-twinmaker-app";

#[async_trait]
pub trait TwinMakerApi: Send + Sync {
    async fn list_workspaces(
        &self,
        ctx: &RequestContext,
        query: &TwinMakerQuery,
    ) -> Result<AggregatedResult<WorkspaceSummary>>;

    async fn list_scenes(
        &self,
        ctx: &RequestContext,
        query: &TwinMakerQuery,
    ) -> Result<AggregatedResult<SceneSummary>>;

    async fn list_entities(
        &self,
        ctx: &RequestContext,
        query: &TwinMakerQuery,
    ) -> Result<AggregatedResult<EntitySummary>>;

    async fn list_component_types(
        &self,
        ctx: &RequestContext,
        query: &TwinMakerQuery,
    ) -> Result<AggregatedResult<ComponentTypeSummary>>;

    async fn get_workspace(&self, ctx: &RequestContext, query: &TwinMakerQuery) -> Result<Workspace>;

    async fn get_entity(&self, ctx: &RequestContext, query: &TwinMakerQuery) -> Result<Entity>;

    async fn get_component_type(
        &self,
        ctx: &RequestContext,
        query: &TwinMakerQuery,
    ) -> Result<ComponentType>;

    async fn get_property_value(
        &self,
        ctx: &RequestContext,
        query: &TwinMakerQuery,
    ) -> Result<GetPropertyValueOutput>;

    async fn get_property_value_history(
        &self,
        ctx: &RequestContext,
        query: &TwinMakerQuery,
    ) -> Result<GetPropertyValueHistoryOutput>;

    async fn get_session_token(
        &self,
        ctx: &RequestContext,
        duration: Duration,
        workspace_id: &str,
    ) -> Result<CredentialSet>;
}

/// Settings-driven client. Service sessions are resolved from the shared
/// cache on every call, so one cache can back many datasources.
///
/// The cache builds a session the first time its settings key is asked for.
/// Construction asks for both keys up front, so bad settings fail here with
/// a session error instead of on the first query. Building a session makes
/// no network call.
pub struct TwinMakerClient {
    settings: DataSourceSettings,
    token_settings: DataSourceSettings,
    sessions: Arc<SessionCache>,
}

impl TwinMakerClient {
    /// Fails with a session error if either service session can not be established
    pub fn new(settings: DataSourceSettings) -> Result<Self> {
        let sessions = Arc::new(SessionCache::new(UserAgent::detect(PLUGIN_NAME))?);
        Self::with_session_cache(settings, sessions)
    }

    pub fn with_session_cache(settings: DataSourceSettings, sessions: Arc<SessionCache>) -> Result<Self> {
        let token_settings = settings.token_settings();
        let client = Self {
            settings,
            token_settings,
            sessions,
        };
        client.executor()?;
        client.broker()?;
        Ok(client)
    }

    pub fn settings(&self) -> &DataSourceSettings {
        &self.settings
    }

    fn executor(&self) -> Result<QueryExecutor> {
        let session = self.sessions.session(&self.settings)?;
        Ok(QueryExecutor::new(Arc::new(HttpCatalogService::new(session)?)))
    }

    fn broker(&self) -> Result<SessionBroker> {
        let session = self.sessions.session(&self.settings)?;
        let token_session = self.sessions.session(&self.token_settings)?;

        Ok(SessionBroker::new(
            Arc::new(HttpCatalogService::new(session.clone())?),
            Arc::new(HttpTokenService::new(token_session)?),
            session.credentials().clone(),
            Arc::new(WorkspaceReadPolicy),
        )
        .with_role(self.settings.role().map(str::to_string)))
    }
}

#[async_trait]
impl TwinMakerApi for TwinMakerClient {
    async fn list_workspaces(
        &self,
        ctx: &RequestContext,
        query: &TwinMakerQuery,
    ) -> Result<AggregatedResult<WorkspaceSummary>> {
        self.executor()?.list_workspaces(ctx, query).await
    }

    async fn list_scenes(
        &self,
        ctx: &RequestContext,
        query: &TwinMakerQuery,
    ) -> Result<AggregatedResult<SceneSummary>> {
        self.executor()?.list_scenes(ctx, query).await
    }

    async fn list_entities(
        &self,
        ctx: &RequestContext,
        query: &TwinMakerQuery,
    ) -> Result<AggregatedResult<EntitySummary>> {
        self.executor()?.list_entities(ctx, query).await
    }

    async fn list_component_types(
        &self,
        ctx: &RequestContext,
        query: &TwinMakerQuery,
    ) -> Result<AggregatedResult<ComponentTypeSummary>> {
        self.executor()?.list_component_types(ctx, query).await
    }

    async fn get_workspace(&self, ctx: &RequestContext, query: &TwinMakerQuery) -> Result<Workspace> {
        self.executor()?.get_workspace(ctx, query).await
    }

    async fn get_entity(&self, ctx: &RequestContext, query: &TwinMakerQuery) -> Result<Entity> {
        self.executor()?.get_entity(ctx, query).await
    }

    async fn get_component_type(
        &self,
        ctx: &RequestContext,
        query: &TwinMakerQuery,
    ) -> Result<ComponentType> {
        self.executor()?.get_component_type(ctx, query).await
    }

    async fn get_property_value(
        &self,
        ctx: &RequestContext,
        query: &TwinMakerQuery,
    ) -> Result<GetPropertyValueOutput> {
        self.executor()?.get_property_value(ctx, query).await
    }

    async fn get_property_value_history(
        &self,
        ctx: &RequestContext,
        query: &TwinMakerQuery,
    ) -> Result<GetPropertyValueHistoryOutput> {
        self.executor()?.get_property_value_history(ctx, query).await
    }

    async fn get_session_token(
        &self,
        ctx: &RequestContext,
        duration: Duration,
        workspace_id: &str,
    ) -> Result<CredentialSet> {
        self.broker()?
            .issue_credentials(ctx, duration, workspace_id)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AuthType;
    use crate::error::{SessionError, TwinMakerError};

    fn sessions() -> Arc<SessionCache> {
        Arc::new(SessionCache::with_client(
            reqwest::Client::new(),
            UserAgent::detect(PLUGIN_NAME),
        ))
    }

    #[test]
    fn construction_resolves_catalog_and_token_sessions() {
        let cache = sessions();
        let settings = DataSourceSettings::new(
            AuthType::Keys {
                access_key: "AKID".into(),
                secret_key: "secret".into(),
            },
            "us-east-1",
        )
        .with_endpoint("https://gamma.example.com")
        .with_assume_role("arn:aws:iam::111122223333:role/DashboardRole");

        let client = TwinMakerClient::with_session_cache(settings, cache.clone()).unwrap();
        assert_eq!(client.settings().region.as_deref(), Some("us-east-1"));
        // catalog session, token session, and nothing else
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn clients_with_equal_settings_share_cached_sessions() {
        let cache = sessions();
        assert!(cache.is_empty());

        let settings = DataSourceSettings::new(AuthType::Default, "us-east-1");
        TwinMakerClient::with_session_cache(settings.clone(), cache.clone()).unwrap();
        TwinMakerClient::with_session_cache(settings, cache.clone()).unwrap();

        // no role and no endpoint: catalog and token settings coincide
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn invalid_endpoint_is_a_session_error() {
        let settings = DataSourceSettings::new(AuthType::Default, "us-east-1")
            .with_endpoint("ftp://example.com");
        let result = TwinMakerClient::with_session_cache(settings, sessions());
        assert!(matches!(
            result,
            Err(TwinMakerError::Session(SessionError::InvalidEndpoint { .. }))
        ));
    }
}
