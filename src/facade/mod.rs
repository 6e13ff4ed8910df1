//! Remote service facade
//!
//! Typed handles to the catalog and token services. The executor and broker
//! only see the [`CatalogService`] and [`TokenService`] traits; the reqwest
//! implementations sign each request and attach the identification string.

mod client;
mod http;
mod session;
pub(crate) mod sigv4;
mod user_agent;

pub use client::{TwinMakerApi, TwinMakerClient, PLUGIN_NAME};
pub use http::{HttpCatalogService, HttpTokenService};
pub use session::{Session, SessionCache};
pub use user_agent::UserAgent;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::catalog::*;
use crate::models::sts::{AssumeRoleRequest, CredentialSet, GetSessionTokenRequest};
use crate::models::Page;

/// One remote round-trip per method. List methods return a single page.
#[async_trait]
pub trait CatalogService: Send + Sync {
    async fn list_workspaces(&self, request: &ListWorkspacesRequest) -> Result<Page<WorkspaceSummary>>;

    async fn list_scenes(&self, request: &ListScenesRequest) -> Result<Page<SceneSummary>>;

    async fn list_entities(&self, request: &ListEntitiesRequest) -> Result<Page<EntitySummary>>;

    async fn list_component_types(
        &self,
        request: &ListComponentTypesRequest,
    ) -> Result<Page<ComponentTypeSummary>>;

    async fn get_workspace(&self, request: &GetWorkspaceRequest) -> Result<Workspace>;

    async fn get_entity(&self, request: &GetEntityRequest) -> Result<Entity>;

    async fn get_component_type(&self, request: &GetComponentTypeRequest) -> Result<ComponentType>;

    /// Latest value; only meaningful for non-timeseries properties
    async fn get_property_value(
        &self,
        request: &GetPropertyValueRequest,
    ) -> Result<GetPropertyValueOutput>;

    /// Value history; only meaningful for timeseries properties
    async fn get_property_value_history(
        &self,
        request: &GetPropertyValueHistoryRequest,
    ) -> Result<GetPropertyValueHistoryOutput>;
}

#[async_trait]
pub trait TokenService: Send + Sync {
    async fn assume_role(&self, request: &AssumeRoleRequest) -> Result<CredentialSet>;

    async fn get_session_token(&self, request: &GetSessionTokenRequest) -> Result<CredentialSet>;
}
