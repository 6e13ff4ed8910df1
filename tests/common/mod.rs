//! Fakes for the catalog, token service and credential provider traits

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Notify;

use twinmaker_access::credentials::{Credentials, CredentialsError, ProvideCredentials};
use twinmaker_access::error::{RemoteError, Result};
use twinmaker_access::models::catalog::*;
use twinmaker_access::models::sts::{
    AssumeRoleRequest, CredentialSet, GetSessionTokenRequest,
};
use twinmaker_access::{CatalogService, Page, TokenService};

pub const WORKSPACE_ARN: &str =
    "arn:aws:iottwinmaker:us-east-1:111122223333:workspace/CookieFactory";

pub fn entity(id: &str) -> EntitySummary {
    EntitySummary {
        entity_id: id.to_string(),
        entity_name: id.to_string(),
        ..EntitySummary::default()
    }
}

/// `counts[i]` items on page `i`, ids `<prefix><page>-<n>`
pub fn pages_of<T>(counts: &[usize], prefix: &str, make: impl Fn(String) -> T) -> Vec<Vec<T>> {
    counts
        .iter()
        .enumerate()
        .map(|(page, &count)| {
            (0..count)
                .map(|n| make(format!("{}{}-{}", prefix, page, n)))
                .collect()
        })
        .collect()
}

pub fn entity_pages(counts: &[usize]) -> Vec<Vec<EntitySummary>> {
    pages_of(counts, "E", |id| entity(&id))
}

pub fn workspace_pages(counts: &[usize]) -> Vec<Vec<WorkspaceSummary>> {
    pages_of(counts, "W", |workspace_id| WorkspaceSummary {
        workspace_id,
        ..WorkspaceSummary::default()
    })
}

pub fn scene_pages(counts: &[usize]) -> Vec<Vec<SceneSummary>> {
    pages_of(counts, "S", |scene_id| SceneSummary {
        scene_id,
        ..SceneSummary::default()
    })
}

pub fn component_type_pages(counts: &[usize]) -> Vec<Vec<ComponentTypeSummary>> {
    pages_of(counts, "T", |component_type_id| ComponentTypeSummary {
        component_type_id,
        ..ComponentTypeSummary::default()
    })
}

fn page_index(token: Option<&str>) -> usize {
    token
        .and_then(|t| t.strip_prefix("page-"))
        .and_then(|n| n.parse().ok())
        .unwrap_or(0)
}

/// Page `i` carries `page-<i+1>` as its token, except the last one
fn serve<T: Clone>(pages: &[Vec<T>], token: Option<&str>) -> Page<T> {
    let index = page_index(token);
    let items = pages.get(index).cloned().unwrap_or_default();
    let next = (index + 1 < pages.len()).then(|| format!("page-{}", index + 1));
    Page::new(items, next)
}

#[derive(Default)]
pub struct FakeCatalog {
    pub workspace_pages: Vec<Vec<WorkspaceSummary>>,
    pub scene_pages: Vec<Vec<SceneSummary>>,
    pub entity_pages: Vec<Vec<EntitySummary>>,
    pub component_type_pages: Vec<Vec<ComponentTypeSummary>>,
    pub workspace: Option<Workspace>,
    /// Entity page index at which the fake stops answering
    pub stall_at_page: Option<usize>,
    pub stalled: Notify,
    /// Entity page index that fails with a throttling error
    pub fail_at_page: Option<usize>,

    pub calls: AtomicUsize,
    pub operations: Mutex<Vec<&'static str>>,
    pub workspace_requests: Mutex<Vec<ListWorkspacesRequest>>,
    pub scene_requests: Mutex<Vec<ListScenesRequest>>,
    pub entity_requests: Mutex<Vec<ListEntitiesRequest>>,
    pub component_type_requests: Mutex<Vec<ListComponentTypesRequest>>,
    pub property_value_requests: Mutex<Vec<GetPropertyValueRequest>>,
    pub history_requests: Mutex<Vec<GetPropertyValueHistoryRequest>>,
}

impl FakeCatalog {
    pub fn with_entity_pages(counts: &[usize]) -> Self {
        Self {
            entity_pages: entity_pages(counts),
            ..Self::default()
        }
    }

    pub fn with_workspace_pages(counts: &[usize]) -> Self {
        Self {
            workspace_pages: workspace_pages(counts),
            ..Self::default()
        }
    }

    pub fn with_scene_pages(counts: &[usize]) -> Self {
        Self {
            scene_pages: scene_pages(counts),
            ..Self::default()
        }
    }

    pub fn with_component_type_pages(counts: &[usize]) -> Self {
        Self {
            component_type_pages: component_type_pages(counts),
            ..Self::default()
        }
    }

    pub fn with_workspace(arn: &str, s3_location: &str) -> Self {
        Self {
            workspace: Some(Workspace {
                workspace_id: "CookieFactory".into(),
                arn: arn.into(),
                s3_location: Some(s3_location.into()),
                ..Workspace::default()
            }),
            ..Self::default()
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn operations(&self) -> Vec<&'static str> {
        self.operations.lock().unwrap().clone()
    }

    fn record(&self, operation: &'static str) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.operations.lock().unwrap().push(operation);
    }
}

#[async_trait]
impl CatalogService for FakeCatalog {
    async fn list_workspaces(&self, request: &ListWorkspacesRequest) -> Result<Page<WorkspaceSummary>> {
        self.record("ListWorkspaces");
        self.workspace_requests.lock().unwrap().push(request.clone());
        Ok(serve(&self.workspace_pages, request.next_token.as_deref()))
    }

    async fn list_scenes(&self, request: &ListScenesRequest) -> Result<Page<SceneSummary>> {
        self.record("ListScenes");
        self.scene_requests.lock().unwrap().push(request.clone());
        Ok(serve(&self.scene_pages, request.next_token.as_deref()))
    }

    async fn list_entities(&self, request: &ListEntitiesRequest) -> Result<Page<EntitySummary>> {
        self.record("ListEntities");
        self.entity_requests.lock().unwrap().push(request.clone());

        let index = page_index(request.next_token.as_deref());
        if self.stall_at_page == Some(index) {
            self.stalled.notify_one();
            std::future::pending::<()>().await;
        }
        if self.fail_at_page == Some(index) {
            return Err(RemoteError::new("iottwinmaker", "ListEntities", "Rate exceeded")
                .with_status(429)
                .with_code("ThrottlingException")
                .into());
        }
        Ok(serve(&self.entity_pages, request.next_token.as_deref()))
    }

    async fn list_component_types(
        &self,
        request: &ListComponentTypesRequest,
    ) -> Result<Page<ComponentTypeSummary>> {
        self.record("ListComponentTypes");
        self.component_type_requests.lock().unwrap().push(request.clone());
        Ok(serve(&self.component_type_pages, request.next_token.as_deref()))
    }

    async fn get_workspace(&self, request: &GetWorkspaceRequest) -> Result<Workspace> {
        self.record("GetWorkspace");
        self.workspace.clone().ok_or_else(|| {
            RemoteError::new(
                "iottwinmaker",
                "GetWorkspace",
                format!("Workspace {} not found", request.workspace_id),
            )
            .with_status(404)
            .with_code("ResourceNotFoundException")
            .into()
        })
    }

    async fn get_entity(&self, request: &GetEntityRequest) -> Result<Entity> {
        self.record("GetEntity");
        Ok(Entity {
            workspace_id: request.workspace_id.clone(),
            entity_id: request.entity_id.clone(),
            ..Entity::default()
        })
    }

    async fn get_component_type(&self, request: &GetComponentTypeRequest) -> Result<ComponentType> {
        self.record("GetComponentType");
        Ok(ComponentType {
            workspace_id: request.workspace_id.clone(),
            component_type_id: request.component_type_id.clone(),
            ..ComponentType::default()
        })
    }

    async fn get_property_value(
        &self,
        request: &GetPropertyValueRequest,
    ) -> Result<GetPropertyValueOutput> {
        self.record("GetPropertyValue");
        self.property_value_requests.lock().unwrap().push(request.clone());
        Ok(GetPropertyValueOutput::default())
    }

    async fn get_property_value_history(
        &self,
        request: &GetPropertyValueHistoryRequest,
    ) -> Result<GetPropertyValueHistoryOutput> {
        self.record("GetPropertyValueHistory");
        self.history_requests.lock().unwrap().push(request.clone());
        Ok(GetPropertyValueHistoryOutput {
            property_values: vec![],
            next_token: Some("history-2".into()),
        })
    }
}

pub fn issued(access_key_id: &str, expiration: DateTime<Utc>) -> CredentialSet {
    CredentialSet {
        access_key_id: access_key_id.into(),
        secret_access_key: "issued-secret".into(),
        session_token: "issued-token".into(),
        expiration,
    }
}

#[derive(Default)]
pub struct FakeTokens {
    pub assume_role_requests: Mutex<Vec<AssumeRoleRequest>>,
    pub session_token_requests: Mutex<Vec<GetSessionTokenRequest>>,
    pub fail: bool,
}

impl FakeTokens {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    fn rejected(&self, operation: &'static str) -> Result<CredentialSet> {
        Err(RemoteError::new("sts", operation, "User is not authorized to perform sts:AssumeRole")
            .with_status(403)
            .with_code("AccessDenied")
            .into())
    }
}

#[async_trait]
impl TokenService for FakeTokens {
    async fn assume_role(&self, request: &AssumeRoleRequest) -> Result<CredentialSet> {
        self.assume_role_requests.lock().unwrap().push(request.clone());
        if self.fail {
            return self.rejected("AssumeRole");
        }
        Ok(issued("ASIAROLE", Utc::now() + chrono::Duration::seconds(request.duration_seconds)))
    }

    async fn get_session_token(&self, request: &GetSessionTokenRequest) -> Result<CredentialSet> {
        self.session_token_requests.lock().unwrap().push(request.clone());
        if self.fail {
            return self.rejected("GetSessionToken");
        }
        Ok(issued("ASIASESSION", Utc::now() + chrono::Duration::seconds(request.duration_seconds)))
    }
}

/// Provider returning a fresh key id on every resolution
pub struct SequenceProvider {
    pub session_token: Option<String>,
    pub reported_expiration: Option<DateTime<Utc>>,
    pub resolutions: AtomicUsize,
    pub fail: bool,
}

impl SequenceProvider {
    pub fn temporary(reported_expiration: DateTime<Utc>) -> Self {
        Self {
            session_token: Some("ambient-token".into()),
            reported_expiration: Some(reported_expiration),
            resolutions: AtomicUsize::new(0),
            fail: false,
        }
    }

    pub fn permanent() -> Self {
        Self {
            session_token: None,
            reported_expiration: None,
            resolutions: AtomicUsize::new(0),
            fail: false,
        }
    }

    pub fn resolutions(&self) -> usize {
        self.resolutions.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProvideCredentials for SequenceProvider {
    async fn provide_credentials(&self) -> std::result::Result<Credentials, CredentialsError> {
        let n = self.resolutions.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail && n > 1 {
            return Err(CredentialsError::failed("sequence", "refresh endpoint unavailable"));
        }
        let credentials = Credentials::new(
            format!("ASIAAMBIENT{}", n),
            "ambient-secret",
            self.session_token.clone(),
            "sequence",
        );
        Ok(match self.reported_expiration {
            Some(expiration) => credentials.with_expiration(expiration),
            None => credentials,
        })
    }

    fn name(&self) -> &'static str {
        "sequence"
    }
}

pub fn shared<T>(value: T) -> Arc<T> {
    Arc::new(value)
}
