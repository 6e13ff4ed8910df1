//! reqwest-backed catalog and token services

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use url::Url;

use super::session::Session;
use super::sigv4::{self, SigningRequest};
use super::{CatalogService, TokenService};
use crate::error::{RemoteError, Result, SessionError};
use crate::models::catalog::*;
use crate::models::sts::{
    AssumeRoleRequest, AssumeRoleResponse, CredentialSet, ErrorResponse, GetSessionTokenRequest,
    GetSessionTokenResponse,
};
use crate::models::Page;

const CATALOG_SERVICE: &str = "iottwinmaker";
const TOKEN_SERVICE: &str = "sts";
const JSON_CONTENT_TYPE: &str = "application/json";
const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded; charset=utf-8";

struct RawResponse {
    status: u16,
    error_type: Option<String>,
    body: Vec<u8>,
}

impl RawResponse {
    fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    fn body_preview(&self) -> String {
        String::from_utf8_lossy(&self.body).chars().take(200).collect()
    }
}

/// Signs and sends requests for one service against one base URL
#[derive(Clone)]
struct SignedTransport {
    session: Arc<Session>,
    service: &'static str,
    base_url: Url,
}

impl SignedTransport {
    fn new(session: Arc<Session>, service: &'static str, base_url: Url) -> Self {
        Self {
            session,
            service,
            base_url,
        }
    }

    async fn send(
        &self,
        operation: &'static str,
        method: Method,
        path: &str,
        content_type: Option<&'static str>,
        body: Vec<u8>,
    ) -> Result<RawResponse> {
        let url = join_path(&self.base_url, path);

        let credentials = self
            .session
            .credentials()
            .get()
            .await
            .map_err(SessionError::Credentials)?;

        let signed = sigv4::sign(
            &SigningRequest {
                method: method.as_str(),
                url: &url,
                headers: content_type
                    .map(|ct| vec![("content-type".to_string(), ct.to_string())])
                    .unwrap_or_default(),
                body: &body,
            },
            &credentials,
            self.session.region(),
            self.service,
            Utc::now(),
        );

        let mut request = self
            .session
            .http()
            .request(method, url)
            .header(USER_AGENT, self.session.user_agent())
            .header("x-amz-date", signed.amz_date)
            .header(AUTHORIZATION, signed.authorization);
        if let Some(token) = signed.security_token {
            request = request.header("x-amz-security-token", token);
        }
        if let Some(content_type) = content_type {
            request = request.header(CONTENT_TYPE, content_type);
        }
        if !body.is_empty() {
            request = request.body(body);
        }

        let response = request.send().await.map_err(|e| {
            tracing::warn!(service = self.service, operation, error = %e, "Remote call failed to complete");
            RemoteError::new(self.service, operation, e.to_string())
        })?;

        let status = response.status().as_u16();
        let error_type = response
            .headers()
            .get("x-amzn-errortype")
            .and_then(|v| v.to_str().ok())
            .map(|v| v.split(':').next().unwrap_or(v).to_string());
        let body = response
            .bytes()
            .await
            .map_err(|e| {
                RemoteError::new(self.service, operation, format!("reading response: {}", e))
                    .with_status(status)
            })?
            .to_vec();

        tracing::debug!(service = self.service, operation, status, "Remote call completed");

        Ok(RawResponse {
            status,
            error_type,
            body,
        })
    }
}

/// `/seg/seg/...` with each dynamic segment percent-encoded
fn path(segments: &[&str]) -> String {
    segments
        .iter()
        .map(|s| format!("/{}", urlencoding::encode(s)))
        .collect()
}

/// Appends an encoded operation path below whatever path the base URL carries
fn join_path(base: &Url, path: &str) -> Url {
    let mut url = base.clone();
    let prefix = base.path().trim_end_matches('/');
    url.set_path(&format!("{}{}", prefix, path));
    url
}

fn service_url(session: &Session, host: String) -> std::result::Result<Url, SessionError> {
    if let Some(endpoint) = session.endpoint() {
        return Ok(endpoint.clone());
    }
    let candidate = format!("https://{}", host);
    Url::parse(&candidate).map_err(|e| SessionError::InvalidEndpoint {
        endpoint: candidate,
        reason: e.to_string(),
    })
}

// =============================================================================
// Catalog
// =============================================================================

/// Catalog service over TwinMaker's REST-JSON API.
///
/// Property value reads go to the data plane, everything else to the
/// control plane. An endpoint override replaces both.
pub struct HttpCatalogService {
    control: SignedTransport,
    data: SignedTransport,
}

#[derive(Debug, Default, Deserialize)]
struct CatalogErrorBody {
    #[serde(alias = "Message")]
    message: Option<String>,
    #[serde(rename = "__type")]
    kind: Option<String>,
}

impl HttpCatalogService {
    pub fn new(session: Arc<Session>) -> std::result::Result<Self, SessionError> {
        let region = session.region().to_string();
        let control = service_url(&session, format!("api.iottwinmaker.{}.amazonaws.com", region))?;
        let data = service_url(&session, format!("data.iottwinmaker.{}.amazonaws.com", region))?;
        Ok(Self {
            control: SignedTransport::new(session.clone(), CATALOG_SERVICE, control),
            data: SignedTransport::new(session, CATALOG_SERVICE, data),
        })
    }

    async fn post<B, T>(
        transport: &SignedTransport,
        operation: &'static str,
        path: &str,
        body: &B,
    ) -> Result<T>
    where
        B: Serialize + Sync,
        T: DeserializeOwned,
    {
        let payload = serde_json::to_vec(body).map_err(|e| {
            RemoteError::new(CATALOG_SERVICE, operation, format!("encoding request: {}", e))
        })?;
        let raw = transport
            .send(operation, Method::POST, path, Some(JSON_CONTENT_TYPE), payload)
            .await?;
        Self::decode(operation, raw)
    }

    async fn get<T: DeserializeOwned>(
        transport: &SignedTransport,
        operation: &'static str,
        path: &str,
    ) -> Result<T> {
        let raw = transport
            .send(operation, Method::GET, path, None, Vec::new())
            .await?;
        Self::decode(operation, raw)
    }

    fn decode<T: DeserializeOwned>(operation: &'static str, raw: RawResponse) -> Result<T> {
        if !raw.is_success() {
            return Err(Self::remote_error(operation, raw).into());
        }
        serde_json::from_slice(&raw.body).map_err(|e| {
            RemoteError::new(CATALOG_SERVICE, operation, format!("decoding response: {}", e))
                .with_status(raw.status)
                .into()
        })
    }

    fn remote_error(operation: &'static str, raw: RawResponse) -> RemoteError {
        let body: CatalogErrorBody = serde_json::from_slice(&raw.body).unwrap_or_default();
        let message = body.message.unwrap_or_else(|| raw.body_preview());
        let code = raw.error_type.clone().or_else(|| {
            body.kind
                .as_deref()
                .map(|k| k.rsplit('#').next().unwrap_or(k).to_string())
        });

        let err = RemoteError::new(CATALOG_SERVICE, operation, message).with_status(raw.status);
        tracing::warn!(operation, status = raw.status, code = ?code, "Catalog call rejected");
        match code {
            Some(code) => err.with_code(code),
            None => err,
        }
    }
}

#[async_trait]
impl CatalogService for HttpCatalogService {
    async fn list_workspaces(&self, request: &ListWorkspacesRequest) -> Result<Page<WorkspaceSummary>> {
        let response: ListWorkspacesResponse =
            Self::post(&self.control, "ListWorkspaces", "/workspaces-list", request).await?;
        Ok(response.into())
    }

    async fn list_scenes(&self, request: &ListScenesRequest) -> Result<Page<SceneSummary>> {
        let path = path(&["workspaces", &request.workspace_id, "scenes-list"]);
        let response: ListScenesResponse =
            Self::post(&self.control, "ListScenes", &path, request).await?;
        Ok(response.into())
    }

    async fn list_entities(&self, request: &ListEntitiesRequest) -> Result<Page<EntitySummary>> {
        let path = path(&["workspaces", &request.workspace_id, "entities-list"]);
        let response: ListEntitiesResponse =
            Self::post(&self.control, "ListEntities", &path, request).await?;
        Ok(response.into())
    }

    async fn list_component_types(
        &self,
        request: &ListComponentTypesRequest,
    ) -> Result<Page<ComponentTypeSummary>> {
        let path = path(&["workspaces", &request.workspace_id, "component-types-list"]);
        let response: ListComponentTypesResponse =
            Self::post(&self.control, "ListComponentTypes", &path, request).await?;
        Ok(response.into())
    }

    async fn get_workspace(&self, request: &GetWorkspaceRequest) -> Result<Workspace> {
        let path = path(&["workspaces", &request.workspace_id]);
        Self::get(&self.control, "GetWorkspace", &path).await
    }

    async fn get_entity(&self, request: &GetEntityRequest) -> Result<Entity> {
        let path = path(&["workspaces", &request.workspace_id, "entities", &request.entity_id]);
        Self::get(&self.control, "GetEntity", &path).await
    }

    async fn get_component_type(&self, request: &GetComponentTypeRequest) -> Result<ComponentType> {
        let path = path(&[
            "workspaces",
            &request.workspace_id,
            "component-types",
            &request.component_type_id,
        ]);
        Self::get(&self.control, "GetComponentType", &path).await
    }

    async fn get_property_value(
        &self,
        request: &GetPropertyValueRequest,
    ) -> Result<GetPropertyValueOutput> {
        let path = path(&["workspaces", &request.workspace_id, "entity-properties", "value"]);
        Self::post(&self.data, "GetPropertyValue", &path, request).await
    }

    async fn get_property_value_history(
        &self,
        request: &GetPropertyValueHistoryRequest,
    ) -> Result<GetPropertyValueHistoryOutput> {
        let path = path(&["workspaces", &request.workspace_id, "entity-properties", "history"]);
        Self::post(&self.data, "GetPropertyValueHistory", &path, request).await
    }
}

// =============================================================================
// Token service
// =============================================================================

/// Token service over the STS query protocol. Always the standard regional endpoint.
pub struct HttpTokenService {
    transport: SignedTransport,
}

impl HttpTokenService {
    pub fn new(session: Arc<Session>) -> std::result::Result<Self, SessionError> {
        let candidate = format!("https://sts.{}.amazonaws.com/", session.region());
        let base_url = Url::parse(&candidate).map_err(|e| SessionError::InvalidEndpoint {
            endpoint: candidate,
            reason: e.to_string(),
        })?;
        Ok(Self {
            transport: SignedTransport::new(session, TOKEN_SERVICE, base_url),
        })
    }

    async fn call<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        params: Vec<(&'static str, String)>,
    ) -> Result<T> {
        let body = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(params.iter())
            .finish();

        let raw = self
            .transport
            .send(operation, Method::POST, "/", Some(FORM_CONTENT_TYPE), body.into_bytes())
            .await?;

        let text = String::from_utf8_lossy(&raw.body);
        if !raw.is_success() {
            let parsed: ErrorResponse = quick_xml::de::from_str(&text).unwrap_or_default();
            let message = parsed
                .error
                .message
                .unwrap_or_else(|| raw.body_preview());
            let err = RemoteError::new(TOKEN_SERVICE, operation, message).with_status(raw.status);
            tracing::warn!(operation, status = raw.status, code = ?parsed.error.code, "Token call rejected");
            return Err(match parsed.error.code {
                Some(code) => err.with_code(code),
                None => err,
            }
            .into());
        }

        quick_xml::de::from_str(&text).map_err(|e| {
            RemoteError::new(TOKEN_SERVICE, operation, format!("decoding response: {}", e))
                .with_status(raw.status)
                .into()
        })
    }
}

#[async_trait]
impl TokenService for HttpTokenService {
    async fn assume_role(&self, request: &AssumeRoleRequest) -> Result<CredentialSet> {
        let response: AssumeRoleResponse = self.call("AssumeRole", request.form_params()).await?;
        Ok(response.assume_role_result.credentials)
    }

    async fn get_session_token(&self, request: &GetSessionTokenRequest) -> Result<CredentialSet> {
        let response: GetSessionTokenResponse =
            self.call("GetSessionToken", request.form_params()).await?;
        Ok(response.get_session_token_result.credentials)
    }
}
