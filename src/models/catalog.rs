//! Catalog (TwinMaker REST-JSON) requests and responses

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{epoch_seconds, Page};
use crate::query::OrderBy;

// =============================================================================
// Shared value types
// =============================================================================

/// A typed property value. Exactly one member is set on the wire.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DataValue {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub boolean_value: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub double_value: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub integer_value: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub long_value: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub string_value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub list_value: Option<Vec<DataValue>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub map_value: Option<HashMap<String, DataValue>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relationship_value: Option<RelationshipValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expression: Option<String>,
}

impl DataValue {
    pub fn string(value: impl Into<String>) -> Self {
        Self {
            string_value: Some(value.into()),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RelationshipValue {
    pub target_component_name: Option<String>,
    pub target_entity_id: Option<String>,
}

/// Remote form of a `(name, operator, value)` filter triple
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyFilter {
    pub property_name: String,
    pub operator: String,
    pub value: DataValue,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Status {
    pub state: Option<String>,
    pub error: Option<ErrorDetails>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ErrorDetails {
    pub code: Option<String>,
    pub message: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EntityPropertyReference {
    pub component_name: Option<String>,
    pub entity_id: Option<String>,
    pub external_id_property: Option<HashMap<String, String>>,
    pub property_name: String,
}

// =============================================================================
// Requests
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListWorkspacesRequest {
    pub max_results: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_token: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListScenesRequest {
    #[serde(skip)]
    pub workspace_id: String,
    pub max_results: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_token: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ListEntitiesFilter {
    ComponentTypeId(String),
    ParentEntityId(String),
    ExternalId(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListEntitiesRequest {
    #[serde(skip)]
    pub workspace_id: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub filters: Vec<ListEntitiesFilter>,
    pub max_results: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_token: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ListComponentTypesFilter {
    ExtendsFrom(String),
    Namespace(String),
    IsAbstract(bool),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListComponentTypesRequest {
    #[serde(skip)]
    pub workspace_id: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub filters: Vec<ListComponentTypesFilter>,
    pub max_results: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_token: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetWorkspaceRequest {
    pub workspace_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetEntityRequest {
    pub workspace_id: String,
    pub entity_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetComponentTypeRequest {
    pub workspace_id: String,
    pub component_type_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GetPropertyValueRequest {
    #[serde(skip)]
    pub workspace_id: String,
    pub entity_id: String,
    pub component_name: String,
    pub selected_properties: Vec<String>,
}

/// Exactly one of the entity path (`entity_id` + `component_name`) or the
/// component-type path (`component_type_id`) is populated.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GetPropertyValueHistoryRequest {
    #[serde(skip)]
    pub workspace_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub component_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub component_type_id: Option<String>,
    pub selected_properties: Vec<String>,
    #[serde(serialize_with = "epoch_seconds::serialize")]
    pub start_date_time: DateTime<Utc>,
    #[serde(serialize_with = "epoch_seconds::serialize")]
    pub end_date_time: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_by_time: Option<OrderBy>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub property_filters: Vec<PropertyFilter>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_token: Option<String>,
}

// =============================================================================
// Responses
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WorkspaceSummary {
    pub workspace_id: String,
    pub arn: String,
    pub description: Option<String>,
    #[serde(with = "epoch_seconds::option")]
    pub creation_date_time: Option<DateTime<Utc>>,
    #[serde(with = "epoch_seconds::option")]
    pub update_date_time: Option<DateTime<Utc>>,
}

/// Workspace descriptor, also the input to policy synthesis
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Workspace {
    pub workspace_id: String,
    pub arn: String,
    pub description: Option<String>,
    pub role: Option<String>,
    pub s3_location: Option<String>,
    #[serde(with = "epoch_seconds::option")]
    pub creation_date_time: Option<DateTime<Utc>>,
    #[serde(with = "epoch_seconds::option")]
    pub update_date_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SceneSummary {
    pub scene_id: String,
    pub arn: String,
    pub content_location: Option<String>,
    pub description: Option<String>,
    #[serde(with = "epoch_seconds::option")]
    pub creation_date_time: Option<DateTime<Utc>>,
    #[serde(with = "epoch_seconds::option")]
    pub update_date_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EntitySummary {
    pub entity_id: String,
    pub entity_name: String,
    pub arn: String,
    pub parent_entity_id: Option<String>,
    pub description: Option<String>,
    pub has_child_entities: Option<bool>,
    pub status: Option<Status>,
    #[serde(with = "epoch_seconds::option")]
    pub creation_date_time: Option<DateTime<Utc>>,
    #[serde(with = "epoch_seconds::option")]
    pub update_date_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ComponentTypeSummary {
    pub component_type_id: String,
    pub arn: String,
    pub description: Option<String>,
    pub status: Option<Status>,
    #[serde(with = "epoch_seconds::option")]
    pub creation_date_time: Option<DateTime<Utc>>,
    #[serde(with = "epoch_seconds::option")]
    pub update_date_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ComponentType {
    pub workspace_id: String,
    pub component_type_id: String,
    pub arn: String,
    pub description: Option<String>,
    pub extends_from: Vec<String>,
    pub is_abstract: Option<bool>,
    pub is_singleton: Option<bool>,
    pub is_schema_initialized: Option<bool>,
    pub property_definitions: HashMap<String, serde_json::Value>,
    pub functions: HashMap<String, serde_json::Value>,
    pub status: Option<Status>,
    #[serde(with = "epoch_seconds::option")]
    pub creation_date_time: Option<DateTime<Utc>>,
    #[serde(with = "epoch_seconds::option")]
    pub update_date_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PropertyResponse {
    pub definition: Option<serde_json::Value>,
    pub value: Option<DataValue>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ComponentResponse {
    pub component_name: String,
    pub component_type_id: String,
    pub description: Option<String>,
    pub defined_in: Option<String>,
    pub properties: HashMap<String, PropertyResponse>,
    pub status: Option<Status>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Entity {
    pub workspace_id: String,
    pub entity_id: String,
    pub entity_name: String,
    pub arn: String,
    pub parent_entity_id: Option<String>,
    pub description: Option<String>,
    pub has_child_entities: Option<bool>,
    pub components: HashMap<String, ComponentResponse>,
    pub status: Option<Status>,
    #[serde(with = "epoch_seconds::option")]
    pub creation_date_time: Option<DateTime<Utc>>,
    #[serde(with = "epoch_seconds::option")]
    pub update_date_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PropertyLatestValue {
    pub property_reference: EntityPropertyReference,
    pub property_value: Option<DataValue>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GetPropertyValueOutput {
    pub property_values: HashMap<String, PropertyLatestValue>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PropertyValue {
    pub time: Option<String>,
    #[serde(with = "epoch_seconds::option")]
    pub timestamp: Option<DateTime<Utc>>,
    pub value: DataValue,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PropertyValueHistory {
    pub entity_property_reference: EntityPropertyReference,
    pub values: Vec<PropertyValue>,
}

/// History is a single call; the token is handed back for the caller's own paging
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GetPropertyValueHistoryOutput {
    pub property_values: Vec<PropertyValueHistory>,
    pub next_token: Option<String>,
}

// -----------------------------------------------------------------------------
// List response envelopes, decoded by the transport then turned into pages
// -----------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ListWorkspacesResponse {
    pub workspace_summaries: Vec<WorkspaceSummary>,
    pub next_token: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ListScenesResponse {
    pub scene_summaries: Vec<SceneSummary>,
    pub next_token: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ListEntitiesResponse {
    pub entity_summaries: Vec<EntitySummary>,
    pub next_token: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ListComponentTypesResponse {
    pub component_type_summaries: Vec<ComponentTypeSummary>,
    pub next_token: Option<String>,
}

impl From<ListWorkspacesResponse> for Page<WorkspaceSummary> {
    fn from(response: ListWorkspacesResponse) -> Self {
        Page::new(response.workspace_summaries, response.next_token)
    }
}

impl From<ListScenesResponse> for Page<SceneSummary> {
    fn from(response: ListScenesResponse) -> Self {
        Page::new(response.scene_summaries, response.next_token)
    }
}

impl From<ListEntitiesResponse> for Page<EntitySummary> {
    fn from(response: ListEntitiesResponse) -> Self {
        Page::new(response.entity_summaries, response.next_token)
    }
}

impl From<ListComponentTypesResponse> for Page<ComponentTypeSummary> {
    fn from(response: ListComponentTypesResponse) -> Self {
        Page::new(response.component_type_summaries, response.next_token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn entity_filter_serializes_as_single_member_object() {
        let request = ListEntitiesRequest {
            workspace_id: "W1".into(),
            filters: vec![ListEntitiesFilter::ComponentTypeId("T1".into())],
            max_results: 200,
            next_token: None,
        };
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({ "filters": [{ "componentTypeId": "T1" }], "maxResults": 200 })
        );
    }

    #[test]
    fn history_request_omits_unused_path() {
        let request = GetPropertyValueHistoryRequest {
            workspace_id: "W1".into(),
            entity_id: None,
            component_name: None,
            component_type_id: Some("com.example.alarm".into()),
            selected_properties: vec!["alarm_status".into()],
            start_date_time: DateTime::from_timestamp(1_635_728_400, 0).unwrap(),
            end_date_time: DateTime::from_timestamp(1_636_326_300, 0).unwrap(),
            order_by_time: Some(OrderBy::Ascending),
            property_filters: vec![],
            next_token: None,
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["componentTypeId"], "com.example.alarm");
        assert_eq!(value["orderByTime"], "ASCENDING");
        assert_eq!(value["startDateTime"], 1_635_728_400.0);
        assert!(value.get("entityId").is_none());
        assert!(value.get("componentName").is_none());
        assert!(value.get("nextToken").is_none());
        assert!(value.get("propertyFilters").is_none());
    }

    #[test]
    fn decodes_entity_page() {
        let response: ListEntitiesResponse = serde_json::from_value(json!({
            "entitySummaries": [{
                "entityId": "Mixer_1",
                "entityName": "Mixer 1",
                "arn": "arn:aws:iottwinmaker:us-east-1:111122223333:workspace/W1/entity/Mixer_1",
                "status": { "state": "ACTIVE" },
                "hasChildEntities": false,
                "creationDateTime": 1.63608E9
            }],
            "nextToken": "page-2"
        }))
        .unwrap();

        let page: Page<EntitySummary> = response.into();
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.next_token.as_deref(), Some("page-2"));
        assert_eq!(
            page.items[0].creation_date_time.map(|t| t.timestamp()),
            Some(1_636_080_000)
        );
    }
}
