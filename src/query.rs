//! Query descriptor submitted by the dashboard query layer

use chrono::{DateTime, Utc};
use serde::de::IntoDeserializer;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::ValidationError;
use crate::models::catalog::{DataValue, PropertyFilter};

/// Immutable request descriptor for one catalog operation.
///
/// Empty strings mean "not set", matching the JSON the dashboard sends.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TwinMakerQuery {
    pub workspace_id: String,
    pub entity_id: String,
    pub component_name: String,
    pub component_type_id: String,
    pub properties: Vec<String>,
    pub next_token: String,
    pub time_range: Option<TimeRange>,
    #[serde(deserialize_with = "blank_order_as_none")]
    pub order: Option<OrderBy>,
    pub filter: Vec<PropertyFilterQuery>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderBy {
    Ascending,
    Descending,
}

fn blank_order_as_none<'de, D>(deserializer: D) -> Result<Option<OrderBy>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(order) => {
            OrderBy::deserialize(IntoDeserializer::<D::Error>::into_deserializer(order)).map(Some)
        }
    }
}

/// One `(name, operator, value)` filter triple
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PropertyFilterQuery {
    pub name: String,
    pub op: String,
    pub value: String,
}

/// Operator applied when the dashboard leaves it blank
pub const DEFAULT_FILTER_OPERATOR: &str = "=";

impl PropertyFilterQuery {
    pub fn new(name: impl Into<String>, op: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            op: op.into(),
            value: value.into(),
        }
    }

    /// Half-filled rows from the query editor are skipped
    pub fn is_complete(&self) -> bool {
        !self.name.is_empty() && !self.value.is_empty()
    }

    pub fn to_remote(&self) -> PropertyFilter {
        let operator = if self.op.is_empty() {
            DEFAULT_FILTER_OPERATOR
        } else {
            self.op.as_str()
        };
        PropertyFilter {
            property_name: self.name.clone(),
            operator: operator.to_string(),
            value: DataValue::string(self.value.clone()),
        }
    }
}

impl TwinMakerQuery {
    pub fn for_workspace(workspace_id: impl Into<String>) -> Self {
        Self {
            workspace_id: workspace_id.into(),
            ..Self::default()
        }
    }

    pub fn with_entity(mut self, entity_id: impl Into<String>) -> Self {
        self.entity_id = entity_id.into();
        self
    }

    pub fn with_component_name(mut self, component_name: impl Into<String>) -> Self {
        self.component_name = component_name.into();
        self
    }

    pub fn with_component_type(mut self, component_type_id: impl Into<String>) -> Self {
        self.component_type_id = component_type_id.into();
        self
    }

    pub fn with_properties<I, S>(mut self, properties: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.properties = properties.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_time_range(mut self, from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        self.time_range = Some(TimeRange { from, to });
        self
    }

    pub fn with_order(mut self, order: OrderBy) -> Self {
        self.order = Some(order);
        self
    }

    pub fn with_filter(mut self, filter: PropertyFilterQuery) -> Self {
        self.filter.push(filter);
        self
    }

    pub fn with_next_token(mut self, token: impl Into<String>) -> Self {
        self.next_token = token.into();
        self
    }

    /// Continuation token to resume from, `None` when the caller sent an empty one
    pub fn continuation(&self) -> Option<String> {
        non_empty(&self.next_token)
    }

    pub(crate) fn require_workspace(&self) -> Result<(), ValidationError> {
        if self.workspace_id.is_empty() {
            return Err(ValidationError::MissingWorkspaceId);
        }
        Ok(())
    }

    pub(crate) fn require_properties(&self) -> Result<(), ValidationError> {
        if self.properties.is_empty() {
            return Err(ValidationError::MissingProperty);
        }
        Ok(())
    }

    /// Filter triples in remote form, incomplete rows dropped
    pub fn remote_filters(&self) -> Vec<PropertyFilter> {
        self.filter
            .iter()
            .filter(|f| f.is_complete())
            .map(PropertyFilterQuery::to_remote)
            .collect()
    }
}

pub(crate) fn non_empty(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}
