//! Paginated query executor
//!
//! One method per catalog operation. Required query fields are checked
//! before anything goes on the wire. List operations drain every page in
//! order into one [`AggregatedResult`]; get operations are a single call.

use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::context::RequestContext;
use crate::error::{Result, ValidationError};
use crate::facade::CatalogService;
use crate::models::catalog::*;
use crate::models::{AggregatedResult, Page, MAX_PAGE_SIZE};
use crate::query::{non_empty, TwinMakerQuery};

enum Cursor {
    Start(Option<String>),
    Next(String),
    Done,
}

/// Lazy, strictly sequential page sequence for one list query.
///
/// Page N+1 is only requested after page N arrived, with page N's token.
pub struct Pages<'c, T, F> {
    ctx: &'c RequestContext,
    operation: &'static str,
    fetch: F,
    cursor: Cursor,
    fetched: usize,
    _item: PhantomData<fn() -> T>,
}

impl<'c, T, F, Fut> Pages<'c, T, F>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = Result<Page<T>>>,
{
    pub fn new(
        ctx: &'c RequestContext,
        operation: &'static str,
        start: Option<String>,
        fetch: F,
    ) -> Self {
        Self {
            ctx,
            operation,
            fetch,
            cursor: Cursor::Start(start),
            fetched: 0,
            _item: PhantomData,
        }
    }

    /// The next page, or `None` once a page without a token has been returned
    pub async fn next(&mut self) -> Result<Option<Page<T>>> {
        let token = match std::mem::replace(&mut self.cursor, Cursor::Done) {
            Cursor::Start(token) => token,
            Cursor::Next(token) => Some(token),
            Cursor::Done => return Ok(None),
        };

        let page = self.ctx.run((self.fetch)(token)).await?;
        self.fetched += 1;
        tracing::debug!(
            operation = self.operation,
            page = self.fetched,
            items = page.items.len(),
            more = !page.is_last(),
            "Fetched page"
        );

        if let Some(token) = page.next_token.clone() {
            self.cursor = Cursor::Next(token);
        }
        Ok(Some(page))
    }

    /// Drain every page. Any failure discards what was gathered so far.
    pub async fn collect(mut self) -> Result<AggregatedResult<T>> {
        let mut items = Vec::new();
        while let Some(page) = self.next().await? {
            items.extend(page.items);
        }
        Ok(AggregatedResult {
            items,
            pages: self.fetched,
        })
    }
}

/// Follow continuation tokens from `start` until the last page
pub async fn collect_pages<T, F, Fut>(
    ctx: &RequestContext,
    operation: &'static str,
    start: Option<String>,
    fetch: F,
) -> Result<AggregatedResult<T>>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = Result<Page<T>>>,
{
    Pages::new(ctx, operation, start, fetch).collect().await
}

#[derive(Clone)]
pub struct QueryExecutor {
    catalog: Arc<dyn CatalogService>,
}

impl QueryExecutor {
    pub fn new(catalog: Arc<dyn CatalogService>) -> Self {
        Self { catalog }
    }

    pub async fn list_workspaces(
        &self,
        ctx: &RequestContext,
        query: &TwinMakerQuery,
    ) -> Result<AggregatedResult<WorkspaceSummary>> {
        let catalog = &self.catalog;
        collect_pages(ctx, "ListWorkspaces", query.continuation(), |next_token| {
            let request = ListWorkspacesRequest {
                max_results: MAX_PAGE_SIZE,
                next_token,
            };
            async move { catalog.list_workspaces(&request).await }
        })
        .await
    }

    pub async fn list_scenes(
        &self,
        ctx: &RequestContext,
        query: &TwinMakerQuery,
    ) -> Result<AggregatedResult<SceneSummary>> {
        query.require_workspace()?;

        let catalog = &self.catalog;
        collect_pages(ctx, "ListScenes", query.continuation(), |next_token| {
            let request = ListScenesRequest {
                workspace_id: query.workspace_id.clone(),
                max_results: MAX_PAGE_SIZE,
                next_token,
            };
            async move { catalog.list_scenes(&request).await }
        })
        .await
    }

    /// Constrained to one component type when the query names one
    pub async fn list_entities(
        &self,
        ctx: &RequestContext,
        query: &TwinMakerQuery,
    ) -> Result<AggregatedResult<EntitySummary>> {
        query.require_workspace()?;

        let filters: Vec<ListEntitiesFilter> = non_empty(&query.component_type_id)
            .map(ListEntitiesFilter::ComponentTypeId)
            .into_iter()
            .collect();

        let catalog = &self.catalog;
        collect_pages(ctx, "ListEntities", query.continuation(), |next_token| {
            let request = ListEntitiesRequest {
                workspace_id: query.workspace_id.clone(),
                filters: filters.clone(),
                max_results: MAX_PAGE_SIZE,
                next_token,
            };
            async move { catalog.list_entities(&request).await }
        })
        .await
    }

    /// Constrained to types extending the query's component type when it names one
    pub async fn list_component_types(
        &self,
        ctx: &RequestContext,
        query: &TwinMakerQuery,
    ) -> Result<AggregatedResult<ComponentTypeSummary>> {
        query.require_workspace()?;

        let filters: Vec<ListComponentTypesFilter> = non_empty(&query.component_type_id)
            .map(ListComponentTypesFilter::ExtendsFrom)
            .into_iter()
            .collect();

        let catalog = &self.catalog;
        collect_pages(ctx, "ListComponentTypes", query.continuation(), |next_token| {
            let request = ListComponentTypesRequest {
                workspace_id: query.workspace_id.clone(),
                filters: filters.clone(),
                max_results: MAX_PAGE_SIZE,
                next_token,
            };
            async move { catalog.list_component_types(&request).await }
        })
        .await
    }

    pub async fn get_workspace(&self, ctx: &RequestContext, query: &TwinMakerQuery) -> Result<Workspace> {
        query.require_workspace()?;

        let request = GetWorkspaceRequest {
            workspace_id: query.workspace_id.clone(),
        };
        ctx.run(self.catalog.get_workspace(&request)).await
    }

    pub async fn get_entity(&self, ctx: &RequestContext, query: &TwinMakerQuery) -> Result<Entity> {
        if query.entity_id.is_empty() {
            return Err(ValidationError::MissingEntityId.into());
        }
        query.require_workspace()?;

        let request = GetEntityRequest {
            workspace_id: query.workspace_id.clone(),
            entity_id: query.entity_id.clone(),
        };
        ctx.run(self.catalog.get_entity(&request)).await
    }

    pub async fn get_component_type(
        &self,
        ctx: &RequestContext,
        query: &TwinMakerQuery,
    ) -> Result<ComponentType> {
        if query.component_type_id.is_empty() {
            return Err(ValidationError::MissingComponentTypeId.into());
        }
        query.require_workspace()?;

        let request = GetComponentTypeRequest {
            workspace_id: query.workspace_id.clone(),
            component_type_id: query.component_type_id.clone(),
        };
        ctx.run(self.catalog.get_component_type(&request)).await
    }

    /// Latest value of non-timeseries properties on one entity component
    pub async fn get_property_value(
        &self,
        ctx: &RequestContext,
        query: &TwinMakerQuery,
    ) -> Result<GetPropertyValueOutput> {
        if query.entity_id.is_empty() {
            return Err(ValidationError::MissingEntityId.into());
        }
        if query.component_name.is_empty() {
            return Err(ValidationError::MissingComponentName.into());
        }
        query.require_properties()?;
        query.require_workspace()?;

        let request = GetPropertyValueRequest {
            workspace_id: query.workspace_id.clone(),
            entity_id: query.entity_id.clone(),
            component_name: query.component_name.clone(),
            selected_properties: query.properties.clone(),
        };
        ctx.run(self.catalog.get_property_value(&request)).await
    }

    /// One page of timeseries history.
    ///
    /// A component type id selects the component-type path; otherwise the
    /// entity and component name are used. The continuation token is handed
    /// back to the caller rather than followed.
    pub async fn get_property_value_history(
        &self,
        ctx: &RequestContext,
        query: &TwinMakerQuery,
    ) -> Result<GetPropertyValueHistoryOutput> {
        let request = Self::history_request(query)?;

        tracing::debug!(
            workspace_id = %request.workspace_id,
            component_type_path = request.component_type_id.is_some(),
            properties = request.selected_properties.len(),
            filters = request.property_filters.len(),
            "Requesting property value history"
        );
        ctx.run(self.catalog.get_property_value_history(&request)).await
    }

    fn history_request(query: &TwinMakerQuery) -> Result<GetPropertyValueHistoryRequest> {
        if query.entity_id.is_empty() && query.component_type_id.is_empty() {
            return Err(ValidationError::MissingEntityOrComponentType.into());
        }

        let (entity_id, component_name, component_type_id) = match non_empty(&query.component_type_id) {
            Some(component_type_id) => {
                query.require_properties()?;
                (None, None, Some(component_type_id))
            }
            None => {
                if query.component_name.is_empty() {
                    return Err(ValidationError::MissingComponentName.into());
                }
                query.require_properties()?;
                (
                    Some(query.entity_id.clone()),
                    Some(query.component_name.clone()),
                    None,
                )
            }
        };

        let time_range = query.time_range.ok_or(ValidationError::MissingTimeRange)?;
        query.require_workspace()?;

        Ok(GetPropertyValueHistoryRequest {
            workspace_id: query.workspace_id.clone(),
            entity_id,
            component_name,
            component_type_id,
            selected_properties: query.properties.clone(),
            start_date_time: time_range.from,
            end_date_time: time_range.to,
            order_by_time: query.order,
            property_filters: query.remote_filters(),
            next_token: query.continuation(),
        })
    }
}
