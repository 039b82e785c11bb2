//! Request dispatch: maps an endpoint name, a method and a JSON payload to
//! the filter services.
//!
//! Every write goes through the validated stores in the caller's context,
//! never as system. Malformed payloads surface as `SchemaValidation`.

use febula_core::error::{FebulaError, FebulaResult};
use febula_core::models::context::CallerContext;
use febula_core::models::filter_object::{FilterObject, FilterObjectQuery, UpsertFilterObject};
use febula_core::models::filter_rule::{EmployeeType, FilterRule, PermissionSet, UpsertFilterRule};
use febula_core::repository::{ResourceCatalog, TableRepository};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::chain::SyncRuleRow;
use crate::engine::FilterEngine;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

impl Method {
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_uppercase().as_str() {
            "GET" => Some(Method::Get),
            "POST" => Some(Method::Post),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Filters,
    ProfileFilters,
    FiltersDelete,
    ProfileFiltersDelete,
    GetFiltersByKeys,
    GetResources,
    GetUdcs,
    SyncVisualization,
    FilterObjectOptions,
    FilterRuleOptions,
}

impl Endpoint {
    pub fn parse(value: &str) -> Option<Self> {
        let endpoint = match value {
            "filters" => Endpoint::Filters,
            "profile_filters" => Endpoint::ProfileFilters,
            "filters_delete" => Endpoint::FiltersDelete,
            "profile_filters_delete" => Endpoint::ProfileFiltersDelete,
            "get_filters_by_keys" => Endpoint::GetFiltersByKeys,
            "get_resources" => Endpoint::GetResources,
            "get_udcs" => Endpoint::GetUdcs,
            "sync_visualization" => Endpoint::SyncVisualization,
            "filter_object_options" => Endpoint::FilterObjectOptions,
            "filter_rule_options" => Endpoint::FilterRuleOptions,
            _ => return None,
        };
        Some(endpoint)
    }
}

#[derive(Debug, Deserialize)]
struct DeleteRequest {
    #[serde(rename = "Keys")]
    keys: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct KeyListRequest {
    #[serde(rename = "KeyList")]
    key_list: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ListingRequest {
    #[serde(rename = "PermissionSet")]
    permission_set: Option<PermissionSet>,
    #[serde(rename = "Search")]
    search: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FilterObjectFormRequest {
    #[serde(rename = "Resource")]
    resource: Option<String>,
    #[serde(rename = "Field")]
    field: Option<String>,
    #[serde(rename = "PreviousField")]
    previous_field: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FilterRuleFormRequest {
    #[serde(rename = "EmployeeType")]
    employee_type: Option<EmployeeType>,
    #[serde(rename = "Resource")]
    resource: Option<String>,
}

/// A visualization row with its rendered lineage.
#[derive(Debug, Serialize)]
struct VisualizationRow {
    #[serde(flatten)]
    row: SyncRuleRow,
    #[serde(rename = "Rule")]
    rule: String,
}

/// A required JSON body.
fn body<T: DeserializeOwned>(payload: Value) -> FebulaResult<T> {
    Ok(serde_json::from_value(payload)?)
}

/// Query parameters; an absent payload means no criteria.
fn query<T: DeserializeOwned + Default>(payload: Value) -> FebulaResult<T> {
    if payload.is_null() {
        return Ok(T::default());
    }
    body(payload)
}

fn respond<T: Serialize>(value: T) -> FebulaResult<Value> {
    serde_json::to_value(value).map_err(|e| FebulaError::Internal(e.to_string()))
}

fn blank_to_none(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

pub struct Router<C, O, R> {
    engine: FilterEngine<C, O, R>,
}

impl<C, O, R> Router<C, O, R>
where
    C: ResourceCatalog + Clone,
    O: TableRepository<FilterObject> + Clone,
    R: TableRepository<FilterRule> + Clone,
{
    pub fn new(engine: FilterEngine<C, O, R>) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &FilterEngine<C, O, R> {
        &self.engine
    }

    pub async fn handle(
        &self,
        ctx: &CallerContext,
        endpoint: &str,
        method: Method,
        payload: Value,
    ) -> FebulaResult<Value> {
        let Some(parsed) = Endpoint::parse(endpoint) else {
            return Err(FebulaError::UnsupportedRequest(format!(
                "unknown endpoint {endpoint}"
            )));
        };
        debug!(endpoint, ?method, "Dispatching request");
        self.dispatch(ctx, parsed, method, payload).await
    }

    async fn dispatch(
        &self,
        ctx: &CallerContext,
        endpoint: Endpoint,
        method: Method,
        payload: Value,
    ) -> FebulaResult<Value> {
        let objects = self.engine.filter_objects();
        let rules = self.engine.filter_rules();

        match (endpoint, method) {
            (Endpoint::Filters, Method::Get) => {
                let criteria: FilterObjectQuery = query(payload)?;
                respond(objects.get(&criteria).await?)
            }
            (Endpoint::Filters, Method::Post) => {
                let input: UpsertFilterObject = body(payload)?;
                respond(objects.upsert(ctx, input, false).await?)
            }
            (Endpoint::ProfileFilters, Method::Get) => {
                let request: ListingRequest = query(payload)?;
                let permission_set = request.permission_set.unwrap_or_default();
                let search = blank_to_none(request.search);
                respond(rules.list_for_display(permission_set, search.as_deref()).await?)
            }
            (Endpoint::ProfileFilters, Method::Post) => {
                let input: UpsertFilterRule = body(payload)?;
                respond(rules.upsert(ctx, input, false).await?)
            }
            (Endpoint::FiltersDelete, Method::Post) => {
                let request: DeleteRequest = body(payload)?;
                respond(objects.delete(ctx, &request.keys, false).await?)
            }
            (Endpoint::ProfileFiltersDelete, Method::Post) => {
                let request: DeleteRequest = body(payload)?;
                respond(rules.delete(ctx, &request.keys, false).await?)
            }
            (Endpoint::GetFiltersByKeys, Method::Get | Method::Post) => {
                let request: KeyListRequest = body(payload)?;
                respond(objects.get_by_keys(&request.key_list).await?)
            }
            (Endpoint::GetResources | Endpoint::GetUdcs, Method::Get) => {
                respond(self.engine.catalog().chain_hop_resources().await?)
            }
            (Endpoint::SyncVisualization, Method::Get) => {
                let request: ListingRequest = query(payload)?;
                let search = blank_to_none(request.search);
                let rows = self
                    .engine
                    .visualize(request.permission_set.unwrap_or_default(), search.as_deref())
                    .await?;
                respond(
                    rows.into_iter()
                        .map(|row| VisualizationRow {
                            rule: row.render_html(),
                            row,
                        })
                        .collect::<Vec<_>>(),
                )
            }
            (Endpoint::FilterObjectOptions, Method::Get) => {
                let request: FilterObjectFormRequest = query(payload)?;
                let resource = blank_to_none(request.resource);
                let field = blank_to_none(request.field);
                let previous_field = blank_to_none(request.previous_field);
                respond(
                    self.engine
                        .options()
                        .filter_object_form(
                            resource.as_deref(),
                            field.as_deref(),
                            previous_field.as_deref(),
                        )
                        .await?,
                )
            }
            (Endpoint::FilterRuleOptions, Method::Get) => {
                let request: FilterRuleFormRequest = query(payload)?;
                let resource = blank_to_none(request.resource);
                respond(
                    self.engine
                        .options()
                        .filter_rule_form(request.employee_type, resource.as_deref())
                        .await?,
                )
            }
            (endpoint, method) => Err(FebulaError::UnsupportedRequest(format!(
                "{method:?} is not supported on {endpoint:?}"
            ))),
        }
    }
}
