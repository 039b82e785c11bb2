//! Filter object validation and storage.
//!
//! Validation runs in a fixed order: schema, name, resource, field,
//! previous field, previous filter, then ownership (in the store). Each
//! step hands the next one an explicit context value instead of caching
//! the chosen resource on the validator. Edits that change what an object
//! yields must keep every live dependent compatible.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use febula_core::error::{FebulaError, FebulaResult};
use febula_core::models::context::CallerContext;
use febula_core::models::filter_object::{FilterObject, FilterObjectQuery, UpsertFilterObject};
use febula_core::models::filter_rule::{FilterRule, FilterRuleQuery};
use febula_core::models::lifecycle::Lifecycle;
use febula_core::models::resource::Resource;
use febula_core::repository::{ResourceCatalog, TableRepository};
use tracing::debug;

use crate::catalog::CatalogAdapter;
use crate::config::FiltersConfig;
use crate::store::{TableStore, Validate, created_at, payload_json};

/// Validation hook for filter objects.
#[derive(Clone)]
pub struct FilterObjectValidator<C, O, R> {
    catalog: C,
    objects: O,
    rules: R,
    min_chain_hop_fields: usize,
}

/// Candidate row after the schema and name checks.
struct ValidationContext {
    object: FilterObject,
    payload: String,
}

/// [`ValidationContext`] once the resource has been resolved.
struct ResourceContext {
    base: ValidationContext,
    resource: Resource,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

/// Schema step: required properties present, previous field and previous
/// filter set together.
fn check_schema(
    mut input: UpsertFilterObject,
    stored: Option<&FilterObject>,
    now: DateTime<Utc>,
) -> FebulaResult<ValidationContext> {
    input.previous_field = non_empty(input.previous_field);
    input.previous_filter = non_empty(input.previous_filter);
    let payload = payload_json(&input);

    let missing = |property: &str| FebulaError::SchemaValidation {
        message: format!("property {property} is required in {payload}"),
    };
    let key = input.key.clone().ok_or_else(|| missing("Key"))?;
    let name = input.name.clone().ok_or_else(|| missing("Name"))?;
    let resource = input.resource.clone().ok_or_else(|| missing("Resource"))?;
    let field = input.field.clone().ok_or_else(|| missing("Field"))?;

    if input.previous_field.is_some() != input.previous_filter.is_some() {
        return Err(FebulaError::SchemaValidation {
            message: format!("PreviousField and PreviousFilter must be set together in {payload}"),
        });
    }

    let object = FilterObject {
        key,
        name,
        resource,
        field,
        previous_field: input.previous_field,
        previous_filter: input.previous_filter,
        addon_owner: input.addon_owner,
        lifecycle: Lifecycle::from(input.hidden.unwrap_or(false)),
        created_at: created_at(stored, now),
        updated_at: now,
    };
    Ok(ValidationContext { object, payload })
}

fn check_name(ctx: ValidationContext) -> FebulaResult<ValidationContext> {
    if ctx.object.name.trim().is_empty() {
        return Err(FebulaError::NameValidation {
            message: format!("name must not be empty in {}", ctx.payload),
        });
    }
    Ok(ctx)
}

async fn check_resource<C: ResourceCatalog>(
    catalog: &CatalogAdapter<'_, C>,
    ctx: ValidationContext,
) -> FebulaResult<ResourceContext> {
    match catalog.get_resource(&ctx.object.resource).await? {
        Some(resource) => Ok(ResourceContext { base: ctx, resource }),
        None => Err(FebulaError::ResourceValidation {
            message: format!(
                "resource {} does not exist in {}",
                ctx.object.resource, ctx.payload
            ),
        }),
    }
}

fn check_field(ctx: &ResourceContext) -> FebulaResult<()> {
    let field = &ctx.base.object.field;
    if ctx.resource.reference_target(field).is_none() {
        return Err(FebulaError::FieldValidation {
            message: format!(
                "field {field} is not a Resource field of {} in {}",
                ctx.resource.name, ctx.base.payload
            ),
        });
    }
    Ok(())
}

/// Resource the previous field points at, if any.
fn check_previous_field(ctx: &ResourceContext) -> FebulaResult<Option<String>> {
    let Some(previous_field) = ctx.base.object.previous_field.as_deref() else {
        return Ok(None);
    };
    match ctx.resource.reference_target(previous_field) {
        Some(target) => Ok(Some(target.to_string())),
        None => Err(FebulaError::PreviousFieldValidation {
            message: format!(
                "previous field {previous_field} is not a Resource field of {} in {}",
                ctx.resource.name, ctx.base.payload
            ),
        }),
    }
}

impl<C, O, R> FilterObjectValidator<C, O, R>
where
    C: ResourceCatalog,
    O: TableRepository<FilterObject>,
    R: TableRepository<FilterRule>,
{
    /// Previous filter step: the predecessor exists, is live, produces the
    /// resource the previous field expects, and does not lead back here.
    async fn check_previous_filter(
        &self,
        catalog: &CatalogAdapter<'_, C>,
        ctx: &ResourceContext,
        expected_target: &str,
    ) -> FebulaResult<()> {
        let object = &ctx.base.object;
        let Some(previous_key) = object.previous_filter.as_deref() else {
            return Ok(());
        };
        let invalid = |reason: String| FebulaError::PreviousFilterValidation {
            message: format!("{reason} in {}", ctx.base.payload),
        };

        let predecessor = match self.objects.get_by_key(previous_key).await? {
            Some(p) if p.lifecycle.is_active() => p,
            Some(_) => return Err(invalid(format!("previous filter {previous_key} is deleted"))),
            None => {
                return Err(invalid(format!(
                    "previous filter {previous_key} does not exist"
                )));
            }
        };

        let predecessor_target = catalog
            .get_resource(&predecessor.resource)
            .await?
            .and_then(|r| r.reference_target(&predecessor.field).map(str::to_string));
        if predecessor_target.as_deref() != Some(expected_target) {
            return Err(invalid(format!(
                "previous filter {} yields {} but previous field {} expects {expected_target}",
                predecessor.name,
                predecessor_target.as_deref().unwrap_or("nothing"),
                object.previous_field.as_deref().unwrap_or_default(),
            )));
        }

        self.check_acyclic(&object.key, predecessor).await
    }

    /// Walks predecessors from `first` and rejects a chain that returns to
    /// `key` or loops elsewhere.
    async fn check_acyclic(&self, key: &str, first: FilterObject) -> FebulaResult<()> {
        let mut visited = HashSet::from([key.to_string()]);
        let mut current = Some(first);
        while let Some(node) = current {
            if !visited.insert(node.key.clone()) {
                return Err(FebulaError::ChainCycleDetected { key: node.key });
            }
            current = match node.previous_filter.as_deref() {
                Some(next) if visited.contains(next) => {
                    return Err(FebulaError::ChainCycleDetected {
                        key: next.to_string(),
                    });
                }
                Some(next) => self.objects.get_by_key(next).await?,
                None => None,
            };
        }
        Ok(())
    }

    /// Dependents step: when an edit changes the resource or field of a
    /// stored object, the live objects chaining from it must still expect
    /// what it now yields, and so must the live rules bound to it.
    async fn check_dependents(
        &self,
        catalog: &CatalogAdapter<'_, C>,
        ctx: &ResourceContext,
        stored: &FilterObject,
    ) -> FebulaResult<()> {
        let object = &ctx.base.object;
        if stored.resource == object.resource && stored.field == object.field {
            return Ok(());
        }
        let target = ctx.resource.reference_target(&object.field).unwrap_or_default();

        let dependents = self
            .objects
            .find(&FilterObjectQuery {
                previous_filter: Some(object.key.clone()),
                ..Default::default()
            })
            .await?;
        for dependent in dependents {
            let expected = match dependent.previous_field.as_deref() {
                Some(previous_field) => catalog
                    .get_resource(&dependent.resource)
                    .await?
                    .and_then(|r| r.reference_target(previous_field).map(str::to_string)),
                None => continue,
            };
            if expected.as_deref() != Some(target) {
                return Err(FebulaError::PreviousFilterValidation {
                    message: format!(
                        "filter {} chains from {} through {} expecting {} but it would yield \
                         {target} in {}",
                        dependent.name,
                        object.name,
                        dependent.previous_field.as_deref().unwrap_or_default(),
                        expected.as_deref().unwrap_or("nothing"),
                        ctx.base.payload
                    ),
                });
            }
        }

        let bound = self
            .rules
            .find(&FilterRuleQuery {
                filter: Some(object.key.clone()),
                ..Default::default()
            })
            .await?;
        if let Some(rule) = bound.iter().find(|r| r.resource != target) {
            return Err(FebulaError::FilterValidation {
                message: format!(
                    "rule {} scopes {} with {} but it would yield {target} in {}",
                    rule.key, rule.resource, object.name, ctx.base.payload
                ),
            });
        }
        Ok(())
    }
}

impl<C, O, R> Validate<FilterObject> for FilterObjectValidator<C, O, R>
where
    C: ResourceCatalog,
    O: TableRepository<FilterObject>,
    R: TableRepository<FilterRule>,
{
    type Input = UpsertFilterObject;

    async fn validate(
        &self,
        input: UpsertFilterObject,
        stored: Option<&FilterObject>,
        now: DateTime<Utc>,
    ) -> FebulaResult<FilterObject> {
        let ctx = check_schema(input, stored, now)?;
        if ctx.object.lifecycle.is_deleted() {
            debug!(key = %ctx.object.key, "Tombstone skips reference checks");
            return Ok(ctx.object);
        }

        let ctx = check_name(ctx)?;
        let catalog = CatalogAdapter::new(&self.catalog, self.min_chain_hop_fields);
        let ctx = check_resource(&catalog, ctx).await?;
        check_field(&ctx)?;
        if let Some(expected_target) = check_previous_field(&ctx)? {
            self.check_previous_filter(&catalog, &ctx, &expected_target)
                .await?;
        }
        if let Some(stored) = stored.filter(|s| s.lifecycle.is_active()) {
            self.check_dependents(&catalog, &ctx, stored).await?;
        }
        Ok(ctx.base.object)
    }
}

/// Filter object service: validated upserts, lookups and soft-deletes.
pub struct FilterObjectService<C, O, R> {
    store: TableStore<FilterObject, O, FilterObjectValidator<C, O, R>>,
    catalog: C,
    config: FiltersConfig,
}

impl<C, O, R> FilterObjectService<C, O, R>
where
    C: ResourceCatalog + Clone,
    O: TableRepository<FilterObject> + Clone,
    R: TableRepository<FilterRule>,
{
    pub fn new(catalog: C, objects: O, rules: R, config: FiltersConfig) -> Self {
        let validator = FilterObjectValidator {
            catalog: catalog.clone(),
            objects: objects.clone(),
            rules,
            min_chain_hop_fields: config.min_chain_hop_fields,
        };
        let store = TableStore::new(
            objects,
            validator,
            config.trusted_owners.clone(),
            config.max_parallel_writes,
        );
        Self {
            store,
            catalog,
            config,
        }
    }

    pub async fn upsert(
        &self,
        ctx: &CallerContext,
        input: UpsertFilterObject,
        as_system: bool,
    ) -> FebulaResult<FilterObject> {
        self.store.upsert(ctx, input, as_system).await
    }

    /// Live filter objects matching `query`, oldest first.
    pub async fn get(&self, query: &FilterObjectQuery) -> FebulaResult<Vec<FilterObject>> {
        self.store.get(query).await
    }

    /// Deleted rows included.
    pub async fn get_by_keys(&self, keys: &[String]) -> FebulaResult<Vec<FilterObject>> {
        self.store.get_by_keys(keys).await
    }

    pub async fn delete(
        &self,
        ctx: &CallerContext,
        keys: &[String],
        as_system: bool,
    ) -> FebulaResult<Vec<FilterObject>> {
        self.store.delete(ctx, keys, as_system).await
    }

    /// A fresh catalog view for one request.
    pub fn catalog(&self) -> CatalogAdapter<'_, C> {
        CatalogAdapter::new(&self.catalog, self.config.min_chain_hop_fields)
    }

    pub(crate) fn repo(&self) -> &O {
        self.store.repo()
    }
}
