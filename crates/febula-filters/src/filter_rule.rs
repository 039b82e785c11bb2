//! Filter rule validation and storage.
//!
//! Order: schema, Sync uniqueness, resource, filter, then ownership (in the
//! store). `PermissionSet` defaults to `Sync` before any check runs.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use febula_core::error::{FebulaError, FebulaResult};
use febula_core::models::context::CallerContext;
use febula_core::models::filter_object::FilterObject;
use febula_core::models::filter_rule::{
    BasicFilterRuleData, EmployeeType, FilterRule, FilterRuleQuery, PermissionSet,
    PermissionSetFilter, UpsertFilterRule,
};
use febula_core::models::lifecycle::Lifecycle;
use febula_core::repository::{ResourceCatalog, TableRepository};
use futures::{StreamExt, TryStreamExt, stream};
use serde::Serialize;
use tracing::{debug, info};

use crate::catalog::CatalogAdapter;
use crate::config::FiltersConfig;
use crate::store::{TableStore, Validate, created_at, payload_json};

/// Validation hook for filter rules.
#[derive(Clone)]
pub struct FilterRuleValidator<C, O, R> {
    catalog: C,
    objects: O,
    rules: R,
    min_chain_hop_fields: usize,
}

struct ValidationContext {
    rule: FilterRule,
    payload: String,
}

fn check_schema(
    mut input: UpsertFilterRule,
    stored: Option<&FilterRule>,
    now: DateTime<Utc>,
) -> FebulaResult<ValidationContext> {
    input.permission_set.get_or_insert_default();
    let payload = payload_json(&input);

    let missing = |property: &str| FebulaError::SchemaValidation {
        message: format!("property {property} is required in {payload}"),
    };
    let key = input.key.clone().ok_or_else(|| missing("Key"))?;
    let employee_type = input.employee_type.ok_or_else(|| missing("EmployeeType"))?;
    let resource = input.resource.clone().filter(|r| !r.is_empty());
    let resource = resource.ok_or_else(|| missing("Resource"))?;
    let filter = input.filter.clone().filter(|f| !f.is_empty());
    let filter = filter.ok_or_else(|| missing("Filter"))?;

    let rule = FilterRule {
        key,
        employee_type,
        resource,
        filter,
        permission_set: input.permission_set.unwrap_or_default(),
        addon_owner: input.addon_owner,
        lifecycle: Lifecycle::from(input.hidden.unwrap_or(false)),
        created_at: created_at(stored, now),
        updated_at: now,
    };
    Ok(ValidationContext { rule, payload })
}

impl<C, O, R> FilterRuleValidator<C, O, R>
where
    C: ResourceCatalog,
    O: TableRepository<FilterObject>,
    R: TableRepository<FilterRule>,
{
    /// At most one live Sync rule per `(Resource, EmployeeType)`; updating
    /// the holder of the slot is allowed.
    async fn check_uniqueness(&self, ctx: &ValidationContext) -> FebulaResult<()> {
        let rule = &ctx.rule;
        if !rule.permission_set.requires_unique_binding() {
            return Ok(());
        }

        let holders = self
            .rules
            .find(&FilterRuleQuery {
                resource: Some(rule.resource.clone()),
                employee_type: Some(rule.employee_type),
                permission_set: Some(PermissionSetFilter::Is(rule.permission_set)),
                ..Default::default()
            })
            .await?;
        if let Some(holder) = holders.iter().find(|h| h.key != rule.key) {
            return Err(FebulaError::ProfileResourceUniqueness {
                message: format!(
                    "{} already has a {} rule for {} ({}) in {}",
                    rule.resource, rule.permission_set, rule.employee_type, holder.key, ctx.payload
                ),
            });
        }
        Ok(())
    }

    async fn check_resource(
        &self,
        catalog: &CatalogAdapter<'_, C>,
        ctx: &ValidationContext,
    ) -> FebulaResult<()> {
        let resource = &ctx.rule.resource;
        if catalog.get_resource(resource).await?.is_none() {
            return Err(FebulaError::ResourceValidation {
                message: format!("resource {resource} does not exist in {}", ctx.payload),
            });
        }
        if !catalog.is_referenced(resource).await? {
            return Err(FebulaError::ResourceValidation {
                message: format!(
                    "resource {resource} is not referenced by any resource in {}",
                    ctx.payload
                ),
            });
        }
        Ok(())
    }

    /// The filter exists, is live, and yields keys of the rule's resource.
    async fn check_filter(
        &self,
        catalog: &CatalogAdapter<'_, C>,
        ctx: &ValidationContext,
    ) -> FebulaResult<()> {
        let rule = &ctx.rule;
        let invalid = |reason: String| FebulaError::FilterValidation {
            message: format!("{reason} in {}", ctx.payload),
        };

        let object = match self.objects.get_by_key(&rule.filter).await? {
            Some(object) if object.lifecycle.is_active() => object,
            Some(_) => return Err(invalid(format!("filter {} is deleted", rule.filter))),
            None => return Err(invalid(format!("filter {} does not exist", rule.filter))),
        };

        let target = catalog
            .get_resource(&object.resource)
            .await?
            .and_then(|r| r.reference_target(&object.field).map(str::to_string));
        if target.as_deref() != Some(rule.resource.as_str()) {
            return Err(invalid(format!(
                "filter {} yields {} instead of {}",
                object.name,
                target.as_deref().unwrap_or("nothing"),
                rule.resource
            )));
        }
        Ok(())
    }
}

impl<C, O, R> Validate<FilterRule> for FilterRuleValidator<C, O, R>
where
    C: ResourceCatalog,
    O: TableRepository<FilterObject>,
    R: TableRepository<FilterRule>,
{
    type Input = UpsertFilterRule;

    async fn validate(
        &self,
        input: UpsertFilterRule,
        stored: Option<&FilterRule>,
        now: DateTime<Utc>,
    ) -> FebulaResult<FilterRule> {
        let ctx = check_schema(input, stored, now)?;
        if ctx.rule.lifecycle.is_deleted() {
            debug!(key = %ctx.rule.key, "Tombstone skips reference checks");
            return Ok(ctx.rule);
        }

        self.check_uniqueness(&ctx).await?;
        let catalog = CatalogAdapter::new(&self.catalog, self.min_chain_hop_fields);
        self.check_resource(&catalog, &ctx).await?;
        self.check_filter(&catalog, &ctx).await?;
        Ok(ctx.rule)
    }
}

/// A rule with the name of the filter it points at, as listed for editing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RuleListing {
    #[serde(flatten)]
    pub rule: FilterRule,
    #[serde(rename = "FilterName", skip_serializing_if = "Option::is_none")]
    pub filter_name: Option<String>,
}

/// Filter rule service: validated upserts, lookups, soft-deletes and the
/// seeding and migration helpers.
pub struct FilterRuleService<C, O, R> {
    store: TableStore<FilterRule, R, FilterRuleValidator<C, O, R>>,
    objects: O,
    config: FiltersConfig,
}

impl<C, O, R> FilterRuleService<C, O, R>
where
    C: ResourceCatalog + Clone,
    O: TableRepository<FilterObject> + Clone,
    R: TableRepository<FilterRule> + Clone,
{
    pub fn new(catalog: C, objects: O, rules: R, config: FiltersConfig) -> Self {
        let validator = FilterRuleValidator {
            catalog,
            objects: objects.clone(),
            rules: rules.clone(),
            min_chain_hop_fields: config.min_chain_hop_fields,
        };
        let store = TableStore::new(
            rules,
            validator,
            config.trusted_owners.clone(),
            config.max_parallel_writes,
        );
        Self {
            store,
            objects,
            config,
        }
    }

    pub async fn upsert(
        &self,
        ctx: &CallerContext,
        input: UpsertFilterRule,
        as_system: bool,
    ) -> FebulaResult<FilterRule> {
        self.store.upsert(ctx, input, as_system).await
    }

    pub async fn get(&self, query: &FilterRuleQuery) -> FebulaResult<Vec<FilterRule>> {
        self.store.get(query).await
    }

    pub async fn get_by_keys(&self, keys: &[String]) -> FebulaResult<Vec<FilterRule>> {
        self.store.get_by_keys(keys).await
    }

    pub async fn delete(
        &self,
        ctx: &CallerContext,
        keys: &[String],
        as_system: bool,
    ) -> FebulaResult<Vec<FilterRule>> {
        self.store.delete(ctx, keys, as_system).await
    }

    /// Writes `PermissionSet = Sync` explicitly on rows stored before
    /// permission sets existed. Returns the number of rows touched.
    pub async fn upsert_permission_set(&self) -> FebulaResult<usize> {
        let legacy = self
            .store
            .repo()
            .find(&FilterRuleQuery {
                permission_set: Some(PermissionSetFilter::Missing),
                include_deleted: true,
                ..Default::default()
            })
            .await?;

        let now = Utc::now();
        let migrated: Vec<FilterRule> = stream::iter(legacy)
            .map(|mut rule| {
                rule.permission_set = PermissionSet::Sync;
                rule.updated_at = now;
                self.store.repo().upsert(rule)
            })
            .buffer_unordered(self.config.bootstrap_parallelism.max(1))
            .try_collect()
            .await?;

        info!(count = migrated.len(), "Permission set backfilled on legacy rules");
        Ok(migrated.len())
    }

    /// Binds every basic filter to every role in both permission sets.
    ///
    /// A combination already bound to the same filter is left alone, and so
    /// is a Sync slot already held by another rule. Returns the rules
    /// created.
    pub async fn upsert_basic_filter_rules(
        &self,
        ctx: &CallerContext,
        basic: &[BasicFilterRuleData],
    ) -> FebulaResult<Vec<FilterRule>> {
        let mut pending = Vec::new();
        for data in basic {
            for employee_type in EmployeeType::ALL {
                for permission_set in PermissionSet::ALL {
                    if self
                        .needs_basic_rule(data, employee_type, permission_set)
                        .await?
                    {
                        pending.push(
                            UpsertFilterRule::new(employee_type, &data.resource, &data.key)
                                .in_permission_set(permission_set),
                        );
                    }
                }
            }
        }

        let created: Vec<FilterRule> = stream::iter(pending)
            .map(|input| self.store.upsert(ctx, input, true))
            .buffer_unordered(self.config.bootstrap_parallelism.max(1))
            .try_collect()
            .await?;

        info!(count = created.len(), "Basic filter rules seeded");
        Ok(created)
    }

    async fn needs_basic_rule(
        &self,
        data: &BasicFilterRuleData,
        employee_type: EmployeeType,
        permission_set: PermissionSet,
    ) -> FebulaResult<bool> {
        let existing = self
            .store
            .get(&FilterRuleQuery {
                resource: Some(data.resource.clone()),
                employee_type: Some(employee_type),
                permission_set: Some(PermissionSetFilter::Is(permission_set)),
                ..Default::default()
            })
            .await?;

        if existing.iter().any(|r| r.filter == data.key) {
            return Ok(false);
        }
        Ok(!(permission_set.requires_unique_binding() && !existing.is_empty()))
    }

    /// Rules of one permission set for the editing list, optionally
    /// narrowed to those whose resource or filter name contains `search`
    /// (case-insensitive). Sorted by resource, then role.
    pub async fn list_for_display(
        &self,
        permission_set: PermissionSet,
        search: Option<&str>,
    ) -> FebulaResult<Vec<RuleListing>> {
        let rules = self
            .store
            .get(&FilterRuleQuery::in_permission_set(permission_set))
            .await?;

        let mut filter_keys: Vec<String> = rules.iter().map(|r| r.filter.clone()).collect();
        filter_keys.sort();
        filter_keys.dedup();
        let names: HashMap<String, String> = self
            .objects
            .get_by_keys(&filter_keys)
            .await?
            .into_iter()
            .map(|o| (o.key, o.name))
            .collect();

        let needle = search.map(str::to_lowercase).filter(|s| !s.is_empty());
        let mut listings: Vec<RuleListing> = rules
            .into_iter()
            .map(|rule| {
                let filter_name = names.get(&rule.filter).cloned();
                RuleListing { rule, filter_name }
            })
            .filter(|listing| {
                needle.as_deref().is_none_or(|needle| {
                    listing.rule.resource.to_lowercase().contains(needle)
                        || listing
                            .filter_name
                            .as_deref()
                            .is_some_and(|name| name.to_lowercase().contains(needle))
                })
            })
            .collect();

        listings.sort_by(|a, b| {
            a.rule
                .resource
                .to_lowercase()
                .cmp(&b.rule.resource.to_lowercase())
                .then(a.rule.employee_type.cmp(&b.rule.employee_type))
        });
        Ok(listings)
    }
}
