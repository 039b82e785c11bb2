//! Seeding of the basic system filter objects every install starts with.

use std::collections::HashMap;

use febula_core::error::FebulaResult;
use febula_core::models::context::CallerContext;
use febula_core::models::filter_object::{FilterObject, FilterObjectQuery, UpsertFilterObject};
use febula_core::models::filter_rule::{BasicFilterRuleData, FilterRule};
use febula_core::models::resource::Resource;
use febula_core::repository::{ResourceCatalog, TableRepository};
use tracing::{info, warn};

use crate::filter_object::FilterObjectService;
use crate::repair::DuplicateFiltersRepair;

/// A canonical system filter object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BasicFilter {
    pub name: &'static str,
    pub resource: &'static str,
    pub field: &'static str,
    /// `(PreviousField, name of the basic filter it chains from)`.
    pub previous: Option<(&'static str, &'static str)>,
}

pub const CURRENT_USER: BasicFilter = BasicFilter {
    name: "Current User",
    resource: "users",
    field: "Key",
    previous: None,
};

pub const ASSIGNED_ACCOUNTS: BasicFilter = BasicFilter {
    name: "Assigned Accounts",
    resource: "account_users",
    field: "Account",
    previous: Some(("User", CURRENT_USER.name)),
};

pub const CURRENT_USER_PROFILE: BasicFilter = BasicFilter {
    name: "Current User Profile",
    resource: "users",
    field: "Profile",
    previous: Some(("Key", CURRENT_USER.name)),
};

/// Predecessors come first.
pub const BASIC_FILTERS: [BasicFilter; 3] = [CURRENT_USER, ASSIGNED_ACCOUNTS, CURRENT_USER_PROFILE];

impl BasicFilter {
    fn previous_field(&self) -> Option<&'static str> {
        self.previous.map(|(field, _)| field)
    }

    /// True if `object` has this filter's `(Name, Resource, Field,
    /// PreviousField)` tuple.
    pub fn describes(&self, object: &FilterObject) -> bool {
        object.semantic_tuple() == (self.name, self.resource, self.field, self.previous_field())
    }

    /// Resource the filter yields, when the catalog supports it.
    fn target<'r>(&self, resource: &'r Resource) -> Option<&'r str> {
        let previous_ok = self
            .previous_field()
            .is_none_or(|field| resource.reference_target(field).is_some());
        resource.reference_target(self.field).filter(|_| previous_ok)
    }
}

impl<C, O, R> FilterObjectService<C, O, R>
where
    C: ResourceCatalog + Clone,
    O: TableRepository<FilterObject> + Clone,
    R: TableRepository<FilterRule>,
{
    /// Creates or repairs the basic system filter objects and returns, for
    /// each, the resource it yields paired with its key.
    ///
    /// Per basic filter the oldest live row this caller owns with its tuple
    /// is kept; rows owned by other addons are left alone.
    /// Rules that point at the others are re-pointed, then the others are
    /// soft-deleted. Running it again returns the same keys.
    pub async fn upsert_basic_filter_objects(
        &self,
        ctx: &CallerContext,
        repair: &DuplicateFiltersRepair<R>,
    ) -> FebulaResult<Vec<BasicFilterRuleData>> {
        let catalog = self.catalog();
        let mut resolved: HashMap<&'static str, FilterObject> = HashMap::new();
        let mut data = Vec::new();

        for basic in BASIC_FILTERS {
            let previous = match basic.previous {
                None => None,
                Some((field, name)) => match resolved.get(name) {
                    Some(predecessor) => Some((field, predecessor.key.clone())),
                    None => {
                        warn!(
                            filter = basic.name,
                            previous = name,
                            "Predecessor missing, skipping basic filter"
                        );
                        continue;
                    }
                },
            };

            let target = match catalog.get_resource(basic.resource).await? {
                Some(resource) => basic.target(&resource).map(str::to_string),
                None => None,
            };
            let Some(target) = target else {
                warn!(
                    filter = basic.name,
                    resource = basic.resource,
                    "Catalog lacks the fields of a basic filter, skipping it"
                );
                continue;
            };

            let mut candidates: Vec<FilterObject> = self
                .repo()
                .find(&FilterObjectQuery {
                    name: Some(basic.name.into()),
                    resource: Some(basic.resource.into()),
                    field: Some(basic.field.into()),
                    addon_owner: Some(ctx.owner_id.clone()),
                    ..Default::default()
                })
                .await?
                .into_iter()
                .filter(|o| basic.describes(o))
                .collect();
            candidates.sort_by_key(|o| o.created_at);

            let mut candidates = candidates.into_iter();
            let canonical = candidates.next();
            let duplicates: Vec<String> = candidates.map(|o| o.key).collect();

            if let Some(canonical) = &canonical {
                if !duplicates.is_empty() {
                    info!(
                        filter = basic.name,
                        canonical = %canonical.key,
                        duplicates = duplicates.len(),
                        "Removing duplicate basic filters"
                    );
                    repair.fix_filter_rules(&duplicates, &canonical.key).await?;
                    self.delete(ctx, &duplicates, true).await?;
                }
            }

            let expected_previous = previous.as_ref().map(|(_, key)| key.as_str());
            let object = match canonical {
                Some(existing) if existing.previous_filter.as_deref() == expected_previous => {
                    existing
                }
                existing => {
                    let mut input =
                        UpsertFilterObject::root(basic.name, basic.resource, basic.field);
                    if let Some((field, key)) = previous {
                        input = input.chained(field, key);
                    }
                    if let Some(existing) = existing {
                        input = input.with_key(existing.key);
                        input.addon_owner = existing.addon_owner;
                    }
                    self.upsert(ctx, input, true).await?
                }
            };

            data.push(BasicFilterRuleData {
                resource: target,
                key: object.key.clone(),
            });
            resolved.insert(basic.name, object);
        }

        info!(count = data.len(), "Basic filter objects ready");
        Ok(data)
    }
}
