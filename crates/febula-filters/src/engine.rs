//! Wiring of every filter service over one set of collaborators.

use febula_core::error::FebulaResult;
use febula_core::models::filter_object::FilterObject;
use febula_core::models::filter_rule::{FilterRule, PermissionSet};
use febula_core::repository::{ResourceCatalog, TableRepository};

use crate::catalog::CatalogAdapter;
use crate::chain::{ChainSnapshot, SyncRuleRow};
use crate::config::FiltersConfig;
use crate::filter_object::FilterObjectService;
use crate::filter_rule::FilterRuleService;
use crate::options::OptionsService;
use crate::repair::DuplicateFiltersRepair;

pub struct FilterEngine<C, O, R> {
    objects: FilterObjectService<C, O, R>,
    rules: FilterRuleService<C, O, R>,
    repair: DuplicateFiltersRepair<R>,
    catalog: C,
    object_repo: O,
    rule_repo: R,
    config: FiltersConfig,
}

impl<C, O, R> FilterEngine<C, O, R>
where
    C: ResourceCatalog + Clone,
    O: TableRepository<FilterObject> + Clone,
    R: TableRepository<FilterRule> + Clone,
{
    pub fn new(catalog: C, objects: O, rules: R, config: FiltersConfig) -> Self {
        Self {
            objects: FilterObjectService::new(
                catalog.clone(),
                objects.clone(),
                rules.clone(),
                config.clone(),
            ),
            rules: FilterRuleService::new(
                catalog.clone(),
                objects.clone(),
                rules.clone(),
                config.clone(),
            ),
            repair: DuplicateFiltersRepair::new(rules.clone()),
            catalog,
            object_repo: objects,
            rule_repo: rules,
            config,
        }
    }

    pub fn filter_objects(&self) -> &FilterObjectService<C, O, R> {
        &self.objects
    }

    pub fn filter_rules(&self) -> &FilterRuleService<C, O, R> {
        &self.rules
    }

    pub fn repair(&self) -> &DuplicateFiltersRepair<R> {
        &self.repair
    }

    pub fn config(&self) -> &FiltersConfig {
        &self.config
    }

    pub fn catalog(&self) -> CatalogAdapter<'_, C> {
        CatalogAdapter::new(&self.catalog, self.config.min_chain_hop_fields)
    }

    pub fn options(&self) -> OptionsService<'_, C, O, R> {
        OptionsService::new(self.catalog(), &self.object_repo, &self.rule_repo)
    }

    /// Loads a snapshot of the live rules of `permission_set`.
    pub async fn snapshot(&self, permission_set: PermissionSet) -> FebulaResult<ChainSnapshot> {
        ChainSnapshot::load(
            &self.catalog(),
            &self.object_repo,
            &self.rule_repo,
            permission_set,
        )
        .await
    }

    /// Rows of the sync visualization, narrowed by resource name.
    pub async fn visualize(
        &self,
        permission_set: PermissionSet,
        search: Option<&str>,
    ) -> FebulaResult<Vec<SyncRuleRow>> {
        Ok(self.snapshot(permission_set).await?.sync_rule_rows(search))
    }
}
