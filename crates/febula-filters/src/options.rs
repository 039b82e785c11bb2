//! Cascading option sets for the filter object and filter rule editing
//! forms. The previous-filter and filter options apply the same chain
//! compatibility rule the validators enforce.

use febula_core::error::FebulaResult;
use febula_core::models::filter_object::{FilterObject, FilterObjectQuery};
use febula_core::models::filter_rule::{EmployeeType, FilterRule, FilterRuleQuery, PermissionSet};
use febula_core::models::resource::Resource;
use febula_core::repository::{ResourceCatalog, TableRepository};
use serde::Serialize;

use crate::catalog::{CatalogAdapter, chain_target, find};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FilterOption {
    #[serde(rename = "Key")]
    pub key: String,
    #[serde(rename = "Name")]
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProfileOption {
    #[serde(rename = "EmployeeType")]
    pub employee_type: EmployeeType,
    #[serde(rename = "Name")]
    pub name: &'static str,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FilterObjectFormOptions {
    #[serde(rename = "Resources")]
    pub resources: Vec<String>,
    #[serde(rename = "Fields")]
    pub fields: Vec<String>,
    #[serde(rename = "PreviousFields")]
    pub previous_fields: Vec<String>,
    #[serde(rename = "PreviousFilters")]
    pub previous_filters: Vec<FilterOption>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FilterRuleFormOptions {
    #[serde(rename = "Profiles")]
    pub profiles: Vec<ProfileOption>,
    #[serde(rename = "Resources")]
    pub resources: Vec<String>,
    #[serde(rename = "Filters")]
    pub filters: Vec<FilterOption>,
}

/// Resource-typed fields of `resource`, the synthetic `Key` included.
pub fn field_options(resource: &Resource) -> Vec<String> {
    resource
        .reference_fields()
        .map(|(name, _)| name.to_string())
        .collect()
}

/// Field options minus the field already chosen as `Field`.
pub fn previous_field_options(resource: &Resource, chosen_field: Option<&str>) -> Vec<String> {
    field_options(resource)
        .into_iter()
        .filter(|name| Some(name.as_str()) != chosen_field)
        .collect()
}

/// Filter objects whose chain yields `target`.
pub fn filters_targeting(
    resources: &[Resource],
    objects: &[FilterObject],
    target: &str,
) -> Vec<FilterOption> {
    objects
        .iter()
        .filter(|o| chain_target(resources, o) == Some(target))
        .map(|o| FilterOption {
            key: o.key.clone(),
            name: o.name.clone(),
        })
        .collect()
}

pub fn profile_options() -> Vec<ProfileOption> {
    EmployeeType::ALL
        .into_iter()
        .map(|employee_type| ProfileOption {
            employee_type,
            name: employee_type.profile_name(),
        })
        .collect()
}

/// Referenced resources without a Sync rule for `employee_type`.
pub fn unbound_resources(
    referenced: &[Resource],
    sync_rules: &[FilterRule],
    employee_type: Option<EmployeeType>,
) -> Vec<String> {
    referenced
        .iter()
        .filter(|resource| {
            employee_type.is_none_or(|employee_type| {
                !sync_rules.iter().any(|rule| {
                    rule.resource == resource.name && rule.employee_type == employee_type
                })
            })
        })
        .map(|resource| resource.name.clone())
        .collect()
}

pub struct OptionsService<'a, C: ResourceCatalog, O, R> {
    catalog: CatalogAdapter<'a, C>,
    objects: &'a O,
    rules: &'a R,
}

impl<'a, C, O, R> OptionsService<'a, C, O, R>
where
    C: ResourceCatalog,
    O: TableRepository<FilterObject>,
    R: TableRepository<FilterRule>,
{
    pub fn new(catalog: CatalogAdapter<'a, C>, objects: &'a O, rules: &'a R) -> Self {
        Self {
            catalog,
            objects,
            rules,
        }
    }

    /// Options of the filter object form given what has been chosen so far.
    pub async fn filter_object_form(
        &self,
        resource: Option<&str>,
        field: Option<&str>,
        previous_field: Option<&str>,
    ) -> FebulaResult<FilterObjectFormOptions> {
        let mut options = FilterObjectFormOptions {
            resources: self
                .catalog
                .chain_hop_resources()
                .await?
                .into_iter()
                .map(|r| r.name)
                .collect(),
            ..Default::default()
        };

        let resources = self.catalog.list_resources().await?;
        let Some(chosen) = resource.and_then(|name| find(resources, name)) else {
            return Ok(options);
        };
        options.fields = field_options(chosen);
        options.previous_fields = previous_field_options(chosen, field);

        if let Some(target) = previous_field.and_then(|f| chosen.reference_target(f)) {
            let objects = self.objects.find(&FilterObjectQuery::default()).await?;
            options.previous_filters = filters_targeting(resources, &objects, target);
        }
        Ok(options)
    }

    /// Options of the filter rule form given what has been chosen so far.
    pub async fn filter_rule_form(
        &self,
        employee_type: Option<EmployeeType>,
        resource: Option<&str>,
    ) -> FebulaResult<FilterRuleFormOptions> {
        let referenced = self.catalog.referenced_resources().await?;
        let sync_rules = self
            .rules
            .find(&FilterRuleQuery::in_permission_set(PermissionSet::Sync))
            .await?;

        let filters = match resource {
            Some(target) => {
                let resources = self.catalog.list_resources().await?;
                let objects = self.objects.find(&FilterObjectQuery::default()).await?;
                filters_targeting(resources, &objects, target)
            }
            None => Vec::new(),
        };

        Ok(FilterRuleFormOptions {
            profiles: profile_options(),
            resources: unbound_resources(&referenced, &sync_rules, employee_type),
            filters,
        })
    }
}
