//! Repair of rules left pointing at duplicated system filter objects.
//!
//! Repeated install cycles used to create several system filter objects
//! with the same meaning. Sync rules are already unique per slot; only the
//! other permission sets can hold rules aimed at a duplicate.

use std::collections::HashSet;

use chrono::Utc;
use febula_core::error::FebulaResult;
use febula_core::models::filter_rule::{
    FilterRule, FilterRuleQuery, PermissionSet, PermissionSetFilter,
};
use febula_core::repository::TableRepository;
use tracing::{info, warn};

pub struct DuplicateFiltersRepair<R> {
    rules: R,
}

impl<R: TableRepository<FilterRule>> DuplicateFiltersRepair<R> {
    pub fn new(rules: R) -> Self {
        Self { rules }
    }

    /// Re-points non-Sync rules whose filter is one of `stale_keys` at
    /// `canonical_key`. Writes one rule at a time. Returns the rules fixed.
    pub async fn fix_filter_rules(
        &self,
        stale_keys: &[String],
        canonical_key: &str,
    ) -> FebulaResult<Vec<FilterRule>> {
        let stale: HashSet<&str> = stale_keys
            .iter()
            .map(String::as_str)
            .filter(|k| *k != canonical_key)
            .collect();
        if stale.is_empty() {
            return Ok(Vec::new());
        }

        let candidates = self
            .rules
            .find(&FilterRuleQuery {
                permission_set: Some(PermissionSetFilter::IsNot(PermissionSet::Sync)),
                ..Default::default()
            })
            .await?;
        let to_fix: Vec<FilterRule> = candidates
            .into_iter()
            .filter(|rule| stale.contains(rule.filter.as_str()))
            .collect();

        if to_fix.len() > 1 {
            warn!(
                count = to_fix.len(),
                canonical_key,
                "Several filter rules pointed at duplicate filters"
            );
        }

        let mut fixed = Vec::with_capacity(to_fix.len());
        for mut rule in to_fix {
            info!(
                key = %rule.key,
                from = %rule.filter,
                to = canonical_key,
                "Re-pointing filter rule"
            );
            rule.filter = canonical_key.to_string();
            rule.updated_at = Utc::now();
            fixed.push(self.rules.upsert(rule).await?);
        }
        Ok(fixed)
    }
}
