//! Install and upgrade hooks.

use febula_core::error::FebulaResult;
use febula_core::models::context::CallerContext;
use febula_core::models::filter_object::FilterObject;
use febula_core::models::filter_rule::FilterRule;
use febula_core::repository::{ResourceCatalog, TableRepository};
use serde::Serialize;
use tracing::info;

use crate::engine::FilterEngine;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LifecycleReport {
    /// Keys of the basic filter objects in place after the run.
    pub basic_filters: Vec<String>,
    pub rules_created: usize,
    pub permission_sets_backfilled: usize,
}

/// Seeds the basic filter objects, then binds them to every role.
pub async fn install<C, O, R>(
    engine: &FilterEngine<C, O, R>,
    ctx: &CallerContext,
) -> FebulaResult<LifecycleReport>
where
    C: ResourceCatalog + Clone,
    O: TableRepository<FilterObject> + Clone,
    R: TableRepository<FilterRule> + Clone,
{
    let basic = engine
        .filter_objects()
        .upsert_basic_filter_objects(ctx, engine.repair())
        .await?;
    let created = engine
        .filter_rules()
        .upsert_basic_filter_rules(ctx, &basic)
        .await?;

    let report = LifecycleReport {
        basic_filters: basic.into_iter().map(|d| d.key).collect(),
        rules_created: created.len(),
        permission_sets_backfilled: 0,
    };
    info!(
        basic_filters = report.basic_filters.len(),
        rules_created = report.rules_created,
        "Install complete"
    );
    Ok(report)
}

/// Backfills permission sets on legacy rules, then runs [`install`].
pub async fn upgrade<C, O, R>(
    engine: &FilterEngine<C, O, R>,
    ctx: &CallerContext,
) -> FebulaResult<LifecycleReport>
where
    C: ResourceCatalog + Clone,
    O: TableRepository<FilterObject> + Clone,
    R: TableRepository<FilterRule> + Clone,
{
    let backfilled = engine.filter_rules().upsert_permission_set().await?;
    let report = install(engine, ctx).await?;
    info!(backfilled, "Upgrade complete");
    Ok(LifecycleReport {
        permission_sets_backfilled: backfilled,
        ..report
    })
}
