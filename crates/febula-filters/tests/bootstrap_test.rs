//! Integration tests for basic filter seeding, duplicate repair and the
//! install/upgrade hooks.

mod common;

use chrono::{Duration, Utc};
use common::{PARTNER_ID, SELF_ID, ctx, engine, setup, setup_db};
use febula_core::models::filter_object::{FilterObject, FilterObjectQuery};
use febula_core::models::filter_rule::{
    EmployeeType, FilterRule, FilterRuleQuery, PermissionSet, PermissionSetFilter,
};
use febula_core::models::lifecycle::Lifecycle;
use febula_core::models::resource::{FieldSchema, Resource};
use febula_core::repository::TableRepository;
use febula_db::{SurrealFilterObjectRepository, SurrealFilterRuleRepository, SurrealResourceCatalog};
use febula_filters::bootstrap::{ASSIGNED_ACCOUNTS, BASIC_FILTERS, CURRENT_USER};
use febula_filters::{DuplicateFiltersRepair, install, upgrade};

fn system_object(key: &str, basic_name: &str, age_hours: i64) -> FilterObject {
    let basic = BASIC_FILTERS
        .iter()
        .find(|b| b.name == basic_name)
        .unwrap();
    let created = Utc::now() - Duration::hours(age_hours);
    FilterObject {
        key: key.into(),
        name: basic.name.into(),
        resource: basic.resource.into(),
        field: basic.field.into(),
        previous_field: basic.previous.map(|(field, _)| field.to_string()),
        previous_filter: None,
        addon_owner: Some(SELF_ID.into()),
        lifecycle: Lifecycle::Active,
        created_at: created,
        updated_at: created,
    }
}

fn rule(key: &str, resource: &str, filter: &str, permission_set: PermissionSet) -> FilterRule {
    let now = Utc::now();
    FilterRule {
        key: key.into(),
        employee_type: EmployeeType::Admin,
        resource: resource.into(),
        filter: filter.into(),
        permission_set,
        addon_owner: None,
        lifecycle: Lifecycle::Active,
        created_at: now,
        updated_at: now,
    }
}

// -----------------------------------------------------------------------
// Install
// -----------------------------------------------------------------------

#[tokio::test]
async fn install_seeds_basic_filters_and_rules() {
    let engine = setup().await;
    let report = install(&engine, &ctx()).await.unwrap();

    assert_eq!(report.basic_filters.len(), 3);
    assert_eq!(report.rules_created, 3 * 3 * 2);

    let objects = engine
        .filter_objects()
        .get(&FilterObjectQuery::default())
        .await
        .unwrap();
    assert_eq!(objects.len(), 3);
    assert!(objects.iter().all(|o| o.addon_owner.as_deref() == Some(SELF_ID)));

    let current_user = objects.iter().find(|o| CURRENT_USER.describes(o)).unwrap();
    let assigned = objects.iter().find(|o| ASSIGNED_ACCOUNTS.describes(o)).unwrap();
    assert_eq!(assigned.previous_filter.as_deref(), Some(current_user.key.as_str()));

    let sync = engine
        .filter_rules()
        .get(&FilterRuleQuery::in_permission_set(PermissionSet::Sync))
        .await
        .unwrap();
    assert_eq!(sync.len(), 9);
    assert!(sync.iter().any(|r| r.resource == "accounts" && r.filter == assigned.key));
}

#[tokio::test]
async fn install_twice_yields_the_same_rows() {
    let engine = setup().await;
    let first = install(&engine, &ctx()).await.unwrap();
    let second = install(&engine, &ctx()).await.unwrap();

    assert_eq!(first.basic_filters, second.basic_filters);
    assert_eq!(second.rules_created, 0);

    for basic in BASIC_FILTERS {
        let live = engine
            .filter_objects()
            .get(&FilterObjectQuery {
                name: Some(basic.name.into()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(live.len(), 1, "{}", basic.name);
    }
    let rules = engine
        .filter_rules()
        .get(&FilterRuleQuery::default())
        .await
        .unwrap();
    assert_eq!(rules.len(), 18);
}

#[tokio::test]
async fn basic_filter_without_catalog_support_is_skipped() {
    let db = setup_db().await;
    SurrealResourceCatalog::new(db.clone())
        .register(
            &Resource::new("account_users")
                .with_field("Account", FieldSchema::reference("accounts")),
        )
        .await
        .unwrap();
    let engine = engine(&db);

    let report = install(&engine, &ctx()).await.unwrap();
    assert_eq!(report.basic_filters.len(), 2);
    let objects = engine
        .filter_objects()
        .get(&FilterObjectQuery::default())
        .await
        .unwrap();
    assert!(!objects.iter().any(|o| ASSIGNED_ACCOUNTS.describes(o)));
}

// -----------------------------------------------------------------------
// Duplicates
// -----------------------------------------------------------------------

#[tokio::test]
async fn duplicates_collapse_onto_the_oldest_row() {
    let db = setup_db().await;
    let objects = SurrealFilterObjectRepository::new(db.clone());
    let rules = SurrealFilterRuleRepository::new(db.clone());

    objects
        .upsert(system_object("cu-old", CURRENT_USER.name, 2))
        .await
        .unwrap();
    objects
        .upsert(system_object("cu-new", CURRENT_USER.name, 1))
        .await
        .unwrap();
    let mut assigned = system_object("aa", ASSIGNED_ACCOUNTS.name, 1);
    assigned.previous_filter = Some("cu-new".into());
    objects.upsert(assigned).await.unwrap();
    rules
        .upsert(rule("online", "users", "cu-new", PermissionSet::Online))
        .await
        .unwrap();

    let engine = engine(&db);
    let report = install(&engine, &ctx()).await.unwrap();
    assert_eq!(report.basic_filters[0], "cu-old");
    assert_eq!(report.basic_filters[1], "aa");
    // The repaired Online rule already binds (users, Admin, Online).
    assert_eq!(report.rules_created, 17);

    let stale = objects.get_by_key("cu-new").await.unwrap().unwrap();
    assert!(stale.lifecycle.is_deleted());
    let relinked = objects.get_by_key("aa").await.unwrap().unwrap();
    assert_eq!(relinked.previous_filter.as_deref(), Some("cu-old"));
    let repaired = rules.get_by_key("online").await.unwrap().unwrap();
    assert_eq!(repaired.filter, "cu-old");
}

#[tokio::test]
async fn repair_only_touches_non_sync_rules() {
    let db = setup_db().await;
    let rules = SurrealFilterRuleRepository::new(db.clone());
    rules
        .upsert(rule("sync", "users", "stale", PermissionSet::Sync))
        .await
        .unwrap();
    rules
        .upsert(rule("online-1", "users", "stale", PermissionSet::Online))
        .await
        .unwrap();
    rules
        .upsert(rule("online-2", "users", "kept", PermissionSet::Online))
        .await
        .unwrap();

    let repair = DuplicateFiltersRepair::new(rules.clone());
    let fixed = repair
        .fix_filter_rules(&["stale".to_string()], "kept")
        .await
        .unwrap();
    assert_eq!(fixed.len(), 1);
    assert_eq!(fixed[0].key, "online-1");

    assert_eq!(rules.get_by_key("sync").await.unwrap().unwrap().filter, "stale");
    assert_eq!(rules.get_by_key("online-1").await.unwrap().unwrap().filter, "kept");

    let pointing_at_stale = rules
        .find(&FilterRuleQuery {
            filter: Some("stale".into()),
            permission_set: Some(PermissionSetFilter::IsNot(PermissionSet::Sync)),
            ..Default::default()
        })
        .await
        .unwrap();
    assert!(pointing_at_stale.is_empty());
}

#[tokio::test]
async fn newer_partner_copy_is_not_a_duplicate() {
    let db = setup_db().await;
    let objects = SurrealFilterObjectRepository::new(db.clone());
    objects
        .upsert(system_object("ours", CURRENT_USER.name, 2))
        .await
        .unwrap();
    let mut theirs = system_object("theirs", CURRENT_USER.name, 1);
    theirs.addon_owner = Some(PARTNER_ID.into());
    objects.upsert(theirs).await.unwrap();

    let engine = engine(&db);
    let report = install(&engine, &ctx()).await.unwrap();
    assert_eq!(report.basic_filters[0], "ours");

    let partner = objects.get_by_key("theirs").await.unwrap().unwrap();
    assert!(partner.lifecycle.is_active());
    assert_eq!(partner.addon_owner.as_deref(), Some(PARTNER_ID));
}

#[tokio::test]
async fn older_partner_copy_is_never_canonical() {
    let db = setup_db().await;
    let objects = SurrealFilterObjectRepository::new(db.clone());
    let mut theirs = system_object("theirs", CURRENT_USER.name, 2);
    theirs.addon_owner = Some(PARTNER_ID.into());
    objects.upsert(theirs).await.unwrap();

    let engine = engine(&db);
    let report = install(&engine, &ctx()).await.unwrap();
    assert_ne!(report.basic_filters[0], "theirs");

    let seeded = objects
        .get_by_key(&report.basic_filters[0])
        .await
        .unwrap()
        .unwrap();
    assert_eq!(seeded.addon_owner.as_deref(), Some(SELF_ID));
    let rules = engine
        .filter_rules()
        .get(&FilterRuleQuery {
            filter: Some("theirs".into()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert!(rules.is_empty());
    assert!(objects.get_by_key("theirs").await.unwrap().unwrap().lifecycle.is_active());
}

// -----------------------------------------------------------------------
// Upgrade
// -----------------------------------------------------------------------

#[tokio::test]
async fn upgrade_backfills_then_keeps_customized_sync_slots() {
    let db = setup_db().await;
    db.query(
        "CREATE type::record('filter_rule', 'legacy') SET key = 'legacy', \
         employee_type = 2, resource = 'accounts', filter = 'custom', \
         hidden = false, created_at = time::now(), updated_at = time::now()",
    )
    .await
    .unwrap()
    .check()
    .unwrap();
    let engine = engine(&db);

    let report = upgrade(&engine, &ctx()).await.unwrap();
    assert_eq!(report.permission_sets_backfilled, 1);
    assert_eq!(report.basic_filters.len(), 3);
    assert_eq!(report.rules_created, 17);

    let rep_accounts = engine
        .filter_rules()
        .get(&FilterRuleQuery {
            resource: Some("accounts".into()),
            employee_type: Some(EmployeeType::Rep),
            permission_set: Some(PermissionSetFilter::Is(PermissionSet::Sync)),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(rep_accounts.len(), 1);
    assert_eq!(rep_accounts[0].key, "legacy");
}
