//! Integration tests for chain resolution and the sync visualization.

mod common;

use chrono::Utc;
use common::{connected_accounts, ctx, current_user, engine, setup, setup_db};
use febula_core::models::filter_object::FilterObject;
use febula_core::models::filter_rule::{EmployeeType, PermissionSet, UpsertFilterRule};
use febula_core::models::lifecycle::Lifecycle;
use febula_core::repository::TableRepository;
use febula_db::SurrealFilterObjectRepository;
use febula_filters::{ChainError, SYNC_RULE_ERROR, install};

const CONNECTED_ACCOUNTS_HOP: &str =
    "ConnectedAccounts = all Account from account_users where User in filter CurrentUser";

fn loose_object(key: &str, previous: &str) -> FilterObject {
    let now = Utc::now();
    FilterObject {
        key: key.into(),
        name: key.to_uppercase(),
        resource: "users".into(),
        field: "Key".into(),
        previous_field: Some("Key".into()),
        previous_filter: Some(previous.into()),
        addon_owner: None,
        lifecycle: Lifecycle::Active,
        created_at: now,
        updated_at: now,
    }
}

#[tokio::test]
async fn rows_render_one_line_per_hop() {
    let engine = setup().await;
    let root = current_user(&engine).await;
    let accounts = connected_accounts(&engine, &root).await;
    engine
        .filter_rules()
        .upsert(
            &ctx(),
            UpsertFilterRule::new(EmployeeType::Admin, "accounts", accounts.key.clone()),
            false,
        )
        .await
        .unwrap();

    let rows = engine.visualize(PermissionSet::Sync, None).await.unwrap();
    let resources: Vec<&str> = rows.iter().map(|r| r.resource.as_str()).collect();
    assert_eq!(resources, vec!["account_users", "visits"]);
    assert!(rows.iter().all(|r| r.employee_type == EmployeeType::Admin));

    let visits = &rows[1];
    assert_eq!(visits.fields.len(), 1);
    assert_eq!(visits.fields[0].field, "Account");
    assert_eq!(
        visits.render_text(),
        format!("Field accounts in filter ConnectedAccounts\n  {CONNECTED_ACCOUNTS_HOP}")
    );
    let html = visits.render_html();
    assert!(html.starts_with("<ul><li>Field <b><i>accounts</i></b>"));
    assert!(html.ends_with("</ul></ul>"));

    let snapshot = engine.snapshot(PermissionSet::Sync).await.unwrap();
    assert_eq!(snapshot.sync_rule_text(&accounts.key), CONNECTED_ACCOUNTS_HOP);
    assert_eq!(snapshot.sync_rule_text(&root.key), "");
}

#[tokio::test]
async fn search_narrows_rows_by_resource() {
    let engine = setup().await;
    let root = current_user(&engine).await;
    let accounts = connected_accounts(&engine, &root).await;
    engine
        .filter_rules()
        .upsert(&ctx(), UpsertFilterRule::new(EmployeeType::Rep, "accounts", accounts.key), false)
        .await
        .unwrap();

    let rows = engine.visualize(PermissionSet::Sync, Some("VISIT")).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].resource, "visits");
    assert_eq!(rows[0].employee_type, EmployeeType::Rep);

    assert!(engine.visualize(PermissionSet::Online, None).await.unwrap().is_empty());
}

#[tokio::test]
async fn missing_predecessor_degrades_to_sentinel() {
    let engine = setup().await;
    let root = current_user(&engine).await;
    let accounts = connected_accounts(&engine, &root).await;
    engine
        .filter_rules()
        .upsert(
            &ctx(),
            UpsertFilterRule::new(EmployeeType::Buyer, "accounts", accounts.key.clone()),
            false,
        )
        .await
        .unwrap();
    engine
        .filter_objects()
        .delete(&ctx(), &[root.key.clone()], false)
        .await
        .unwrap();

    let rows = engine.visualize(PermissionSet::Sync, None).await.unwrap();
    assert_eq!(rows.len(), 2);
    for row in &rows {
        assert!(row.is_broken());
        assert_eq!(row.render_text(), SYNC_RULE_ERROR);
        assert_eq!(row.render_html(), SYNC_RULE_ERROR);
    }

    let snapshot = engine.snapshot(PermissionSet::Sync).await.unwrap();
    assert_eq!(
        snapshot.resolve_chain(&accounts.key).map(|c| c.len()),
        Err(ChainError::MissingFilter { key: root.key })
    );
    assert_eq!(snapshot.sync_rule_text(&accounts.key), SYNC_RULE_ERROR);
}

#[tokio::test]
async fn stored_loops_terminate() {
    let db = setup_db().await;
    let objects = SurrealFilterObjectRepository::new(db.clone());
    objects.upsert(loose_object("a", "b")).await.unwrap();
    objects.upsert(loose_object("b", "a")).await.unwrap();
    let engine = engine(&db);

    let snapshot = engine.snapshot(PermissionSet::Sync).await.unwrap();
    assert!(matches!(snapshot.resolve_chain("a"), Err(ChainError::Cycle { .. })));
    assert_eq!(snapshot.sync_rule_text("a"), SYNC_RULE_ERROR);
}

#[tokio::test]
async fn system_filters_close_the_chain() {
    let engine = setup().await;
    install(&engine, &ctx()).await.unwrap();

    let rows = engine.visualize(PermissionSet::Sync, Some("account_users")).await.unwrap();
    assert_eq!(rows.len(), 3);
    for row in &rows {
        let blocks = row.blocks.as_ref().unwrap();
        assert_eq!(blocks.len(), 2);
        assert!(blocks.iter().all(|b| b.hops.is_empty()));
    }
    assert_eq!(
        rows[0].render_text(),
        "Field accounts in filter Assigned Accounts\nField users in filter Current User"
    );
}
