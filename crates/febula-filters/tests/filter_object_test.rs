//! Integration tests for filter object validation and storage.

mod common;

use common::{PARTNER_ID, PARTNER_SECRET, SELF_ID, connected_accounts, ctx, current_user, setup};
use febula_core::error::FebulaError;
use febula_core::models::context::CallerContext;
use febula_core::models::filter_object::{FilterObjectQuery, UpsertFilterObject};
use febula_core::models::filter_rule::{EmployeeType, UpsertFilterRule};

// -----------------------------------------------------------------------
// Chain construction
// -----------------------------------------------------------------------

#[tokio::test]
async fn root_filter_is_terminal_and_unowned() {
    let engine = setup().await;
    let object = current_user(&engine).await;

    assert!(!object.key.is_empty());
    assert!(object.is_terminal());
    assert!(object.addon_owner.is_none());
    assert!(object.lifecycle.is_active());
}

#[tokio::test]
async fn chained_filter_accepts_matching_link() {
    let engine = setup().await;
    let root = current_user(&engine).await;
    let object = connected_accounts(&engine, &root).await;

    assert_eq!(object.previous(), Some(("User", root.key.as_str())));
    let stored = engine
        .filter_objects()
        .get_by_keys(&[object.key.clone()])
        .await
        .unwrap();
    assert_eq!(stored, vec![object]);
}

#[tokio::test]
async fn unknown_previous_field_is_rejected() {
    let engine = setup().await;
    let root = current_user(&engine).await;

    let err = engine
        .filter_objects()
        .upsert(
            &ctx(),
            UpsertFilterObject::root("ConnectedAccounts", "account_users", "Account")
                .chained("NonexistentField", root.key),
            false,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, FebulaError::PreviousFieldValidation { .. }), "{err}");
    assert!(err.to_string().contains("NonexistentField"));
}

#[tokio::test]
async fn mismatched_link_types_are_rejected() {
    let engine = setup().await;
    let root = current_user(&engine).await;

    // Account points at accounts, CurrentUser yields users.
    let err = engine
        .filter_objects()
        .upsert(
            &ctx(),
            UpsertFilterObject::root("Broken", "account_users", "User")
                .chained("Account", root.key),
            false,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, FebulaError::PreviousFilterValidation { .. }), "{err}");
}

#[tokio::test]
async fn previous_field_requires_previous_filter() {
    let engine = setup().await;

    let mut input = UpsertFilterObject::root("Half", "account_users", "Account");
    input.previous_field = Some("User".into());
    let err = engine
        .filter_objects()
        .upsert(&ctx(), input, false)
        .await
        .unwrap_err();
    assert!(matches!(err, FebulaError::SchemaValidation { .. }), "{err}");

    let mut input = UpsertFilterObject::root("Half", "account_users", "Account");
    input.previous_filter = Some("somewhere".into());
    let err = engine
        .filter_objects()
        .upsert(&ctx(), input, false)
        .await
        .unwrap_err();
    assert!(matches!(err, FebulaError::SchemaValidation { .. }), "{err}");
}

#[tokio::test]
async fn blank_previous_fields_mean_root() {
    let engine = setup().await;

    let mut input = UpsertFilterObject::root("Everyone", "users", "Key");
    input.previous_field = Some(String::new());
    input.previous_filter = Some(String::new());
    let object = engine
        .filter_objects()
        .upsert(&ctx(), input, false)
        .await
        .unwrap();
    assert!(object.is_terminal());
    assert!(object.previous_field.is_none());
}

#[tokio::test]
async fn checks_run_in_order() {
    let engine = setup().await;
    let objects = engine.filter_objects();

    let mut missing_name = UpsertFilterObject::root("x", "nowhere", "Nope");
    missing_name.name = None;
    let err = objects.upsert(&ctx(), missing_name, false).await.unwrap_err();
    assert!(matches!(err, FebulaError::SchemaValidation { .. }), "{err}");

    let err = objects
        .upsert(&ctx(), UpsertFilterObject::root("  ", "nowhere", "Nope"), false)
        .await
        .unwrap_err();
    assert!(matches!(err, FebulaError::NameValidation { .. }), "{err}");

    let err = objects
        .upsert(&ctx(), UpsertFilterObject::root("Ghosts", "nowhere", "Nope"), false)
        .await
        .unwrap_err();
    assert!(matches!(err, FebulaError::ResourceValidation { .. }), "{err}");

    let err = objects
        .upsert(&ctx(), UpsertFilterObject::root("Titles", "visits", "Title"), false)
        .await
        .unwrap_err();
    assert!(matches!(err, FebulaError::FieldValidation { .. }), "{err}");
}

#[tokio::test]
async fn missing_or_deleted_predecessor_is_rejected() {
    let engine = setup().await;
    let objects = engine.filter_objects();

    let err = objects
        .upsert(
            &ctx(),
            UpsertFilterObject::root("Orphan", "account_users", "Account")
                .chained("User", "missing"),
            false,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, FebulaError::PreviousFilterValidation { .. }), "{err}");

    let root = current_user(&engine).await;
    objects.delete(&ctx(), &[root.key.clone()], false).await.unwrap();
    let err = objects
        .upsert(
            &ctx(),
            UpsertFilterObject::root("Late", "account_users", "Account").chained("User", root.key),
            false,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, FebulaError::PreviousFilterValidation { .. }), "{err}");
}

#[tokio::test]
async fn closing_a_loop_is_rejected() {
    let engine = setup().await;
    let objects = engine.filter_objects();
    let first = current_user(&engine).await;
    let second = objects
        .upsert(
            &ctx(),
            UpsertFilterObject::root("Same User", "users", "Key").chained("Key", first.key.clone()),
            false,
        )
        .await
        .unwrap();

    let err = objects
        .upsert(
            &ctx(),
            UpsertFilterObject::root("CurrentUser", "users", "Key")
                .chained("Key", second.key)
                .with_key(first.key),
            false,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, FebulaError::ChainCycleDetected { .. }), "{err}");
}

// -----------------------------------------------------------------------
// Edits with dependents
// -----------------------------------------------------------------------

#[tokio::test]
async fn retargeting_a_predecessor_keeps_dependents_valid() {
    let engine = setup().await;
    let objects = engine.filter_objects();
    let root = current_user(&engine).await;
    let accounts = connected_accounts(&engine, &root).await;

    let err = objects
        .upsert(
            &ctx(),
            UpsertFilterObject::root("CurrentUser", "users", "Profile").with_key(root.key.clone()),
            false,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, FebulaError::PreviousFilterValidation { .. }), "{err}");
    assert!(err.to_string().contains("ConnectedAccounts"), "{err}");

    let stored = objects.get_by_keys(&[root.key.clone()]).await.unwrap();
    assert_eq!(stored[0].field, "Key");

    let mut renamed = UpsertFilterObject::from(accounts);
    renamed.name = Some("Connected Accounts".into());
    let renamed = objects.upsert(&ctx(), renamed, false).await.unwrap();
    assert_eq!(renamed.name, "Connected Accounts");
}

#[tokio::test]
async fn retargeting_to_the_same_resource_is_accepted() {
    let engine = setup().await;
    let root = current_user(&engine).await;
    connected_accounts(&engine, &root).await;

    let moved = engine
        .filter_objects()
        .upsert(
            &ctx(),
            UpsertFilterObject::root("CurrentUser", "account_users", "User")
                .with_key(root.key.clone()),
            false,
        )
        .await
        .unwrap();
    assert_eq!((moved.resource.as_str(), moved.field.as_str()), ("account_users", "User"));
}

#[tokio::test]
async fn deleted_dependents_do_not_block_retargeting() {
    let engine = setup().await;
    let objects = engine.filter_objects();
    let root = current_user(&engine).await;
    let accounts = connected_accounts(&engine, &root).await;
    objects.delete(&ctx(), &[accounts.key], false).await.unwrap();

    let moved = objects
        .upsert(
            &ctx(),
            UpsertFilterObject::root("CurrentUser", "users", "Profile").with_key(root.key),
            false,
        )
        .await
        .unwrap();
    assert_eq!(moved.field, "Profile");
}

#[tokio::test]
async fn retargeting_a_bound_filter_is_rejected() {
    let engine = setup().await;
    let root = current_user(&engine).await;
    engine
        .filter_rules()
        .upsert(
            &ctx(),
            UpsertFilterRule::new(EmployeeType::Admin, "users", root.key.clone()),
            false,
        )
        .await
        .unwrap();

    let err = engine
        .filter_objects()
        .upsert(
            &ctx(),
            UpsertFilterObject::root("CurrentUser", "users", "Profile").with_key(root.key),
            false,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, FebulaError::FilterValidation { .. }), "{err}");
}

// -----------------------------------------------------------------------
// Soft-delete and lookups
// -----------------------------------------------------------------------

#[tokio::test]
async fn delete_hides_without_removing() {
    let engine = setup().await;
    let objects = engine.filter_objects();
    let root = current_user(&engine).await;
    let chained = connected_accounts(&engine, &root).await;

    let deleted = objects.delete(&ctx(), &[root.key.clone()], false).await.unwrap();
    assert_eq!(deleted.len(), 1);
    assert!(deleted[0].lifecycle.is_deleted());

    let fetched = objects.get_by_keys(&[root.key.clone()]).await.unwrap();
    assert_eq!(fetched.len(), 1);
    assert!(fetched[0].lifecycle.is_deleted());
    assert_eq!(fetched[0].created_at, root.created_at);

    let live = objects.get(&FilterObjectQuery::default()).await.unwrap();
    assert_eq!(live.iter().map(|o| o.key.as_str()).collect::<Vec<_>>(), vec![chained.key.as_str()]);
}

#[tokio::test]
async fn deleting_unknown_key_fails() {
    let engine = setup().await;
    let err = engine
        .filter_objects()
        .delete(&ctx(), &["missing".to_string()], false)
        .await
        .unwrap_err();
    assert!(matches!(err, FebulaError::NotFound { .. }), "{err}");
}

#[tokio::test]
async fn get_filters_by_query() {
    let engine = setup().await;
    let root = current_user(&engine).await;
    connected_accounts(&engine, &root).await;

    let by_resource = engine
        .filter_objects()
        .get(&FilterObjectQuery {
            resource: Some("account_users".into()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(by_resource.len(), 1);
    assert_eq!(by_resource[0].name, "ConnectedAccounts");

    let by_search = engine
        .filter_objects()
        .get(&FilterObjectQuery {
            name_contains: Some("current".into()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(by_search.len(), 1);
    assert_eq!(by_search[0].key, root.key);
}

// -----------------------------------------------------------------------
// Ownership
// -----------------------------------------------------------------------

#[tokio::test]
async fn system_rows_are_locked_for_regular_callers() {
    let engine = setup().await;
    let objects = engine.filter_objects();
    let system = objects
        .upsert(&ctx(), UpsertFilterObject::root("Me", "users", "Key"), true)
        .await
        .unwrap();
    assert_eq!(system.addon_owner.as_deref(), Some(SELF_ID));

    let edit = UpsertFilterObject::from(system.clone());
    let err = objects.upsert(&ctx(), edit.clone(), false).await.unwrap_err();
    assert!(matches!(err, FebulaError::OwnershipValidation { .. }), "{err}");

    let err = objects
        .delete(&ctx(), &[system.key.clone()], false)
        .await
        .unwrap_err();
    assert!(matches!(err, FebulaError::OwnershipValidation { .. }), "{err}");

    let mut renamed = edit;
    renamed.name = Some("Myself".into());
    let saved = objects.upsert(&ctx(), renamed, true).await.unwrap();
    assert_eq!(saved.name, "Myself");
}

#[tokio::test]
async fn delegated_writes_need_the_owner_secret() {
    let engine = setup().await;
    let objects = engine.filter_objects();

    let trusted = CallerContext::delegated(SELF_ID, PARTNER_ID, Some(PARTNER_SECRET.into()));
    let object = objects
        .upsert(&trusted, UpsertFilterObject::root("Partner Users", "users", "Key"), false)
        .await
        .unwrap();
    assert_eq!(object.addon_owner.as_deref(), Some(PARTNER_ID));

    let untrusted = CallerContext::delegated(SELF_ID, PARTNER_ID, Some("guess".into()));
    let err = objects
        .upsert(&untrusted, UpsertFilterObject::root("Partner Users", "users", "Key"), false)
        .await
        .unwrap_err();
    assert!(matches!(err, FebulaError::OwnershipValidation { .. }), "{err}");

    let mut foreign = UpsertFilterObject::root("Foreign", "users", "Key");
    foreign.addon_owner = Some("someone-else".into());
    let err = objects.upsert(&ctx(), foreign, false).await.unwrap_err();
    assert!(matches!(err, FebulaError::OwnershipValidation { .. }), "{err}");
}
