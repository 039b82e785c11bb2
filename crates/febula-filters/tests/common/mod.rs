//! Shared fixtures: an in-memory SurrealDB with migrations applied and a
//! small resource catalog.

#![allow(dead_code)]

use febula_core::models::context::CallerContext;
use febula_core::models::filter_object::{FilterObject, UpsertFilterObject};
use febula_core::models::resource::{FieldSchema, Resource};
use febula_db::{SurrealFilterObjectRepository, SurrealFilterRuleRepository, SurrealResourceCatalog};
use febula_filters::{FilterEngine, FiltersConfig, Router};
use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem};

pub type Engine = FilterEngine<
    SurrealResourceCatalog<Db>,
    SurrealFilterObjectRepository<Db>,
    SurrealFilterRuleRepository<Db>,
>;

pub type TestRouter = Router<
    SurrealResourceCatalog<Db>,
    SurrealFilterObjectRepository<Db>,
    SurrealFilterRuleRepository<Db>,
>;

pub const SELF_ID: &str = "febula";
pub const PARTNER_ID: &str = "partner";
pub const PARTNER_SECRET: &str = "s3cret";

pub fn resources() -> Vec<Resource> {
    vec![
        Resource::new("users").with_field("Profile", FieldSchema::reference("profiles")),
        Resource::new("profiles"),
        Resource::new("accounts"),
        Resource::new("account_users")
            .with_field("Account", FieldSchema::reference("accounts").with_system_filter())
            .with_field("User", FieldSchema::reference("users").with_system_filter()),
        Resource::new("visits")
            .with_field("Account", FieldSchema::reference("accounts").with_system_filter())
            .with_field("Creator", FieldSchema::reference("users"))
            .with_field("Title", FieldSchema::scalar("String")),
        Resource::new("notes").with_field("Body", FieldSchema::scalar("String")),
    ]
}

/// In-memory database with migrations applied and [`resources`] registered.
pub async fn setup_db() -> Surreal<Db> {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    febula_db::run_migrations(&db).await.unwrap();

    let catalog = SurrealResourceCatalog::new(db.clone());
    for resource in resources() {
        catalog.register(&resource).await.unwrap();
    }
    db
}

pub fn engine(db: &Surreal<Db>) -> Engine {
    FilterEngine::new(
        SurrealResourceCatalog::new(db.clone()),
        SurrealFilterObjectRepository::new(db.clone()),
        SurrealFilterRuleRepository::new(db.clone()),
        FiltersConfig::default().with_trusted_owner(PARTNER_ID, PARTNER_SECRET),
    )
}

pub async fn setup() -> Engine {
    engine(&setup_db().await)
}

/// A regular caller acting for itself.
pub fn ctx() -> CallerContext {
    CallerContext::direct(SELF_ID)
}

pub async fn current_user(engine: &Engine) -> FilterObject {
    engine
        .filter_objects()
        .upsert(&ctx(), UpsertFilterObject::root("CurrentUser", "users", "Key"), false)
        .await
        .unwrap()
}

pub async fn connected_accounts(engine: &Engine, current_user: &FilterObject) -> FilterObject {
    engine
        .filter_objects()
        .upsert(
            &ctx(),
            UpsertFilterObject::root("ConnectedAccounts", "account_users", "Account")
                .chained("User", current_user.key.clone()),
            false,
        )
        .await
        .unwrap()
}
