//! SurrealDB connection management.

use std::fmt;

use surrealdb::Surreal;
use surrealdb::engine::remote::ws::{Client, Ws};
use surrealdb::opt::auth::Root;
use tracing::info;

use crate::error::DbError;
use crate::repository::{
    SurrealFilterObjectRepository, SurrealFilterRuleRepository, SurrealResourceCatalog,
};
use crate::schema::run_migrations;

/// Where the filter tables and the resource catalog live.
#[derive(Clone)]
pub struct DbConfig {
    /// `host:port` of the SurrealDB WebSocket endpoint.
    pub url: String,
    pub namespace: String,
    pub database: String,
    /// Root credentials; the password never appears in `Debug` output.
    pub username: String,
    pub password: String,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            url: "127.0.0.1:8000".into(),
            namespace: "febula".into(),
            database: "filters".into(),
            username: "root".into(),
            password: "root".into(),
        }
    }
}

impl fmt::Debug for DbConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DbConfig")
            .field("url", &self.url)
            .field("namespace", &self.namespace)
            .field("database", &self.database)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Owns the connection shared by the filter tables and the resource
/// catalog.
#[derive(Clone)]
pub struct DbManager {
    db: Surreal<Client>,
}

impl DbManager {
    /// Signs in as root, selects the configured namespace and database and
    /// brings the schema up to date.
    pub async fn connect(config: &DbConfig) -> Result<Self, DbError> {
        info!(
            url = %config.url,
            ns = %config.namespace,
            db = %config.database,
            "Opening filter store"
        );

        let db = Surreal::new::<Ws>(config.url.as_str()).await?;
        let credentials = Root {
            username: config.username.clone(),
            password: config.password.clone(),
        };
        db.signin(credentials).await?;
        db.use_ns(config.namespace.as_str())
            .use_db(config.database.as_str())
            .await?;

        let manager = Self { db };
        manager.migrate().await?;
        Ok(manager)
    }

    async fn migrate(&self) -> Result<(), DbError> {
        run_migrations(&self.db).await?;
        info!("Filter store schema current");
        Ok(())
    }

    pub fn filter_objects(&self) -> SurrealFilterObjectRepository<Client> {
        SurrealFilterObjectRepository::new(self.db.clone())
    }

    pub fn filter_rules(&self) -> SurrealFilterRuleRepository<Client> {
        SurrealFilterRuleRepository::new(self.db.clone())
    }

    pub fn resource_catalog(&self) -> SurrealResourceCatalog<Client> {
        SurrealResourceCatalog::new(self.db.clone())
    }
}
