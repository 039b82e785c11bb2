//! SurrealDB implementation of [`ResourceCatalog`].
//!
//! Resource owners publish their schemas with [`SurrealResourceCatalog::register`];
//! the filter engine only ever reads them.

use std::collections::BTreeMap;

use febula_core::error::{FebulaError, FebulaResult};
use febula_core::models::resource::{FieldSchema, Resource};
use febula_core::repository::ResourceCatalog;
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::info;

use crate::error::DbError;

#[derive(Debug, SurrealValue)]
struct ResourceSchemaRow {
    name: String,
    addon_owner: Option<String>,
    fields: serde_json::Value,
}

impl ResourceSchemaRow {
    fn try_into_resource(self) -> Result<Resource, DbError> {
        let fields: BTreeMap<String, FieldSchema> = serde_json::from_value(self.fields)
            .map_err(|e| DbError::Decode(format!("invalid fields of {}: {e}", self.name)))?;
        Ok(Resource {
            name: self.name,
            addon_owner: self.addon_owner,
            fields,
        })
    }
}

/// Catalog reads fail as an unavailable catalog, not an unavailable store.
fn catalog_error(err: DbError) -> FebulaError {
    match err {
        DbError::NotFound { entity, key } => FebulaError::NotFound { entity, key },
        other => FebulaError::CatalogUnavailable(other.to_string()),
    }
}

/// SurrealDB-backed resource schema catalog.
#[derive(Clone)]
pub struct SurrealResourceCatalog<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealResourceCatalog<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }

    /// Publishes or replaces the schema of `resource`.
    pub async fn register(&self, resource: &Resource) -> FebulaResult<()> {
        let fields = serde_json::to_value(&resource.fields)
            .map_err(|e| FebulaError::Internal(format!("unserializable fields: {e}")))?;

        self.db
            .query(
                "UPSERT type::record('resource_schema', $name) SET \
                 name = $name, addon_owner = $addon_owner, \
                 fields = $fields, updated_at = time::now()",
            )
            .bind(("name", resource.name.clone()))
            .bind(("addon_owner", resource.addon_owner.clone()))
            .bind(("fields", fields))
            .await
            .map_err(DbError::from)
            .map_err(catalog_error)?
            .check()
            .map_err(|e| catalog_error(DbError::Migration(e.to_string())))?;

        info!(
            resource = %resource.name,
            fields = resource.fields.len(),
            "Resource schema registered"
        );
        Ok(())
    }
}

impl<C: Connection> ResourceCatalog for SurrealResourceCatalog<C> {
    async fn list_resources(&self) -> FebulaResult<Vec<Resource>> {
        let mut result = self
            .db
            .query("SELECT * FROM resource_schema ORDER BY name ASC")
            .await
            .map_err(DbError::from)
            .map_err(catalog_error)?;

        let rows: Vec<ResourceSchemaRow> = result
            .take(0)
            .map_err(DbError::from)
            .map_err(catalog_error)?;

        rows.into_iter()
            .map(|row| row.try_into_resource().map_err(catalog_error))
            .collect()
    }

    async fn get_resource(&self, name: &str) -> FebulaResult<Option<Resource>> {
        let mut result = self
            .db
            .query("SELECT * FROM type::record('resource_schema', $name)")
            .bind(("name", name.to_string()))
            .await
            .map_err(DbError::from)
            .map_err(catalog_error)?;

        let rows: Vec<ResourceSchemaRow> = result
            .take(0)
            .map_err(DbError::from)
            .map_err(catalog_error)?;

        rows.into_iter()
            .next()
            .map(|row| row.try_into_resource().map_err(catalog_error))
            .transpose()
    }
}
