//! SurrealDB implementation of [`TableRepository`] for filter objects.

use chrono::{DateTime, Utc};
use febula_core::error::FebulaResult;
use febula_core::models::filter_object::{FilterObject, FilterObjectQuery};
use febula_core::models::lifecycle::Lifecycle;
use febula_core::repository::TableRepository;
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::debug;

use super::where_clause;
use crate::error::DbError;

#[derive(Debug, SurrealValue)]
struct FilterObjectRow {
    key: String,
    name: String,
    resource: String,
    field: String,
    previous_field: Option<String>,
    previous_filter: Option<String>,
    addon_owner: Option<String>,
    hidden: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<FilterObjectRow> for FilterObject {
    fn from(row: FilterObjectRow) -> Self {
        FilterObject {
            key: row.key,
            name: row.name,
            resource: row.resource,
            field: row.field,
            previous_field: row.previous_field,
            previous_filter: row.previous_filter,
            addon_owner: row.addon_owner,
            lifecycle: Lifecycle::from(row.hidden),
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// SurrealDB implementation of the filter object table.
#[derive(Clone)]
pub struct SurrealFilterObjectRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealFilterObjectRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> TableRepository<FilterObject> for SurrealFilterObjectRepository<C> {
    async fn upsert(&self, object: FilterObject) -> FebulaResult<FilterObject> {
        let key = object.key.clone();

        let result = self
            .db
            .query(
                "UPSERT type::record('filter_object', $key) SET \
                 key = $key, name = $name, resource = $resource, \
                 field = $field, previous_field = $previous_field, \
                 previous_filter = $previous_filter, \
                 addon_owner = $addon_owner, hidden = $hidden, \
                 created_at = $created_at, updated_at = $updated_at",
            )
            .bind(("key", object.key))
            .bind(("name", object.name))
            .bind(("resource", object.resource))
            .bind(("field", object.field))
            .bind(("previous_field", object.previous_field))
            .bind(("previous_filter", object.previous_filter))
            .bind(("addon_owner", object.addon_owner))
            .bind(("hidden", object.lifecycle.is_deleted()))
            .bind(("created_at", object.created_at))
            .bind(("updated_at", object.updated_at))
            .await
            .map_err(DbError::from)?;

        let mut result = result
            .check()
            .map_err(|e| DbError::Migration(e.to_string()))?;

        let rows: Vec<FilterObjectRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "filter_object".into(),
            key,
        })?;

        Ok(row.into())
    }

    async fn get_by_key(&self, key: &str) -> FebulaResult<Option<FilterObject>> {
        let mut result = self
            .db
            .query("SELECT * FROM type::record('filter_object', $key)")
            .bind(("key", key.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<FilterObjectRow> = result.take(0).map_err(DbError::from)?;
        Ok(rows.into_iter().next().map(Into::into))
    }

    async fn get_by_keys(&self, keys: &[String]) -> FebulaResult<Vec<FilterObject>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }

        let mut result = self
            .db
            .query(
                "SELECT * FROM filter_object WHERE key IN $keys \
                 ORDER BY created_at ASC",
            )
            .bind(("keys", keys.to_vec()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<FilterObjectRow> = result.take(0).map_err(DbError::from)?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn find(&self, query: &FilterObjectQuery) -> FebulaResult<Vec<FilterObject>> {
        let mut conditions = Vec::new();
        if !query.include_deleted {
            conditions.push("hidden = false");
        }
        if query.resource.is_some() {
            conditions.push("resource = $resource");
        }
        if query.name.is_some() {
            conditions.push("name = $name");
        }
        if query.name_contains.is_some() {
            conditions.push("string::contains(string::lowercase(name), $search)");
        }
        if query.field.is_some() {
            conditions.push("field = $field");
        }
        if query.previous_field.is_some() {
            conditions.push("previous_field = $previous_field");
        }
        if query.previous_filter.is_some() {
            conditions.push("previous_filter = $previous_filter");
        }
        if query.addon_owner.is_some() {
            conditions.push("addon_owner = $addon_owner");
        }

        let sql = format!(
            "SELECT * FROM filter_object{} ORDER BY created_at ASC",
            where_clause(&conditions)
        );
        debug!(%sql, "Finding filter objects");

        let mut builder = self.db.query(sql);
        if let Some(resource) = &query.resource {
            builder = builder.bind(("resource", resource.clone()));
        }
        if let Some(name) = &query.name {
            builder = builder.bind(("name", name.clone()));
        }
        if let Some(search) = &query.name_contains {
            builder = builder.bind(("search", search.to_lowercase()));
        }
        if let Some(field) = &query.field {
            builder = builder.bind(("field", field.clone()));
        }
        if let Some(previous_field) = &query.previous_field {
            builder = builder.bind(("previous_field", previous_field.clone()));
        }
        if let Some(previous_filter) = &query.previous_filter {
            builder = builder.bind(("previous_filter", previous_filter.clone()));
        }
        if let Some(addon_owner) = &query.addon_owner {
            builder = builder.bind(("addon_owner", addon_owner.clone()));
        }

        let mut result = builder.await.map_err(DbError::from)?;
        let rows: Vec<FilterObjectRow> = result.take(0).map_err(DbError::from)?;
        Ok(rows.into_iter().map(Into::into).collect())
    }
}
