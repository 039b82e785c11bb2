//! SurrealDB implementation of [`TableRepository`] for filter rules.
//!
//! Rules written before permission sets existed carry no
//! `permission_set`; they read back as `Sync`.

use chrono::{DateTime, Utc};
use febula_core::error::FebulaResult;
use febula_core::models::filter_rule::{
    EmployeeType, FilterRule, FilterRuleQuery, PermissionSet, PermissionSetFilter,
};
use febula_core::models::lifecycle::Lifecycle;
use febula_core::repository::TableRepository;
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::debug;

use super::where_clause;
use crate::error::DbError;

#[derive(Debug, SurrealValue)]
struct FilterRuleRow {
    key: String,
    employee_type: i64,
    resource: String,
    filter: String,
    permission_set: Option<String>,
    addon_owner: Option<String>,
    hidden: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl FilterRuleRow {
    fn try_into_rule(self) -> Result<FilterRule, DbError> {
        let employee_type = u8::try_from(self.employee_type)
            .map_err(|e| DbError::Decode(format!("invalid employee type: {e}")))
            .and_then(|code| EmployeeType::try_from(code).map_err(DbError::Decode))?;
        let permission_set = match self.permission_set.as_deref() {
            None => PermissionSet::Sync,
            Some(value) => PermissionSet::parse(value)
                .ok_or_else(|| DbError::Decode(format!("invalid permission set: {value}")))?,
        };
        Ok(FilterRule {
            key: self.key,
            employee_type,
            resource: self.resource,
            filter: self.filter,
            permission_set,
            addon_owner: self.addon_owner,
            lifecycle: Lifecycle::from(self.hidden),
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

fn rows_to_rules(rows: Vec<FilterRuleRow>) -> Result<Vec<FilterRule>, DbError> {
    rows.into_iter().map(FilterRuleRow::try_into_rule).collect()
}

/// SQL condition for a permission-set criterion. Legacy rows (NONE) count
/// as `Sync`.
fn permission_set_condition(filter: PermissionSetFilter) -> &'static str {
    match filter {
        PermissionSetFilter::Is(PermissionSet::Sync) => {
            "(permission_set = $permission_set OR permission_set = NONE)"
        }
        PermissionSetFilter::Is(_) => "permission_set = $permission_set",
        PermissionSetFilter::IsNot(PermissionSet::Sync) => {
            "(permission_set != $permission_set AND permission_set != NONE)"
        }
        PermissionSetFilter::IsNot(_) => "permission_set != $permission_set",
        PermissionSetFilter::Missing => "permission_set = NONE",
    }
}

/// SurrealDB implementation of the filter rule table.
#[derive(Clone)]
pub struct SurrealFilterRuleRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealFilterRuleRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> TableRepository<FilterRule> for SurrealFilterRuleRepository<C> {
    async fn upsert(&self, rule: FilterRule) -> FebulaResult<FilterRule> {
        let key = rule.key.clone();

        let result = self
            .db
            .query(
                "UPSERT type::record('filter_rule', $key) SET \
                 key = $key, employee_type = $employee_type, \
                 resource = $resource, filter = $filter, \
                 permission_set = $permission_set, \
                 addon_owner = $addon_owner, hidden = $hidden, \
                 created_at = $created_at, updated_at = $updated_at",
            )
            .bind(("key", rule.key))
            .bind(("employee_type", i64::from(rule.employee_type.code())))
            .bind(("resource", rule.resource))
            .bind(("filter", rule.filter))
            .bind(("permission_set", rule.permission_set.as_str()))
            .bind(("addon_owner", rule.addon_owner))
            .bind(("hidden", rule.lifecycle.is_deleted()))
            .bind(("created_at", rule.created_at))
            .bind(("updated_at", rule.updated_at))
            .await
            .map_err(DbError::from)?;

        let mut result = result
            .check()
            .map_err(|e| DbError::Migration(e.to_string()))?;

        let rows: Vec<FilterRuleRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "filter_rule".into(),
            key,
        })?;

        row.try_into_rule().map_err(Into::into)
    }

    async fn get_by_key(&self, key: &str) -> FebulaResult<Option<FilterRule>> {
        let mut result = self
            .db
            .query("SELECT * FROM type::record('filter_rule', $key)")
            .bind(("key", key.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<FilterRuleRow> = result.take(0).map_err(DbError::from)?;
        match rows.into_iter().next() {
            Some(row) => Ok(Some(row.try_into_rule()?)),
            None => Ok(None),
        }
    }

    async fn get_by_keys(&self, keys: &[String]) -> FebulaResult<Vec<FilterRule>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }

        let mut result = self
            .db
            .query(
                "SELECT * FROM filter_rule WHERE key IN $keys \
                 ORDER BY created_at ASC",
            )
            .bind(("keys", keys.to_vec()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<FilterRuleRow> = result.take(0).map_err(DbError::from)?;
        rows_to_rules(rows).map_err(Into::into)
    }

    async fn find(&self, query: &FilterRuleQuery) -> FebulaResult<Vec<FilterRule>> {
        let mut conditions = Vec::new();
        if !query.include_deleted {
            conditions.push("hidden = false");
        }
        if query.resource.is_some() {
            conditions.push("resource = $resource");
        }
        if query.employee_type.is_some() {
            conditions.push("employee_type = $employee_type");
        }
        if let Some(permission_set) = query.permission_set {
            conditions.push(permission_set_condition(permission_set));
        }
        if query.filter.is_some() {
            conditions.push("filter = $filter");
        }

        let sql = format!(
            "SELECT * FROM filter_rule{} ORDER BY created_at ASC",
            where_clause(&conditions)
        );
        debug!(%sql, "Finding filter rules");

        let mut builder = self.db.query(sql);
        if let Some(resource) = &query.resource {
            builder = builder.bind(("resource", resource.clone()));
        }
        if let Some(employee_type) = query.employee_type {
            builder = builder.bind(("employee_type", i64::from(employee_type.code())));
        }
        match query.permission_set {
            Some(PermissionSetFilter::Is(set) | PermissionSetFilter::IsNot(set)) => {
                builder = builder.bind(("permission_set", set.as_str()));
            }
            Some(PermissionSetFilter::Missing) | None => {}
        }
        if let Some(filter) = &query.filter {
            builder = builder.bind(("filter", filter.clone()));
        }

        let mut result = builder.await.map_err(DbError::from)?;
        let rows: Vec<FilterRuleRow> = result.take(0).map_err(DbError::from)?;
        rows_to_rules(rows).map_err(Into::into)
    }
}
