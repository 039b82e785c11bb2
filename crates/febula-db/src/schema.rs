//! Schema definitions and migration runner for SurrealDB.
//!
//! Tables are SCHEMAFULL. Every row of the filter tables is addressed by
//! its `key` (also the record id) and is never physically removed:
//! deletion flips `hidden`.

use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::{debug, info};

use crate::error::DbError;

// -----------------------------------------------------------------------
// Migration tracking
// -----------------------------------------------------------------------

const MIGRATION_TABLE_DDL: &str = "\
DEFINE TABLE IF NOT EXISTS _migration SCHEMAFULL;
DEFINE FIELD IF NOT EXISTS version ON TABLE _migration TYPE int;
DEFINE FIELD IF NOT EXISTS name ON TABLE _migration TYPE string;
DEFINE FIELD IF NOT EXISTS applied_at ON TABLE _migration TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX IF NOT EXISTS idx_migration_version ON TABLE _migration \
    COLUMNS version UNIQUE;
";

#[derive(Debug, SurrealValue)]
struct MigrationRecord {
    version: u32,
}

struct Migration {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

static MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "filter_tables",
        sql: SCHEMA_V1,
    },
    Migration {
        version: 2,
        name: "filter_rule_permission_set",
        sql: SCHEMA_V2,
    },
];

// -----------------------------------------------------------------------
// Schema v1: filter objects, filter rules, resource schemas
// -----------------------------------------------------------------------

const SCHEMA_V1: &str = "\
-- =======================================================================
-- Filter objects (one hop of a filter chain)
-- =======================================================================
DEFINE TABLE filter_object SCHEMAFULL;
DEFINE FIELD key ON TABLE filter_object TYPE string;
DEFINE FIELD name ON TABLE filter_object TYPE string;
DEFINE FIELD resource ON TABLE filter_object TYPE string;
DEFINE FIELD field ON TABLE filter_object TYPE string;
DEFINE FIELD previous_field ON TABLE filter_object TYPE option<string>;
DEFINE FIELD previous_filter ON TABLE filter_object TYPE option<string>;
DEFINE FIELD addon_owner ON TABLE filter_object TYPE option<string>;
DEFINE FIELD hidden ON TABLE filter_object TYPE bool DEFAULT false;
DEFINE FIELD created_at ON TABLE filter_object TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE filter_object TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_filter_object_key ON TABLE filter_object \
    COLUMNS key UNIQUE;
DEFINE INDEX idx_filter_object_resource ON TABLE filter_object \
    COLUMNS resource;

-- =======================================================================
-- Filter rules (role/resource bindings to a filter object)
-- =======================================================================
DEFINE TABLE filter_rule SCHEMAFULL;
DEFINE FIELD key ON TABLE filter_rule TYPE string;
DEFINE FIELD employee_type ON TABLE filter_rule TYPE int \
    ASSERT $value IN [1, 2, 3];
DEFINE FIELD resource ON TABLE filter_rule TYPE string;
DEFINE FIELD filter ON TABLE filter_rule TYPE string;
DEFINE FIELD addon_owner ON TABLE filter_rule TYPE option<string>;
DEFINE FIELD hidden ON TABLE filter_rule TYPE bool DEFAULT false;
DEFINE FIELD created_at ON TABLE filter_rule TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE filter_rule TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_filter_rule_key ON TABLE filter_rule \
    COLUMNS key UNIQUE;
DEFINE INDEX idx_filter_rule_binding ON TABLE filter_rule \
    COLUMNS resource, employee_type;

-- =======================================================================
-- Resource schemas (catalog published by resource owners)
-- =======================================================================
DEFINE TABLE resource_schema SCHEMAFULL;
DEFINE FIELD name ON TABLE resource_schema TYPE string;
DEFINE FIELD addon_owner ON TABLE resource_schema TYPE option<string>;
DEFINE FIELD fields ON TABLE resource_schema TYPE object FLEXIBLE \
    DEFAULT {};
DEFINE FIELD updated_at ON TABLE resource_schema TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_resource_schema_name ON TABLE resource_schema \
    COLUMNS name UNIQUE;
";

// -----------------------------------------------------------------------
// Schema v2: permission sets on filter rules
// -----------------------------------------------------------------------

// Rows written before v2 keep NONE until the permission-set backfill runs.
const SCHEMA_V2: &str = "\
DEFINE FIELD permission_set ON TABLE filter_rule TYPE option<string> \
    ASSERT $value = NONE OR $value IN ['Sync', 'Online'];
DEFINE INDEX idx_filter_rule_permission_set ON TABLE filter_rule \
    COLUMNS permission_set;
";

// -----------------------------------------------------------------------
// Public API
// -----------------------------------------------------------------------

/// Highest applied migration version, 0 on a fresh database.
async fn applied_version<C: Connection>(db: &Surreal<C>) -> Result<u32, DbError> {
    let mut result = db
        .query("SELECT version FROM _migration ORDER BY version DESC LIMIT 1")
        .await?;
    let records: Vec<MigrationRecord> = result.take(0)?;
    Ok(records.first().map(|m| m.version).unwrap_or(0))
}

/// Run all pending migrations against the given SurrealDB client.
///
/// Creates the `_migration` tracking table on first run, then applies each
/// migration whose version exceeds the recorded one. Safe to re-run.
pub async fn run_migrations<C: Connection>(db: &Surreal<C>) -> Result<(), DbError> {
    db.query(MIGRATION_TABLE_DDL)
        .await?
        .check()
        .map_err(|e| DbError::Migration(e.to_string()))?;

    let current_version = applied_version(db).await?;
    debug!(current_version, "Schema version before migrations");

    for migration in MIGRATIONS.iter().filter(|m| m.version > current_version) {
        info!(
            version = migration.version,
            name = migration.name,
            "Applying migration"
        );
        db.query(migration.sql).await?.check().map_err(|e| {
            DbError::Migration(format!(
                "Migration v{} '{}' failed: {}",
                migration.version, migration.name, e,
            ))
        })?;

        db.query("CREATE _migration SET version = $version, name = $name")
            .bind(("version", migration.version))
            .bind(("name", migration.name))
            .await?
            .check()
            .map_err(|e| {
                DbError::Migration(format!(
                    "Failed to record migration v{}: {}",
                    migration.version, e,
                ))
            })?;
    }

    Ok(())
}

/// Raw DDL for version 1, without the later permission-set column.
///
/// Lets tests reproduce a pre-v2 database holding legacy rule rows.
pub fn schema_v1() -> &'static str {
    SCHEMA_V1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrations_are_ordered() {
        for window in MIGRATIONS.windows(2) {
            assert!(
                window[0].version < window[1].version,
                "Migrations must be in ascending version order"
            );
        }
    }

    #[test]
    fn permission_set_arrives_after_rule_table() {
        assert!(!SCHEMA_V1.contains("permission_set"));
        assert!(SCHEMA_V2.contains("ON TABLE filter_rule"));
    }
}
