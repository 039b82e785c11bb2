//! Repository trait definitions for data access abstraction.
//!
//! All repository operations are async. Both entity tables share one
//! generic contract, parameterized over the entity type.

use chrono::{DateTime, Utc};

use crate::error::FebulaResult;
use crate::models::{
    filter_object::{FilterObject, FilterObjectQuery},
    filter_rule::{FilterRule, FilterRuleQuery},
    lifecycle::Lifecycle,
    resource::Resource,
};

// ---------------------------------------------------------------------------
// Resource catalog (external, read-only)
// ---------------------------------------------------------------------------

pub trait ResourceCatalog: Send + Sync {
    fn list_resources(&self) -> impl Future<Output = FebulaResult<Vec<Resource>>> + Send;
    fn get_resource(
        &self,
        name: &str,
    ) -> impl Future<Output = FebulaResult<Option<Resource>>> + Send;
}

// ---------------------------------------------------------------------------
// Soft-deletable key/value tables
// ---------------------------------------------------------------------------

/// A row of a keyed table with soft-delete lifecycle.
pub trait TableEntity: Clone + Send + Sync + 'static {
    /// Backing table name.
    const TABLE: &'static str;
    /// Human label used in error messages.
    const ENTITY: &'static str;

    type Query: Default + Clone + Send + Sync;

    fn key(&self) -> &str;
    fn addon_owner(&self) -> Option<&str>;
    fn lifecycle(&self) -> Lifecycle;
    fn created_at(&self) -> DateTime<Utc>;

    /// Turns the row into a tombstone. Every other field is left intact.
    fn mark_deleted(&mut self, at: DateTime<Utc>);
}

pub trait TableRepository<T: TableEntity>: Send + Sync {
    /// Inserts or replaces the row stored under `entity.key()`.
    fn upsert(&self, entity: T) -> impl Future<Output = FebulaResult<T>> + Send;
    /// Includes deleted rows.
    fn get_by_key(&self, key: &str) -> impl Future<Output = FebulaResult<Option<T>>> + Send;
    /// Includes deleted rows. Unknown keys are skipped.
    fn get_by_keys(&self, keys: &[String]) -> impl Future<Output = FebulaResult<Vec<T>>> + Send;
    /// Rows matching `query`, oldest first.
    fn find(&self, query: &T::Query) -> impl Future<Output = FebulaResult<Vec<T>>> + Send;
}

impl TableEntity for FilterObject {
    const TABLE: &'static str = "filter_object";
    const ENTITY: &'static str = "filter object";

    type Query = FilterObjectQuery;

    fn key(&self) -> &str {
        &self.key
    }

    fn addon_owner(&self) -> Option<&str> {
        self.addon_owner.as_deref()
    }

    fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn mark_deleted(&mut self, at: DateTime<Utc>) {
        self.lifecycle = Lifecycle::Deleted;
        self.updated_at = at;
    }
}

impl TableEntity for FilterRule {
    const TABLE: &'static str = "filter_rule";
    const ENTITY: &'static str = "filter rule";

    type Query = FilterRuleQuery;

    fn key(&self) -> &str {
        &self.key
    }

    fn addon_owner(&self) -> Option<&str> {
        self.addon_owner.as_deref()
    }

    fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn mark_deleted(&mut self, at: DateTime<Utc>) {
        self.lifecycle = Lifecycle::Deleted;
        self.updated_at = at;
    }
}
