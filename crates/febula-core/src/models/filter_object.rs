//! Filter object domain model: one hop of a filter chain.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::lifecycle::Lifecycle;

/// A persisted filter object.
///
/// Selects every `field` value from `resource`, optionally restricted to
/// rows whose `previous_field` is in the result of `previous_filter`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterObject {
    #[serde(rename = "Key")]
    pub key: String,
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Resource")]
    pub resource: String,
    #[serde(rename = "Field")]
    pub field: String,
    #[serde(rename = "PreviousField", default, skip_serializing_if = "Option::is_none")]
    pub previous_field: Option<String>,
    #[serde(rename = "PreviousFilter", default, skip_serializing_if = "Option::is_none")]
    pub previous_filter: Option<String>,
    /// Present on system objects, which regular callers cannot edit.
    #[serde(rename = "AddonUUID", default, skip_serializing_if = "Option::is_none")]
    pub addon_owner: Option<String>,
    #[serde(rename = "Hidden", default)]
    pub lifecycle: Lifecycle,
    #[serde(rename = "CreationDateTime")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "ModificationDateTime")]
    pub updated_at: DateTime<Utc>,
}

impl FilterObject {
    pub fn is_locked(&self) -> bool {
        self.addon_owner.is_some()
    }

    /// A node without predecessor anchors its chain.
    pub fn is_terminal(&self) -> bool {
        self.previous_filter.is_none()
    }

    /// `(PreviousField, PreviousFilter)` when the object chains from a
    /// predecessor.
    pub fn previous(&self) -> Option<(&str, &str)> {
        match (&self.previous_field, &self.previous_filter) {
            (Some(field), Some(filter)) => Some((field.as_str(), filter.as_str())),
            _ => None,
        }
    }

    /// The `(Name, Resource, Field, PreviousField)` tuple that identifies
    /// what a filter object means, regardless of its key.
    pub fn semantic_tuple(&self) -> (&str, &str, &str, Option<&str>) {
        (
            &self.name,
            &self.resource,
            &self.field,
            self.previous_field.as_deref(),
        )
    }
}

/// Upsert payload as received from callers; every field is optional so
/// schema validation can report what is missing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpsertFilterObject {
    #[serde(rename = "Key", default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(rename = "Name", default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "Resource", default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<String>,
    #[serde(rename = "Field", default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(rename = "PreviousField", default, skip_serializing_if = "Option::is_none")]
    pub previous_field: Option<String>,
    #[serde(rename = "PreviousFilter", default, skip_serializing_if = "Option::is_none")]
    pub previous_filter: Option<String>,
    #[serde(rename = "AddonUUID", default, skip_serializing_if = "Option::is_none")]
    pub addon_owner: Option<String>,
    #[serde(rename = "Hidden", default, skip_serializing_if = "Option::is_none")]
    pub hidden: Option<bool>,
}

impl UpsertFilterObject {
    /// A root (terminal) filter object payload.
    pub fn root(
        name: impl Into<String>,
        resource: impl Into<String>,
        field: impl Into<String>,
    ) -> Self {
        Self {
            name: Some(name.into()),
            resource: Some(resource.into()),
            field: Some(field.into()),
            ..Default::default()
        }
    }

    /// Chains this payload onto `previous_filter` through `previous_field`.
    pub fn chained(
        mut self,
        previous_field: impl Into<String>,
        previous_filter: impl Into<String>,
    ) -> Self {
        self.previous_field = Some(previous_field.into());
        self.previous_filter = Some(previous_filter.into());
        self
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }
}

impl From<FilterObject> for UpsertFilterObject {
    fn from(object: FilterObject) -> Self {
        Self {
            key: Some(object.key),
            name: Some(object.name),
            resource: Some(object.resource),
            field: Some(object.field),
            previous_field: object.previous_field,
            previous_filter: object.previous_filter,
            addon_owner: object.addon_owner,
            hidden: Some(object.lifecycle.is_deleted()),
        }
    }
}

/// Lookup criteria for filter objects. Unset criteria match everything.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterObjectQuery {
    #[serde(rename = "Resource")]
    pub resource: Option<String>,
    #[serde(rename = "Name")]
    pub name: Option<String>,
    /// Case-insensitive substring match on the name.
    #[serde(rename = "Search")]
    pub name_contains: Option<String>,
    #[serde(rename = "Field")]
    pub field: Option<String>,
    #[serde(rename = "PreviousField")]
    pub previous_field: Option<String>,
    /// Objects chaining from this key.
    #[serde(rename = "PreviousFilter")]
    pub previous_filter: Option<String>,
    #[serde(rename = "AddonUUID")]
    pub addon_owner: Option<String>,
    #[serde(rename = "IncludeDeleted")]
    pub include_deleted: bool,
}

impl FilterObjectQuery {
    /// In-process evaluation of the criteria, for stores that filter after
    /// loading.
    pub fn matches(&self, object: &FilterObject) -> bool {
        fn eq(criterion: &Option<String>, value: &str) -> bool {
            criterion.as_deref().is_none_or(|c| c == value)
        }

        (self.include_deleted || object.lifecycle.is_active())
            && eq(&self.resource, &object.resource)
            && eq(&self.name, &object.name)
            && eq(&self.field, &object.field)
            && self
                .previous_field
                .as_deref()
                .is_none_or(|c| object.previous_field.as_deref() == Some(c))
            && self
                .previous_filter
                .as_deref()
                .is_none_or(|c| object.previous_filter.as_deref() == Some(c))
            && self
                .addon_owner
                .as_deref()
                .is_none_or(|c| object.addon_owner.as_deref() == Some(c))
            && self.name_contains.as_deref().is_none_or(|needle| {
                object.name.to_lowercase().contains(&needle.to_lowercase())
            })
    }
}
