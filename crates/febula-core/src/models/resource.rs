//! Resource schema model, as published by the external catalog.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Field type marking a reference to another resource.
pub const RESOURCE_FIELD_TYPE: &str = "Resource";

/// Name of the implicit self-referencing key field.
pub const KEY_FIELD: &str = "Key";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSchema {
    #[serde(rename = "Type")]
    pub field_type: String,
    /// Name of the referenced resource (Resource-typed fields only).
    #[serde(rename = "Resource", default, skip_serializing_if = "Option::is_none")]
    pub referenced_resource: Option<String>,
    /// Owner of the referenced resource.
    #[serde(rename = "AddonUUID", default, skip_serializing_if = "Option::is_none")]
    pub referenced_addon_owner: Option<String>,
    /// Whether sync applies the referenced resource's system filter through
    /// this field.
    #[serde(rename = "ApplySystemFilter", default)]
    pub apply_system_filter: bool,
}

impl FieldSchema {
    /// A Resource-typed field pointing at `resource`.
    pub fn reference(resource: impl Into<String>) -> Self {
        Self {
            field_type: RESOURCE_FIELD_TYPE.into(),
            referenced_resource: Some(resource.into()),
            referenced_addon_owner: None,
            apply_system_filter: false,
        }
    }

    /// A non-reference field of the given type.
    pub fn scalar(field_type: impl Into<String>) -> Self {
        Self {
            field_type: field_type.into(),
            referenced_resource: None,
            referenced_addon_owner: None,
            apply_system_filter: false,
        }
    }

    pub fn owned_by(mut self, owner: impl Into<String>) -> Self {
        self.referenced_addon_owner = Some(owner.into());
        self
    }

    pub fn with_system_filter(mut self) -> Self {
        self.apply_system_filter = true;
        self
    }

    pub fn is_reference(&self) -> bool {
        self.field_type == RESOURCE_FIELD_TYPE
    }

    /// The referenced resource, if this is a Resource-typed field that names
    /// one.
    pub fn reference_target(&self) -> Option<&str> {
        if self.is_reference() {
            self.referenced_resource.as_deref()
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "AddonUUID", default, skip_serializing_if = "Option::is_none")]
    pub addon_owner: Option<String>,
    #[serde(rename = "Fields", default)]
    pub fields: BTreeMap<String, FieldSchema>,
}

impl Resource {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            addon_owner: None,
            fields: BTreeMap::new(),
        }
    }

    pub fn owned_by(mut self, owner: impl Into<String>) -> Self {
        self.addon_owner = Some(owner.into());
        self
    }

    pub fn with_field(mut self, name: impl Into<String>, field: FieldSchema) -> Self {
        self.fields.insert(name.into(), field);
        self
    }

    /// Adds the implicit `Key` field referencing this resource itself.
    pub fn with_key_field(mut self) -> Self {
        let mut key = FieldSchema::reference(self.name.clone());
        key.referenced_addon_owner = self.addon_owner.clone();
        self.fields.insert(KEY_FIELD.into(), key);
        self
    }

    pub fn field(&self, name: &str) -> Option<&FieldSchema> {
        self.fields.get(name)
    }

    /// Resource that `field` points to, if it is a Resource-typed field.
    pub fn reference_target(&self, field: &str) -> Option<&str> {
        self.field(field).and_then(FieldSchema::reference_target)
    }

    /// Resource-typed fields, in field-name order.
    pub fn reference_fields(&self) -> impl Iterator<Item = (&str, &FieldSchema)> {
        self.fields
            .iter()
            .filter(|(_, field)| field.is_reference())
            .map(|(name, field)| (name.as_str(), field))
    }

    /// Resource-typed fields the resource declares itself, excluding the
    /// synthetic `Key`.
    pub fn declared_reference_fields(&self) -> impl Iterator<Item = (&str, &FieldSchema)> {
        self.reference_fields().filter(|(name, _)| *name != KEY_FIELD)
    }

    /// True if a declared field of this resource points at `target`.
    pub fn references(&self, target: &Resource) -> bool {
        self.declared_reference_fields().any(|(_, field)| {
            field.reference_target() == Some(target.name.as_str())
                && match (&field.referenced_addon_owner, &target.addon_owner) {
                    (Some(field_owner), Some(target_owner)) => field_owner == target_owner,
                    _ => true,
                }
        })
    }
}
