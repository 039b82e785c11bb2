//! Filter rule domain model: which filter object governs a resource for a
//! role in a permission context.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::lifecycle::Lifecycle;

/// Profile a rule applies to. Serialized as its numeric code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum EmployeeType {
    Admin = 1,
    Rep = 2,
    Buyer = 3,
}

impl EmployeeType {
    /// Every role, in enumeration order.
    pub const ALL: [EmployeeType; 3] =
        [EmployeeType::Admin, EmployeeType::Rep, EmployeeType::Buyer];

    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn profile_name(self) -> &'static str {
        match self {
            EmployeeType::Admin => "Admin",
            EmployeeType::Rep => "Rep",
            EmployeeType::Buyer => "Buyer",
        }
    }

    pub fn from_profile_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.profile_name() == name)
    }
}

impl TryFrom<u8> for EmployeeType {
    type Error = String;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            1 => Ok(EmployeeType::Admin),
            2 => Ok(EmployeeType::Rep),
            3 => Ok(EmployeeType::Buyer),
            other => Err(format!("unknown employee type: {other}")),
        }
    }
}

impl From<EmployeeType> for u8 {
    fn from(employee_type: EmployeeType) -> Self {
        employee_type.code()
    }
}

impl fmt::Display for EmployeeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.profile_name())
    }
}

/// Permission context a rule applies in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PermissionSet {
    /// Offline data sync scope. At most one rule per resource and role.
    #[default]
    Sync,
    /// Live query scope. Any number of rules.
    Online,
}

impl PermissionSet {
    pub const ALL: [PermissionSet; 2] = [PermissionSet::Sync, PermissionSet::Online];

    pub fn as_str(self) -> &'static str {
        match self {
            PermissionSet::Sync => "Sync",
            PermissionSet::Online => "Online",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "Sync" => Some(PermissionSet::Sync),
            "Online" => Some(PermissionSet::Online),
            _ => None,
        }
    }

    /// Whether `(Resource, EmployeeType)` must be unique within this set.
    pub fn requires_unique_binding(self) -> bool {
        self == PermissionSet::Sync
    }
}

impl fmt::Display for PermissionSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A persisted filter rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterRule {
    #[serde(rename = "Key")]
    pub key: String,
    #[serde(rename = "EmployeeType")]
    pub employee_type: EmployeeType,
    #[serde(rename = "Resource")]
    pub resource: String,
    /// Key of the governing filter object.
    #[serde(rename = "Filter")]
    pub filter: String,
    #[serde(rename = "PermissionSet")]
    pub permission_set: PermissionSet,
    #[serde(rename = "AddonUUID", default, skip_serializing_if = "Option::is_none")]
    pub addon_owner: Option<String>,
    #[serde(rename = "Hidden", default)]
    pub lifecycle: Lifecycle,
    #[serde(rename = "CreationDateTime")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "ModificationDateTime")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpsertFilterRule {
    #[serde(rename = "Key", default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(rename = "EmployeeType", default, skip_serializing_if = "Option::is_none")]
    pub employee_type: Option<EmployeeType>,
    #[serde(rename = "Resource", default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<String>,
    #[serde(rename = "Filter", default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
    #[serde(rename = "PermissionSet", default, skip_serializing_if = "Option::is_none")]
    pub permission_set: Option<PermissionSet>,
    #[serde(rename = "AddonUUID", default, skip_serializing_if = "Option::is_none")]
    pub addon_owner: Option<String>,
    #[serde(rename = "Hidden", default, skip_serializing_if = "Option::is_none")]
    pub hidden: Option<bool>,
}

impl UpsertFilterRule {
    pub fn new(
        employee_type: EmployeeType,
        resource: impl Into<String>,
        filter: impl Into<String>,
    ) -> Self {
        Self {
            employee_type: Some(employee_type),
            resource: Some(resource.into()),
            filter: Some(filter.into()),
            ..Default::default()
        }
    }

    pub fn in_permission_set(mut self, permission_set: PermissionSet) -> Self {
        self.permission_set = Some(permission_set);
        self
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }
}

impl From<FilterRule> for UpsertFilterRule {
    fn from(rule: FilterRule) -> Self {
        Self {
            key: Some(rule.key),
            employee_type: Some(rule.employee_type),
            resource: Some(rule.resource),
            filter: Some(rule.filter),
            permission_set: Some(rule.permission_set),
            addon_owner: rule.addon_owner,
            hidden: Some(rule.lifecycle.is_deleted()),
        }
    }
}

/// Permission-set criterion of a [`FilterRuleQuery`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PermissionSetFilter {
    Is(PermissionSet),
    IsNot(PermissionSet),
    /// Legacy rows stored before permission sets existed.
    Missing,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterRuleQuery {
    #[serde(rename = "Resource")]
    pub resource: Option<String>,
    #[serde(rename = "EmployeeType")]
    pub employee_type: Option<EmployeeType>,
    #[serde(rename = "PermissionSet")]
    pub permission_set: Option<PermissionSetFilter>,
    #[serde(rename = "Filter")]
    pub filter: Option<String>,
    #[serde(rename = "IncludeDeleted")]
    pub include_deleted: bool,
}

impl FilterRuleQuery {
    pub fn in_permission_set(permission_set: PermissionSet) -> Self {
        Self {
            permission_set: Some(PermissionSetFilter::Is(permission_set)),
            ..Default::default()
        }
    }

    /// In-process evaluation of the criteria. `stored_permission_set` is the
    /// raw column value, `None` for legacy rows.
    pub fn matches_stored(
        &self,
        rule: &FilterRule,
        stored_permission_set: Option<PermissionSet>,
    ) -> bool {
        let permission_set_matches = match self.permission_set {
            None => true,
            Some(PermissionSetFilter::Is(set)) => rule.permission_set == set,
            Some(PermissionSetFilter::IsNot(set)) => rule.permission_set != set,
            Some(PermissionSetFilter::Missing) => stored_permission_set.is_none(),
        };

        (self.include_deleted || rule.lifecycle.is_active())
            && permission_set_matches
            && self.resource.as_deref().is_none_or(|r| r == rule.resource)
            && self.employee_type.is_none_or(|t| t == rule.employee_type)
            && self.filter.as_deref().is_none_or(|f| f == rule.filter)
    }

    /// Evaluation against a rule whose stored permission set is known to be
    /// present.
    pub fn matches(&self, rule: &FilterRule) -> bool {
        self.matches_stored(rule, Some(rule.permission_set))
    }
}

/// Pairing of a basic filter object with the resource its `Field`
/// references, produced while seeding default filters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BasicFilterRuleData {
    #[serde(rename = "Resource")]
    pub resource: String,
    #[serde(rename = "Key")]
    pub key: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn employee_type_serializes_as_code() {
        assert_eq!(serde_json::to_value(EmployeeType::Rep).unwrap(), 2);
        let buyer: EmployeeType = serde_json::from_value(serde_json::json!(3)).unwrap();
        assert_eq!(buyer, EmployeeType::Buyer);
        assert!(serde_json::from_value::<EmployeeType>(serde_json::json!(4)).is_err());
    }

    #[test]
    fn permission_set_defaults_to_sync() {
        let rule: UpsertFilterRule = serde_json::from_value(serde_json::json!({
            "EmployeeType": 1,
            "Resource": "accounts",
            "Filter": "k"
        }))
        .unwrap();
        assert_eq!(rule.permission_set, None);
        assert_eq!(rule.permission_set.unwrap_or_default(), PermissionSet::Sync);
        assert!(
            serde_json::from_value::<UpsertFilterRule>(serde_json::json!({
                "PermissionSet": "InvalidPermissionSet"
            }))
            .is_err()
        );
    }

    #[test]
    fn profile_names_round_trip_in_order() {
        let names: Vec<&str> = EmployeeType::ALL.iter().map(|t| t.profile_name()).collect();
        assert_eq!(names, vec!["Admin", "Rep", "Buyer"]);
        assert_eq!(EmployeeType::from_profile_name("Rep"), Some(EmployeeType::Rep));
        assert_eq!(EmployeeType::from_profile_name("Owner"), None);
    }
}
