//! Soft-delete lifecycle shared by every stored entity.

use serde::{Deserialize, Serialize};

/// Whether a stored row is live or tombstoned.
///
/// Serialized as the `Hidden` boolean of the table layout: rows are never
/// physically removed, so dangling references keep resolving.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "bool", into = "bool")]
pub enum Lifecycle {
    #[default]
    Active,
    Deleted,
}

impl Lifecycle {
    pub fn is_deleted(self) -> bool {
        self == Lifecycle::Deleted
    }

    pub fn is_active(self) -> bool {
        self == Lifecycle::Active
    }
}

impl From<bool> for Lifecycle {
    fn from(hidden: bool) -> Self {
        if hidden {
            Lifecycle::Deleted
        } else {
            Lifecycle::Active
        }
    }
}

impl From<Lifecycle> for bool {
    fn from(lifecycle: Lifecycle) -> Self {
        lifecycle.is_deleted()
    }
}
