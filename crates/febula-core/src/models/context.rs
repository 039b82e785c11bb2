//! Per-call identity passed into every store operation.

use serde::{Deserialize, Serialize};

/// Who is writing, on whose behalf, and with which credential.
///
/// `caller_id` is the identity of the service that owns the tables;
/// `owner_id` is the identity the request declares it acts for. The two
/// differ when another addon writes through this service, in which case
/// `secret` must be that owner's credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallerContext {
    pub caller_id: String,
    pub owner_id: String,
    pub secret: Option<String>,
}

impl CallerContext {
    /// Context for a caller acting on its own behalf.
    pub fn direct(caller_id: impl Into<String>) -> Self {
        let caller_id = caller_id.into();
        Self {
            owner_id: caller_id.clone(),
            caller_id,
            secret: None,
        }
    }

    /// Context for a caller writing on behalf of `owner_id`.
    pub fn delegated(
        caller_id: impl Into<String>,
        owner_id: impl Into<String>,
        secret: Option<String>,
    ) -> Self {
        Self {
            caller_id: caller_id.into(),
            owner_id: owner_id.into(),
            secret,
        }
    }

    pub fn is_delegated(&self) -> bool {
        self.caller_id != self.owner_id
    }
}
