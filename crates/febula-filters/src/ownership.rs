//! Ownership of stored rows.
//!
//! A row carrying an owner is locked: it belongs to the system identity (or
//! to an addon writing through it) and regular callers cannot rewrite it.

use std::collections::BTreeMap;

use febula_core::error::{FebulaError, FebulaResult};
use febula_core::models::context::CallerContext;

/// Owner to stamp on a payload that declares none.
///
/// System writes and writes delegated by another owner are stamped with
/// the context's owner identity.
pub fn stamped_owner(
    ctx: &CallerContext,
    as_system: bool,
    payload_owner: Option<&str>,
) -> Option<String> {
    match payload_owner {
        Some(owner) => Some(owner.to_string()),
        None if as_system || ctx.is_delegated() => Some(ctx.owner_id.clone()),
        None => None,
    }
}

/// Checks that the caller may write a row declaring `payload_owner` over a
/// row currently owned by `stored_owner` (`None` stored row for inserts).
pub fn validate_ownership(
    ctx: &CallerContext,
    as_system: bool,
    stored: Option<Option<&str>>,
    payload_owner: Option<&str>,
    trusted_owners: &BTreeMap<String, String>,
) -> FebulaResult<()> {
    let is_new = stored.is_none();
    let stored_owner = stored.flatten();

    if let Some(stored_owner) = stored_owner {
        if payload_owner != Some(stored_owner) {
            return Err(FebulaError::OwnershipValidation {
                message: format!(
                    "owner {stored_owner} cannot be changed to {}",
                    payload_owner.unwrap_or("none")
                ),
            });
        }
    }

    let Some(owner) = payload_owner else {
        return Ok(());
    };

    if owner == ctx.caller_id {
        if as_system || is_new {
            return Ok(());
        }
        return Err(FebulaError::OwnershipValidation {
            message: format!("row owned by {owner} is locked"),
        });
    }

    match (trusted_owners.get(owner), ctx.secret.as_deref()) {
        (Some(expected), Some(secret)) if owner == ctx.owner_id && expected == secret => Ok(()),
        _ => Err(FebulaError::OwnershipValidation {
            message: format!("caller {} cannot write rows owned by {owner}", ctx.caller_id),
        }),
    }
}
