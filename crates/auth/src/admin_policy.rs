//! Single-administrator invariant.
//!
//! Exactly one ADMIN exists (the primary administrator, `UserId(1)`). Every
//! path that creates an account, changes a role or deactivates an account
//! calls into this module.

use rigstock_core::{DomainError, DomainResult};

use crate::{Role, User};

/// New accounts can never be administrators.
pub fn ensure_new_account_role(requested: Role) -> DomainResult<()> {
    if requested.is_admin() {
        return Err(DomainError::forbidden(
            "cannot create more administrators, the system has a single administrator",
        ));
    }
    Ok(())
}

/// A role change may neither demote the primary administrator nor promote
/// anyone else to ADMIN.
pub fn ensure_role_change(target: &User, requested: Role) -> DomainResult<()> {
    if target.id.is_primary_admin() && !requested.is_admin() {
        return Err(DomainError::invariant(
            "cannot change the role of the primary administrator",
        ));
    }
    if requested.is_admin() && !target.role.is_admin() {
        return Err(DomainError::forbidden("cannot create more administrators"));
    }
    Ok(())
}

/// The primary administrator cannot be deactivated.
pub fn ensure_deactivatable(target: &User) -> DomainResult<()> {
    if target.id.is_primary_admin() {
        return Err(DomainError::invariant(
            "cannot deactivate the primary administrator",
        ));
    }
    Ok(())
}
