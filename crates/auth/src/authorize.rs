//! Role gates applied to verified session claims.
//!
//! - No IO
//! - No panics
//! - No mutation (pure policy check)

use thiserror::Error;

use crate::claims::SessionClaims;
use crate::Role;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("forbidden: requires role {0}")]
    Forbidden(Role),
}

/// Require that the token carries `required`.
pub fn authorize(claims: &SessionClaims, required: Role) -> Result<(), AuthzError> {
    if claims.role == required {
        Ok(())
    } else {
        Err(AuthzError::Forbidden(required))
    }
}

/// Shorthand for the admin-only gate.
pub fn require_admin(claims: &SessionClaims) -> Result<(), AuthzError> {
    authorize(claims, Role::Admin)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rigstock_core::UserId;

    fn claims(role: Role) -> SessionClaims {
        SessionClaims {
            user_id: UserId::new(3),
            username: "x".into(),
            role,
            iat: 0,
            exp: 1,
        }
    }

    #[test]
    fn admin_gate() {
        assert_eq!(require_admin(&claims(Role::Admin)), Ok(()));
        assert_eq!(
            require_admin(&claims(Role::User)),
            Err(AuthzError::Forbidden(Role::Admin))
        );
    }
}
