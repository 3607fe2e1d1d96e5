use rigstock_auth::SessionClaims;
use rigstock_core::UserId;

/// Authenticated caller of a request, derived from verified session claims.
///
/// Inserted into request extensions by [`crate::middleware::require_token`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentUser {
    claims: SessionClaims,
}

impl CurrentUser {
    pub fn new(claims: SessionClaims) -> Self {
        Self { claims }
    }

    pub fn user_id(&self) -> UserId {
        self.claims.user_id
    }

    pub fn username(&self) -> &str {
        &self.claims.username
    }

    pub fn is_admin(&self) -> bool {
        self.claims.is_admin()
    }

    pub fn claims(&self) -> &SessionClaims {
        &self.claims
    }
}
