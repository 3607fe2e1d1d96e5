//! HS256 session tokens.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use thiserror::Error;

use crate::claims::{validate_claims, SessionClaims, TokenValidationError};
use crate::User;

/// Lifetime of a session token.
pub const TOKEN_TTL_HOURS: i64 = 24;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("token has expired")]
    Expired,

    #[error("invalid token: {0}")]
    Invalid(String),

    #[error("failed to sign token: {0}")]
    Signing(String),
}

/// Verifies bearer tokens. Object-safe so the HTTP layer can hold it as
/// `Arc<dyn TokenVerifier>`.
pub trait TokenVerifier: Send + Sync {
    fn verify(&self, token: &str, now: DateTime<Utc>) -> Result<SessionClaims, TokenError>;
}

/// Issues and verifies HS256-signed tokens with a shared secret.
#[derive(Clone)]
pub struct Hs256Tokens {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl core::fmt::Debug for Hs256Tokens {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Hs256Tokens").field("ttl", &self.ttl).finish_non_exhaustive()
    }
}

impl Hs256Tokens {
    pub fn new(secret: &[u8]) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            ttl: Duration::hours(TOKEN_TTL_HOURS),
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Sign a token for `user`, valid from `now` for the configured TTL.
    pub fn issue(&self, user: &User, now: DateTime<Utc>) -> Result<String, TokenError> {
        let claims = SessionClaims::for_user(user, now, self.ttl);
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| TokenError::Signing(e.to_string()))
    }
}

impl TokenVerifier for Hs256Tokens {
    fn verify(&self, token: &str, now: DateTime<Utc>) -> Result<SessionClaims, TokenError> {
        // Expiry is checked against the caller's clock in `validate_claims`.
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.set_required_spec_claims(&["exp"]);

        let data = decode::<SessionClaims>(token, &self.decoding, &validation)
            .map_err(|e| TokenError::Invalid(e.to_string()))?;

        validate_claims(&data.claims, now).map_err(|e| match e {
            TokenValidationError::Expired => TokenError::Expired,
            other => TokenError::Invalid(other.to_string()),
        })?;

        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Role, UserStatus};
    use rigstock_core::UserId;

    fn admin() -> User {
        User {
            id: UserId::new(1),
            username: "admin".into(),
            email: "admin@example.com".into(),
            password_hash: String::new(),
            full_name: "Admin".into(),
            role: Role::Admin,
            status: UserStatus::Active,
            last_login: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn issued_token_round_trips_claims() {
        let tokens = Hs256Tokens::new(b"test-secret");
        let now = Utc::now();
        let token = tokens.issue(&admin(), now).unwrap();

        let claims = tokens.verify(&token, now).unwrap();
        assert_eq!(claims.user_id, UserId::new(1));
        assert_eq!(claims.username, "admin");
        assert_eq!(claims.role, Role::Admin);
        assert_eq!(claims.exp - claims.iat, TOKEN_TTL_HOURS * 3600);
    }

    #[test]
    fn token_expires_after_ttl() {
        let tokens = Hs256Tokens::new(b"test-secret");
        let now = Utc::now();
        let token = tokens.issue(&admin(), now).unwrap();

        assert!(tokens.verify(&token, now + Duration::hours(23)).is_ok());
        assert_eq!(
            tokens.verify(&token, now + Duration::hours(24) + Duration::seconds(1)),
            Err(TokenError::Expired)
        );
    }

    #[test]
    fn wrong_secret_is_invalid() {
        let now = Utc::now();
        let token = Hs256Tokens::new(b"one").issue(&admin(), now).unwrap();
        let err = Hs256Tokens::new(b"two").verify(&token, now).unwrap_err();
        assert!(matches!(err, TokenError::Invalid(_)));
    }

    #[test]
    fn garbage_is_invalid() {
        let err = Hs256Tokens::new(b"s").verify("not-a-jwt", Utc::now()).unwrap_err();
        assert!(matches!(err, TokenError::Invalid(_)));
    }
}
