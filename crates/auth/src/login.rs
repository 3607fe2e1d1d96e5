//! Credential check: lockout, lookup, password, account status, token.

use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::lockout::{LockoutPolicy, LoginAttemptStore};
use crate::password::verify_password;
use crate::token::{Hs256Tokens, TokenError};
use crate::User;

/// Why a login was refused.
///
/// `InvalidCredentials` covers both unknown usernames and wrong passwords so
/// the caller cannot enumerate accounts.
#[derive(Debug, Error)]
pub enum LoginError<E> {
    #[error("account temporarily locked, try again in 15 minutes")]
    AccountLocked,

    #[error("invalid username or password")]
    InvalidCredentials,

    #[error("inactive account")]
    InactiveAccount,

    #[error(transparent)]
    Token(TokenError),

    #[error("user lookup failed: {0}")]
    Lookup(E),
}

/// Successful login.
#[derive(Debug, Clone)]
pub struct Authenticated {
    pub user: User,
    pub token: String,
}

#[derive(Clone)]
pub struct Authenticator {
    attempts: Arc<dyn LoginAttemptStore>,
    policy: LockoutPolicy,
    tokens: Hs256Tokens,
}

impl Authenticator {
    pub fn new(attempts: Arc<dyn LoginAttemptStore>, policy: LockoutPolicy, tokens: Hs256Tokens) -> Self {
        Self {
            attempts,
            policy,
            tokens,
        }
    }

    pub fn tokens(&self) -> &Hs256Tokens {
        &self.tokens
    }

    /// Authenticate `username`/`password`.
    ///
    /// `find_user` is only invoked when the username is not locked out. The
    /// caller is responsible for persisting `last_login` on success.
    pub async fn authenticate<F, Fut, E>(
        &self,
        username: &str,
        password: &str,
        now: DateTime<Utc>,
        find_user: F,
    ) -> Result<Authenticated, LoginError<E>>
    where
        F: FnOnce(String) -> Fut,
        Fut: Future<Output = Result<Option<User>, E>>,
    {
        if self.attempts.is_locked(username, now).await {
            tracing::warn!(username, "login attempt on locked account");
            return Err(LoginError::AccountLocked);
        }

        let user = find_user(username.to_string())
            .await
            .map_err(LoginError::Lookup)?;

        let Some(user) = user.filter(|u| verify_password(password, &u.password_hash)) else {
            let attempt = self.attempts.record_failure(username, now).await;
            tracing::warn!(username, attempt, "failed login");
            if attempt >= self.policy.max_attempts {
                return Err(LoginError::AccountLocked);
            }
            return Err(LoginError::InvalidCredentials);
        };

        if !user.is_active() {
            tracing::warn!(username, "login attempt with inactive account");
            return Err(LoginError::InactiveAccount);
        }

        self.attempts.clear(username).await;
        let token = self.tokens.issue(&user, now).map_err(LoginError::Token)?;
        tracing::info!(username, user_id = %user.id, "login succeeded");

        Ok(Authenticated { user, token })
    }
}

#[cfg(test)]
mod tests {
    use std::convert::Infallible;

    use super::*;
    use crate::lockout::InMemoryLoginAttempts;
    use crate::password::hash_password;
    use crate::token::TokenVerifier;
    use crate::{Role, UserStatus};
    use rigstock_core::UserId;

    fn authenticator() -> Authenticator {
        Authenticator::new(
            Arc::new(InMemoryLoginAttempts::default()),
            LockoutPolicy::default(),
            Hs256Tokens::new(b"test"),
        )
    }

    fn operator(status: UserStatus) -> User {
        User {
            id: UserId::new(2),
            username: "op".into(),
            email: "op@example.com".into(),
            password_hash: hash_password("pw").unwrap(),
            full_name: "Op".into(),
            role: Role::User,
            status,
            last_login: None,
            created_at: Utc::now(),
        }
    }

    async fn login(
        auth: &Authenticator,
        user: Option<User>,
        password: &str,
    ) -> Result<Authenticated, LoginError<Infallible>> {
        auth.authenticate("op", password, Utc::now(), |_| async move { Ok(user) })
            .await
    }

    #[tokio::test]
    async fn success_issues_verifiable_token() {
        let auth = authenticator();
        let ok = login(&auth, Some(operator(UserStatus::Active)), "pw").await.unwrap();
        let claims = auth.tokens().verify(&ok.token, Utc::now()).unwrap();
        assert_eq!(claims.user_id, UserId::new(2));
        assert_eq!(claims.role, Role::User);
    }

    #[tokio::test]
    async fn unknown_user_and_wrong_password_look_the_same() {
        let auth = authenticator();
        let a = login(&auth, None, "pw").await.unwrap_err();
        let b = login(&auth, Some(operator(UserStatus::Active)), "nope").await.unwrap_err();
        assert_eq!(a.to_string(), b.to_string());
        assert!(matches!(a, LoginError::InvalidCredentials));
    }

    #[tokio::test]
    async fn fifth_failure_locks_the_account() {
        let auth = authenticator();
        for _ in 0..4 {
            assert!(matches!(
                login(&auth, None, "x").await,
                Err(LoginError::InvalidCredentials)
            ));
        }
        assert!(matches!(login(&auth, None, "x").await, Err(LoginError::AccountLocked)));
        // Even the right password is refused while locked.
        assert!(matches!(
            login(&auth, Some(operator(UserStatus::Active)), "pw").await,
            Err(LoginError::AccountLocked)
        ));
    }

    #[tokio::test]
    async fn success_resets_failure_counter() {
        let auth = authenticator();
        for _ in 0..4 {
            let _ = login(&auth, None, "x").await;
        }
        assert!(login(&auth, Some(operator(UserStatus::Active)), "pw").await.is_ok());
        for _ in 0..4 {
            assert!(matches!(
                login(&auth, None, "x").await,
                Err(LoginError::InvalidCredentials)
            ));
        }
    }

    #[tokio::test]
    async fn inactive_account_is_refused() {
        let auth = authenticator();
        let err = login(&auth, Some(operator(UserStatus::Inactive)), "pw").await.unwrap_err();
        assert!(matches!(err, LoginError::InactiveAccount));
    }
}
