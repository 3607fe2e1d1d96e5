//! Service wiring: picks the store backend, the lockout counter and the
//! token issuer, and seeds the primary administrator.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{bail, Context};
use chrono::Utc;
use tracing::{info, warn};

use rigstock_auth::password::hash_password;
use rigstock_auth::{
    Authenticator, CreateUser, Hs256Tokens, InMemoryLoginAttempts, LoginAttemptStore, NewUser,
    Role, RoleAssignment, User, UserStatus,
};
use rigstock_core::{ArticleId, DomainError, ReportId, UserId};
use rigstock_infra::{
    ArticleStore, InMemoryStore, PostgresStore, ReportStore, Store, UserStore,
};
use rigstock_inventory::Article;
use rigstock_reports::Report;

use crate::config::{AdminBootstrap, AppConfig};

use super::errors::{ApiError, ApiResult};

/// Shared state handed to every handler through an `Extension`.
#[derive(Clone)]
pub struct AppServices {
    pub store: Arc<dyn Store>,
    pub authenticator: Authenticator,
    pub tokens: Arc<Hs256Tokens>,
    pub environment: String,
}

pub async fn build_services(config: &AppConfig) -> anyhow::Result<AppServices> {
    let store: Arc<dyn Store> = if config.use_persistent_stores {
        let Some(url) = config.database_url.as_deref() else {
            bail!("USE_PERSISTENT_STORES is set but DATABASE_URL is missing");
        };
        let pg = PostgresStore::connect(url)
            .await
            .context("failed to connect to PostgreSQL")?;
        pg.migrate().await.context("failed to apply schema")?;
        info!("using PostgreSQL store");
        Arc::new(pg)
    } else {
        info!("using in-memory store");
        Arc::new(InMemoryStore::new())
    };

    let tokens = Hs256Tokens::new(config.jwt_secret.as_bytes()).with_ttl(config.token_ttl);
    let attempts = login_attempts(config).await?;
    let authenticator = Authenticator::new(attempts, config.lockout, tokens.clone());

    seed_admin(store.as_ref(), &config.admin).await?;

    Ok(AppServices {
        store,
        authenticator,
        tokens: Arc::new(tokens),
        environment: config.environment.clone(),
    })
}

#[cfg(feature = "redis")]
async fn login_attempts(config: &AppConfig) -> anyhow::Result<Arc<dyn LoginAttemptStore>> {
    if let Some(url) = config.redis_url.as_deref() {
        let redis = rigstock_infra::RedisLoginAttempts::connect(url, config.lockout)
            .await
            .context("failed to connect to Redis")?;
        info!("using Redis lockout counter");
        return Ok(Arc::new(redis));
    }
    Ok(Arc::new(InMemoryLoginAttempts::new(config.lockout)))
}

#[cfg(not(feature = "redis"))]
async fn login_attempts(config: &AppConfig) -> anyhow::Result<Arc<dyn LoginAttemptStore>> {
    if config.redis_url.is_some() {
        warn!("REDIS_URL ignored: built without the `redis` feature");
    }
    Ok(Arc::new(InMemoryLoginAttempts::new(config.lockout)))
}

/// Create the primary administrator when no account exists yet. The first
/// insert into an empty table receives id 1.
async fn seed_admin(store: &dyn Store, admin: &AdminBootstrap) -> anyhow::Result<()> {
    if store.count_users().await? > 0 {
        return Ok(());
    }

    let password_hash = hash_password(&admin.password)?;
    let user = store
        .insert_user(
            NewUser {
                username: admin.username.trim().to_lowercase(),
                email: admin.email.trim().to_lowercase(),
                password_hash,
                full_name: admin.full_name.trim().to_string(),
                role: Role::Admin,
                status: UserStatus::Active,
            },
            Utc::now(),
        )
        .await
        .context("failed to create primary administrator")?;

    if !user.id.is_primary_admin() {
        warn!(user_id = %user.id, "primary administrator did not receive id 1");
    }
    if admin.password == AdminBootstrap::default().password {
        warn!(username = %user.username, "primary administrator uses the default password; change it");
    }
    info!(username = %user.username, "primary administrator created");
    Ok(())
}

impl AppServices {
    pub async fn require_article(&self, id: ArticleId) -> ApiResult<Article> {
        self.store
            .get_article(id)
            .await?
            .ok_or_else(|| DomainError::not_found("article not found").into())
    }

    pub async fn require_user(&self, id: UserId) -> ApiResult<User> {
        self.store
            .get_user(id)
            .await?
            .ok_or_else(|| DomainError::not_found("user not found").into())
    }

    pub async fn require_report(&self, id: ReportId) -> ApiResult<Report> {
        self.store
            .get_report(id)
            .await?
            .ok_or_else(|| DomainError::not_found("report not found").into())
    }

    /// Validate, hash and insert a new account. Both creation endpoints go
    /// through here.
    pub async fn register_user(&self, payload: CreateUser, assignment: RoleAssignment) -> ApiResult<User> {
        let registration = payload.validate(assignment)?;
        self.ensure_identity_free(Some(&registration.username), Some(&registration.email), None)
            .await?;

        let password_hash =
            hash_password(&registration.password).map_err(|e| ApiError::Internal(e.to_string()))?;
        let user = self
            .store
            .insert_user(registration.into_new_user(password_hash), Utc::now())
            .await?;
        info!(user_id = %user.id, username = %user.username, role = %user.role, "user created");
        Ok(user)
    }

    /// Reject a username or email already held by another account.
    pub async fn ensure_identity_free(
        &self,
        username: Option<&str>,
        email: Option<&str>,
        owner: Option<UserId>,
    ) -> ApiResult<()> {
        let other = |u: &User| owner != Some(u.id);
        if let Some(username) = username {
            if self.store.find_user_by_username(username).await?.is_some_and(|u| other(&u)) {
                return Err(DomainError::conflict("username already exists").into());
            }
        }
        if let Some(email) = email {
            if self.store.find_user_by_email(email).await?.is_some_and(|u| other(&u)) {
                return Err(DomainError::conflict("email already exists").into());
            }
        }
        Ok(())
    }

    /// Articles keyed by id, for inlining into report listings.
    pub async fn article_index(&self) -> ApiResult<HashMap<ArticleId, Article>> {
        Ok(self
            .store
            .list_articles()
            .await?
            .into_iter()
            .map(|a| (a.id, a))
            .collect())
    }

    pub async fn user_index(&self) -> ApiResult<HashMap<UserId, User>> {
        let users = self.store.list_users(&Default::default()).await?;
        Ok(users.into_iter().map(|u| (u.id, u)).collect())
    }
}
