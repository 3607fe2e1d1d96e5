//! User directory. Every route is admin-only.

use std::sync::Arc;

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Extension, Path, Query,
    },
    http::StatusCode,
    middleware::{from_fn, from_fn_with_state},
    response::{IntoResponse, Response},
    routing::{get, put},
    Json, Router,
};
use tracing::info;

use rigstock_auth::password::hash_password;
use rigstock_auth::{admin_policy, CreateUser, RoleAssignment, UserPatch, UserStatus};
use rigstock_core::{DomainError, UserId};
use rigstock_infra::{UserFilter, UserStore};

use crate::app::dto::{UserList, UserListQuery, UserResponse, UserView};
use crate::app::errors::{ApiError, ApiResult};
use crate::app::services::AppServices;
use crate::middleware::{require_admin, require_token, AuthState};

pub fn router(auth_state: &AuthState) -> Router {
    Router::new()
        .route("/api/users", get(list_users).post(create_user))
        .route("/api/users/", get(list_users).post(create_user))
        .route("/api/users/:id", get(get_user).put(update_user).delete(deactivate_user))
        .route("/api/users/:id/activate", put(activate_user))
        .route_layer(from_fn(require_admin))
        .route_layer(from_fn_with_state(auth_state.clone(), require_token))
}

fn parse_id(raw: &str) -> ApiResult<UserId> {
    raw.parse().map_err(|_| ApiError::invalid_id("user"))
}

pub async fn list_users(
    Extension(services): Extension<Arc<AppServices>>,
    query: Result<Query<UserListQuery>, QueryRejection>,
) -> ApiResult<Response> {
    let Query(params) = query?;
    let filter = UserFilter {
        search: params.search.filter(|s| !s.trim().is_empty()),
        role: params.role.as_deref().filter(|r| !r.is_empty()).map(str::parse).transpose()?,
        status: params.status.as_deref().filter(|s| !s.is_empty()).map(str::parse).transpose()?,
    };

    let users: Vec<UserView> = services
        .store
        .list_users(&filter)
        .await?
        .iter()
        .map(UserView::from)
        .collect();
    Ok(Json(UserList {
        total: users.len(),
        users,
    })
    .into_response())
}

pub async fn get_user(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> ApiResult<Response> {
    let user = services.require_user(parse_id(&id)?).await?;
    Ok(Json(UserView::from(&user)).into_response())
}

/// Operator account creation; the role is always USER.
pub async fn create_user(
    Extension(services): Extension<Arc<AppServices>>,
    body: Result<Json<CreateUser>, JsonRejection>,
) -> ApiResult<Response> {
    let Json(body) = body?;
    let user = services.register_user(body, RoleAssignment::PinnedUser).await?;
    Ok((StatusCode::CREATED, Json(UserResponse::new("user created", &user))).into_response())
}

pub async fn update_user(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    body: Result<Json<UserPatch>, JsonRejection>,
) -> ApiResult<Response> {
    let id = parse_id(&id)?;
    let Json(patch) = body?;
    let current = services.require_user(id).await?;

    let mut update = patch.apply(&current)?;
    services
        .ensure_identity_free(
            update.username_changed.then_some(update.user.username.as_str()),
            update.email_changed.then_some(update.user.email.as_str()),
            Some(id),
        )
        .await?;

    if let Some(password) = update.new_password.take() {
        update.user.password_hash =
            hash_password(&password).map_err(|e| ApiError::Internal(e.to_string()))?;
    }

    if !services.store.update_user(&update.user).await? {
        return Err(DomainError::not_found("user not found").into());
    }
    info!(user_id = %id, "user updated");
    Ok(Json(UserResponse::new("user updated", &update.user)).into_response())
}

/// Logical delete: the account stays but can no longer log in.
pub async fn deactivate_user(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> ApiResult<Response> {
    let id = parse_id(&id)?;
    let mut user = services.require_user(id).await?;
    admin_policy::ensure_deactivatable(&user)?;

    user.status = UserStatus::Inactive;
    set_status(&services, &user).await?;
    info!(user_id = %id, "user deactivated");
    Ok(Json(UserResponse::new("user deactivated", &user)).into_response())
}

pub async fn activate_user(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> ApiResult<Response> {
    let id = parse_id(&id)?;
    let mut user = services.require_user(id).await?;

    user.status = UserStatus::Active;
    set_status(&services, &user).await?;
    info!(user_id = %id, "user activated");
    Ok(Json(UserResponse::new("user activated", &user)).into_response())
}

async fn set_status(services: &AppServices, user: &rigstock_auth::User) -> ApiResult<()> {
    if services.store.update_user(user).await? {
        Ok(())
    } else {
        Err(DomainError::not_found("user not found").into())
    }
}
