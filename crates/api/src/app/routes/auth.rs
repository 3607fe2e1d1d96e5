//! Login, token verification and privileged account creation.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Extension},
    http::StatusCode,
    middleware::{from_fn, from_fn_with_state},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;

use rigstock_auth::{CreateUser, RoleAssignment};
use rigstock_core::DomainError;
use rigstock_infra::UserStore;

use crate::app::dto::{LoginRequest, LoginResponse, UserResponse, UserView, VerifyResponse};
use crate::app::errors::ApiResult;
use crate::app::services::AppServices;
use crate::context::CurrentUser;
use crate::middleware::{require_admin, require_token, AuthState};

pub fn router(auth_state: &AuthState) -> Router {
    let verify = Router::new()
        .route("/api/auth/verify", get(verify))
        .route_layer(from_fn_with_state(auth_state.clone(), require_token));

    let privileged = Router::new()
        .route("/api/auth/create-user", post(create_user))
        .route_layer(from_fn(require_admin))
        .route_layer(from_fn_with_state(auth_state.clone(), require_token));

    Router::new()
        .route("/api/auth/login", post(login))
        .merge(verify)
        .merge(privileged)
}

pub async fn login(
    Extension(services): Extension<Arc<AppServices>>,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> ApiResult<Response> {
    let Json(body) = body?;
    let (Some(username), Some(password)) = (
        body.username.filter(|u| !u.is_empty()),
        body.password.filter(|p| !p.is_empty()),
    ) else {
        return Err(DomainError::validation("username and password are required").into());
    };

    let now = Utc::now();
    let store = services.store.clone();
    let session = services
        .authenticator
        .authenticate(&username, &password, now, move |name| async move {
            store.find_user_by_username(&name).await
        })
        .await?;

    services.store.touch_last_login(session.user.id, now).await?;
    let mut user = session.user;
    user.last_login = Some(now);

    Ok(Json(LoginResponse {
        message: "login successful",
        token: session.token,
        user: UserView::from(&user),
    })
    .into_response())
}

pub async fn verify(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(current): Extension<CurrentUser>,
) -> ApiResult<Response> {
    let user = services.require_user(current.user_id()).await?;
    Ok(Json(VerifyResponse {
        valid: true,
        user: UserView::from(&user),
    })
    .into_response())
}

/// Account creation with a caller-chosen role (never ADMIN).
pub async fn create_user(
    Extension(services): Extension<Arc<AppServices>>,
    body: Result<Json<CreateUser>, JsonRejection>,
) -> ApiResult<Response> {
    let Json(body) = body?;
    let user = services.register_user(body, RoleAssignment::CallerAssigned).await?;
    Ok((StatusCode::CREATED, Json(UserResponse::new("user created", &user))).into_response())
}
