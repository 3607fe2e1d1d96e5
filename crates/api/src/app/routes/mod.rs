use axum::Router;

use crate::middleware::AuthState;

pub mod articles;
pub mod auth;
pub mod health;
pub mod reports;
pub mod users;

/// Every `/api` endpoint. Each resource router applies its own gates.
pub fn router(auth_state: &AuthState) -> Router {
    Router::new()
        .merge(articles::router())
        .merge(auth::router(auth_state))
        .merge(users::router(auth_state))
        .merge(reports::router(auth_state))
        .merge(health::router())
}
