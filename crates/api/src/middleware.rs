//! Request gates.
//!
//! `require_token` verifies the bearer token and attaches a
//! [`CurrentUser`]; `require_admin` must be layered inside it and checks the
//! role carried by the token. Both short-circuit before the handler runs.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use chrono::Utc;
use tracing::debug;

use rigstock_auth::{require_admin as admin_gate, TokenVerifier};
use rigstock_infra::{Store, UserStore};

use crate::app::errors::ApiError;
use crate::context::CurrentUser;

#[derive(Clone)]
pub struct AuthState {
    pub tokens: Arc<dyn TokenVerifier>,
    pub store: Arc<dyn Store>,
}

pub async fn require_token(
    State(state): State<AuthState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_bearer(req.headers()).ok_or_else(|| {
        debug!("missing or malformed authorization header");
        ApiError::unauthorized()
    })?;

    let claims = state.tokens.verify(token, Utc::now()).map_err(|e| {
        debug!(error = %e, "token rejected");
        ApiError::unauthorized()
    })?;

    // Tokens outlive accounts; a token for an unknown id is as good as forged.
    if state.store.get_user(claims.user_id).await?.is_none() {
        debug!(user_id = %claims.user_id, "token refers to unknown user");
        return Err(ApiError::unauthorized());
    }

    req.extensions_mut().insert(CurrentUser::new(claims));
    Ok(next.run(req).await)
}

pub async fn require_admin(req: Request, next: Next) -> Result<Response, ApiError> {
    let current = req
        .extensions()
        .get::<CurrentUser>()
        .ok_or_else(ApiError::unauthorized)?;

    admin_gate(current.claims()).map_err(|e| {
        debug!(username = current.username(), error = %e, "admin gate refused");
        ApiError::from(e)
    })?;

    Ok(next.run(req).await)
}

pub(crate) fn extract_bearer(headers: &HeaderMap) -> Option<&str> {
    let header = headers.get(axum::http::header::AUTHORIZATION)?;
    let header = header.to_str().ok()?;
    let token = header.strip_prefix("Bearer ")?.trim();
    if token.is_empty() {
        return None;
    }
    Some(token)
}

#[cfg(test)]
mod tests {
    use axum::http::{header::AUTHORIZATION, HeaderValue};

    use super::*;

    fn headers(value: &str) -> HeaderMap {
        let mut h = HeaderMap::new();
        h.insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        h
    }

    #[test]
    fn bearer_token_is_extracted() {
        assert_eq!(extract_bearer(&headers("Bearer abc.def")), Some("abc.def"));
        assert_eq!(extract_bearer(&headers("Bearer   abc  ")), Some("abc"));
    }

    #[test]
    fn malformed_headers_are_rejected() {
        assert_eq!(extract_bearer(&HeaderMap::new()), None);
        assert_eq!(extract_bearer(&headers("Basic abc")), None);
        assert_eq!(extract_bearer(&headers("Bearer ")), None);
        assert_eq!(extract_bearer(&headers("abc")), None);
    }
}
