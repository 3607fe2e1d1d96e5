//! Liveness and readiness probes.
//!
//! These never fail with an `ApiError`: store problems are reported in the
//! body with a 500/503 status so monitors can read the reason.

use std::sync::Arc;

use axum::{
    extract::Extension,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::{Duration, Utc};
use serde_json::json;
use tracing::warn;

use rigstock_infra::{ArticleStore, ReportStore, StoreHealth, StoreResult, UserStore};

use crate::app::services::AppServices;

pub const SERVICE_NAME: &str = "rigstock-api";

pub fn router() -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/health/", get(health))
        .route("/api/health/db", get(database))
        .route("/api/health/detailed", get(detailed))
}

pub async fn health() -> Response {
    Json(json!({
        "status": "OK",
        "message": "service is running",
        "service": SERVICE_NAME,
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": Utc::now(),
    }))
    .into_response()
}

struct Counts {
    articles: u64,
    users: u64,
    reports: u64,
    active_users: u64,
}

async fn counts(services: &AppServices) -> StoreResult<Counts> {
    let store = &services.store;
    Ok(Counts {
        articles: store.count_articles().await?,
        users: store.count_users().await?,
        reports: store.count_reports().await?,
        active_users: store.count_active_users().await?,
    })
}

pub async fn database(Extension(services): Extension<Arc<AppServices>>) -> Response {
    let backend = services.store.backend();
    let probe = match services.store.ping().await {
        Ok(()) => counts(&services).await,
        Err(e) => Err(e),
    };

    match probe {
        Ok(c) => (
            StatusCode::OK,
            Json(json!({
                "status": "OK",
                "database": backend,
                "message": "database connection is working",
                "statistics": {
                    "total_articles": c.articles,
                    "total_users": c.users,
                    "total_reports": c.reports,
                    "active_users": c.active_users,
                },
                "timestamp": Utc::now(),
            })),
        )
            .into_response(),
        Err(e) => {
            warn!(error = %e, "database health check failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "status": "ERROR",
                    "database": backend,
                    "message": format!("database connection error: {e}"),
                    "timestamp": Utc::now(),
                })),
            )
                .into_response()
        }
    }
}

pub async fn detailed(Extension(services): Extension<Arc<AppServices>>) -> Response {
    let now = Utc::now();
    let (connected, message) = match services.store.ping().await {
        Ok(()) => (true, "connected".to_string()),
        Err(e) => {
            warn!(error = %e, "store ping failed");
            (false, e.to_string())
        }
    };

    let entities = if connected {
        let recent = services.store.count_reports_since(now - Duration::hours(24)).await;
        match (counts(&services).await, recent) {
            (Ok(c), Ok(recent)) => Some(json!({
                "articles": c.articles,
                "users": c.users,
                "reports": c.reports,
                "recent_activity_24h": recent,
            })),
            (Err(e), _) | (_, Err(e)) => {
                warn!(error = %e, "entity counts unavailable");
                None
            }
        }
    } else {
        None
    };

    let health_status = match (connected, entities.is_some()) {
        (true, true) => "HEALTHY",
        (false, _) => "UNHEALTHY",
        (true, false) => "DEGRADED",
    };
    let status = if health_status == "HEALTHY" {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(json!({
            "status": health_status,
            "health_status": health_status,
            "service": SERVICE_NAME,
            "version": env!("CARGO_PKG_VERSION"),
            "environment": services.environment,
            "database": {
                "backend": services.store.backend(),
                "connected": connected,
                "message": message,
            },
            "entities": entities,
            "timestamp": now,
        })),
    )
        .into_response()
}
