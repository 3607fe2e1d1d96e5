//! Issue ledger endpoints.
//!
//! Any authenticated user may file a report and read their own; triage
//! (status changes, responses, deletion, statistics) is admin-only.

use std::collections::HashMap;
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
use chrono::Utc;
use tracing::info;

use rigstock_auth::User;
use rigstock_core::{ArticleId, DomainError, ReportId, UserId};
use rigstock_infra::ReportStore;
use rigstock_inventory::Article;
use rigstock_reports::{CreateReport, Report, ReportPatch, ReportStatistics, ReportStatus};

use crate::app::dto::{
    ArticleBrief, ArticleSummary, Message, ReportCreated, ReportListQuery, ReportUpdated,
    ReportView, ReporterSummary,
};
use crate::app::errors::{ApiError, ApiResult};
use crate::app::services::AppServices;
use crate::context::CurrentUser;
use crate::middleware::{require_admin, require_token, AuthState};

pub fn router(auth_state: &AuthState) -> Router {
    let operator = Router::new()
        .route("/api/reports", get(list_reports).post(create_report))
        .route("/api/reports/", get(list_reports).post(create_report))
        .route("/api/reports/my-reports", get(my_reports));

    let admin = Router::new()
        .route("/api/reports/all", get(all_reports))
        .route("/api/reports/statistics", get(statistics))
        .route("/api/reports/:id", put(update_report).delete(delete_report))
        .route_layer(from_fn(require_admin));

    operator
        .merge(admin)
        .route_layer(from_fn_with_state(auth_state.clone(), require_token))
}

fn parse_id(raw: &str) -> ApiResult<ReportId> {
    raw.parse().map_err(|_| ApiError::invalid_id("report"))
}

/// Administrators see the whole ledger, everyone else their own reports.
pub async fn list_reports(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(current): Extension<CurrentUser>,
) -> ApiResult<Response> {
    if current.is_admin() {
        let reports = services.store.list_reports(None).await?;
        admin_listing(&services, reports).await
    } else {
        own_listing(&services, current.user_id()).await
    }
}

pub async fn my_reports(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(current): Extension<CurrentUser>,
) -> ApiResult<Response> {
    own_listing(&services, current.user_id()).await
}

pub async fn all_reports(
    Extension(services): Extension<Arc<AppServices>>,
    query: Result<Query<ReportListQuery>, QueryRejection>,
) -> ApiResult<Response> {
    let Query(params) = query?;
    let status = params
        .status
        .as_deref()
        .filter(|s| !s.is_empty())
        .map(str::parse::<ReportStatus>)
        .transpose()?;
    let reports = services.store.list_reports(status).await?;
    admin_listing(&services, reports).await
}

pub async fn create_report(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(current): Extension<CurrentUser>,
    body: Result<Json<CreateReport>, JsonRejection>,
) -> ApiResult<Response> {
    let Json(body) = body?;
    let new = body.validate(current.user_id())?;
    services.require_article(new.article_id).await?;

    let report = services.store.insert_report(new, Utc::now()).await?;
    info!(
        report_id = %report.id,
        article_id = %report.article_id,
        user_id = %report.user_id,
        report_type = report.report_type.as_str(),
        "report filed"
    );
    Ok((StatusCode::CREATED, Json(ReportCreated::from(&report))).into_response())
}

pub async fn update_report(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    body: Result<Json<ReportPatch>, JsonRejection>,
) -> ApiResult<Response> {
    let id = parse_id(&id)?;
    let Json(patch) = body?;
    let current = services.require_report(id).await?;

    let next = patch.apply(&current, Utc::now())?;
    if !services.store.update_report(&next).await? {
        return Err(DomainError::not_found("report not found").into());
    }
    info!(report_id = %id, status = next.status.as_str(), "report updated");
    Ok(Json(ReportUpdated::from(&next)).into_response())
}

pub async fn delete_report(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> ApiResult<Response> {
    let id = parse_id(&id)?;
    services.require_report(id).await?;
    services.store.delete_report(id).await?;
    info!(report_id = %id, "report deleted");
    Ok(Json(Message::new("report deleted")).into_response())
}

pub async fn statistics(Extension(services): Extension<Arc<AppServices>>) -> ApiResult<Response> {
    let groups = services.store.report_groups().await?;
    Ok(Json(ReportStatistics::from_groups(groups)).into_response())
}

async fn own_listing(services: &AppServices, user_id: UserId) -> ApiResult<Response> {
    let reports = services.store.list_reports_by_user(user_id).await?;
    let articles = services.article_index().await?;
    let views: Vec<ReportView<ArticleBrief>> = reports
        .into_iter()
        .map(|r| {
            let article = articles.get(&r.article_id).map(ArticleBrief::from);
            ReportView::new(r, article, None)
        })
        .collect();
    Ok(Json(views).into_response())
}

async fn admin_listing(services: &AppServices, reports: Vec<Report>) -> ApiResult<Response> {
    let articles: HashMap<ArticleId, Article> = services.article_index().await?;
    let users: HashMap<UserId, User> = services.user_index().await?;
    let views: Vec<ReportView<ArticleSummary>> = reports
        .into_iter()
        .map(|r| {
            let article = articles.get(&r.article_id).map(ArticleSummary::from);
            let reporter = users.get(&r.user_id).map(ReporterSummary::from);
            ReportView::new(r, article, reporter)
        })
        .collect();
    Ok(Json(views).into_response())
}
