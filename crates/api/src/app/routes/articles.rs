//! Equipment catalog endpoints. Open to anonymous callers.

use std::sync::Arc;

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Extension, Path, Query,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::Utc;
use tracing::info;

use rigstock_core::{normalize, ArticleId, DomainError};
use rigstock_infra::ArticleStore;
use rigstock_inventory::{
    similar_tool_error, Article, ArticlePatch, CreateArticle, SuggestionField, MAX_SUGGESTIONS,
    MIN_SUGGESTION_QUERY,
};

use crate::app::dto::{CodeCheck, Message, SuggestionsQuery};
use crate::app::errors::{ApiError, ApiResult};
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new()
        .route("/api/articles", get(list_articles).post(create_article))
        .route("/api/articles/", get(list_articles).post(create_article))
        .route("/api/articles/suggestions", get(suggestions))
        .route("/api/articles/check-code/:code", get(check_code))
        .route(
            "/api/articles/:id",
            get(get_article).put(update_article).delete(delete_article),
        )
}

fn parse_id(raw: &str) -> ApiResult<ArticleId> {
    raw.parse().map_err(|_| ApiError::invalid_id("article"))
}

pub async fn list_articles(Extension(services): Extension<Arc<AppServices>>) -> ApiResult<Response> {
    let articles = services.store.list_articles().await?;
    Ok(Json(articles).into_response())
}

pub async fn get_article(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> ApiResult<Response> {
    let article = services.require_article(parse_id(&id)?).await?;
    Ok(Json(article).into_response())
}

pub async fn create_article(
    Extension(services): Extension<Arc<AppServices>>,
    body: Result<Json<CreateArticle>, JsonRejection>,
) -> ApiResult<Response> {
    let Json(body) = body?;
    let new = body.validate()?;

    if services.store.find_article_by_code(&new.code).await?.is_some() {
        return Err(code_taken(&new.code).into());
    }
    if new.is_tool() {
        if let Some(existing) = services.store.find_article_by_name(&new.name, None).await? {
            return Err(similar_tool_error(&existing).into());
        }
    }

    let article = services.store.insert_article(new, Utc::now()).await?;
    info!(article_id = %article.id, code = %article.code, "article created");
    Ok((StatusCode::CREATED, Json(article)).into_response())
}

pub async fn update_article(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    body: Result<Json<ArticlePatch>, JsonRejection>,
) -> ApiResult<Response> {
    let id = parse_id(&id)?;
    let Json(patch) = body?;
    let current = services.require_article(id).await?;

    let recheck_tool_name = patch.touches_tool_identity();
    let next = patch.apply(&current, Utc::now())?;

    if next.code != current.code {
        let holder = services.store.find_article_by_code(&next.code).await?;
        if holder.is_some_and(|a| a.id != id) {
            return Err(code_taken(&next.code).into());
        }
    }
    if recheck_tool_name && next.is_tool() {
        if let Some(existing) = services.store.find_article_by_name(&next.name, Some(id)).await? {
            return Err(similar_tool_error(&existing).into());
        }
    }

    if !services.store.update_article(&next).await? {
        return Err(DomainError::not_found("article not found").into());
    }
    info!(article_id = %id, "article updated");
    Ok(Json(next).into_response())
}

pub async fn delete_article(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> ApiResult<Response> {
    let id = parse_id(&id)?;
    let article: Article = services.require_article(id).await?;
    services.store.delete_article(id).await?;
    info!(article_id = %id, code = %article.code, "article deleted");
    Ok(Json(Message::new("article deleted")).into_response())
}

/// Distinct values of one column for autocomplete. Short queries yield `[]`.
pub async fn suggestions(
    Extension(services): Extension<Arc<AppServices>>,
    query: Result<Query<SuggestionsQuery>, QueryRejection>,
) -> ApiResult<Response> {
    let Query(params) = query?;
    let needle = params.query.as_deref().map(str::trim).unwrap_or_default();
    if needle.chars().count() < MIN_SUGGESTION_QUERY {
        return Ok(Json(Vec::<String>::new()).into_response());
    }

    let field = match params.field.as_deref() {
        None | Some("") => SuggestionField::default(),
        Some(raw) => raw.parse::<SuggestionField>()?,
    };
    let values = services.store.suggest(field, needle, MAX_SUGGESTIONS).await?;
    Ok(Json(values).into_response())
}

pub async fn check_code(
    Extension(services): Extension<Arc<AppServices>>,
    Path(code): Path<String>,
) -> ApiResult<Response> {
    let code = normalize::upper(&code);
    let exists = services.store.find_article_by_code(&code).await?.is_some();
    Ok(Json(CodeCheck { exists }).into_response())
}

fn code_taken(code: &str) -> DomainError {
    DomainError::conflict(format!("an article with code {code} already exists"))
}
