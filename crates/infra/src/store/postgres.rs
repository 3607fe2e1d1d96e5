//! Postgres-backed store.
//!
//! Queries are runtime-checked (`sqlx::query` + `bind`) so the crate builds
//! without a live database. The schema in `migrations/0001_schema.sql` is
//! idempotent and applied by [`PostgresStore::migrate`] at startup.
//!
//! ## Atomicity
//!
//! Every write is a single statement except the article delete, which
//! removes dependent reports and the article inside one transaction.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgRow};
use sqlx::{Postgres, Row};
use tracing::{info, instrument};

use rigstock_auth::{NewUser, User};
use rigstock_core::{ArticleId, ReportId, UserId};
use rigstock_inventory::{Article, NewArticle, SuggestionField};
use rigstock_reports::{NewReport, Report, ReportStatus, ReportType};

use super::{ArticleStore, ReportStore, StoreHealth, UserFilter, UserStore};
use crate::error::map_sqlx_error;
use crate::{StoreError, StoreResult};

const SCHEMA: &str = include_str!("../../migrations/0001_schema.sql");

macro_rules! select_articles {
    ($tail:literal) => {
        concat!(
            "SELECT id, code, name, description, tipo, category, unit, stock_min, stock_current, ",
            "location, status, acquisition_date, observations, created_at, updated_at ",
            "FROM articles ",
            $tail
        )
    };
}

macro_rules! select_users {
    ($tail:literal) => {
        concat!(
            "SELECT id, username, email, password_hash, full_name, role, status, last_login, created_at ",
            "FROM users ",
            $tail
        )
    };
}

macro_rules! select_reports {
    ($tail:literal) => {
        concat!(
            "SELECT id, article_id, user_id, report_type, message, status, admin_response, created_at, updated_at ",
            "FROM reports ",
            $tail
        )
    };
}

#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: Arc<PgPool>,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool: Arc::new(pool) }
    }

    pub async fn connect(database_url: &str) -> StoreResult<Self> {
        let pool = PgPool::connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        Ok(Self::new(pool))
    }

    /// Create tables and indexes if they do not exist yet.
    pub async fn migrate(&self) -> StoreResult<()> {
        sqlx::raw_sql(SCHEMA)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("migrate", e))?;
        info!("database schema is up to date");
        Ok(())
    }

    async fn count(&self, operation: &'static str, sql: &'static str) -> StoreResult<u64> {
        let n: i64 = sqlx::query_scalar(sql)
            .fetch_one(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error(operation, e))?;
        Ok(n.max(0) as u64)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Row mapping
// ─────────────────────────────────────────────────────────────────────────────

fn col<'r, T>(row: &'r PgRow, table: &'static str, name: &str) -> StoreResult<T>
where
    T: sqlx::Decode<'r, Postgres> + sqlx::Type<Postgres>,
{
    row.try_get(name).map_err(|e| StoreError::corrupt(table, e))
}

fn parsed<T>(row: &PgRow, table: &'static str, name: &str) -> StoreResult<T>
where
    T: core::str::FromStr,
    T::Err: ToString,
{
    let raw: String = col(row, table, name)?;
    raw.parse().map_err(|e: T::Err| StoreError::corrupt(table, e.to_string()))
}

fn article_from_row(row: &PgRow) -> StoreResult<Article> {
    const T: &str = "articles";
    Ok(Article {
        id: ArticleId::new(col(row, T, "id")?),
        code: col(row, T, "code")?,
        name: col(row, T, "name")?,
        description: col(row, T, "description")?,
        tipo: col(row, T, "tipo")?,
        category: col(row, T, "category")?,
        unit: col(row, T, "unit")?,
        stock_min: col(row, T, "stock_min")?,
        stock_current: col(row, T, "stock_current")?,
        location: col(row, T, "location")?,
        status: col(row, T, "status")?,
        acquisition_date: col(row, T, "acquisition_date")?,
        observations: col(row, T, "observations")?,
        created_at: col(row, T, "created_at")?,
        updated_at: col(row, T, "updated_at")?,
    })
}

fn user_from_row(row: &PgRow) -> StoreResult<User> {
    const T: &str = "users";
    Ok(User {
        id: UserId::new(col(row, T, "id")?),
        username: col(row, T, "username")?,
        email: col(row, T, "email")?,
        password_hash: col(row, T, "password_hash")?,
        full_name: col(row, T, "full_name")?,
        role: parsed(row, T, "role")?,
        status: parsed(row, T, "status")?,
        last_login: col(row, T, "last_login")?,
        created_at: col(row, T, "created_at")?,
    })
}

fn report_from_row(row: &PgRow) -> StoreResult<Report> {
    const T: &str = "reports";
    Ok(Report {
        id: ReportId::new(col(row, T, "id")?),
        article_id: ArticleId::new(col(row, T, "article_id")?),
        user_id: UserId::new(col(row, T, "user_id")?),
        report_type: parsed(row, T, "report_type")?,
        message: col(row, T, "message")?,
        status: parsed(row, T, "status")?,
        admin_response: col(row, T, "admin_response")?,
        created_at: col(row, T, "created_at")?,
        updated_at: col(row, T, "updated_at")?,
    })
}

fn collect<T>(rows: Vec<PgRow>, map: fn(&PgRow) -> StoreResult<T>) -> StoreResult<Vec<T>> {
    rows.iter().map(map).collect()
}

/// `%query%` with LIKE metacharacters escaped.
fn contains_pattern(query: &str) -> String {
    let mut out = String::with_capacity(query.len() + 2);
    out.push('%');
    for c in query.chars() {
        if matches!(c, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('%');
    out
}

// ─────────────────────────────────────────────────────────────────────────────
// Articles
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait]
impl ArticleStore for PostgresStore {
    #[instrument(skip(self), err)]
    async fn list_articles(&self) -> StoreResult<Vec<Article>> {
        let rows = sqlx::query(select_articles!("ORDER BY id ASC"))
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_articles", e))?;
        collect(rows, article_from_row)
    }

    async fn get_article(&self, id: ArticleId) -> StoreResult<Option<Article>> {
        sqlx::query(select_articles!("WHERE id = $1"))
            .bind(id.get())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_article", e))?
            .as_ref()
            .map(article_from_row)
            .transpose()
    }

    async fn find_article_by_code(&self, code: &str) -> StoreResult<Option<Article>> {
        sqlx::query(select_articles!("WHERE code = $1"))
            .bind(code)
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("find_article_by_code", e))?
            .as_ref()
            .map(article_from_row)
            .transpose()
    }

    async fn find_article_by_name(
        &self,
        name: &str,
        exclude: Option<ArticleId>,
    ) -> StoreResult<Option<Article>> {
        sqlx::query(select_articles!(
            "WHERE LOWER(name) = LOWER($1) AND ($2::BIGINT IS NULL OR id <> $2) ORDER BY id LIMIT 1"
        ))
        .bind(name)
        .bind(exclude.map(|id| id.get()))
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("find_article_by_name", e))?
        .as_ref()
        .map(article_from_row)
        .transpose()
    }

    #[instrument(skip(self, new), fields(code = %new.code), err)]
    async fn insert_article(&self, new: NewArticle, now: DateTime<Utc>) -> StoreResult<Article> {
        let row = sqlx::query(concat!(
            "INSERT INTO articles (code, name, description, tipo, category, unit, stock_min, ",
            "stock_current, location, status, acquisition_date, observations, created_at, updated_at) ",
            "VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $13) ",
            "RETURNING id, code, name, description, tipo, category, unit, stock_min, stock_current, ",
            "location, status, acquisition_date, observations, created_at, updated_at"
        ))
        .bind(&new.code)
        .bind(&new.name)
        .bind(&new.description)
        .bind(&new.tipo)
        .bind(&new.category)
        .bind(&new.unit)
        .bind(new.stock_min)
        .bind(new.stock_current)
        .bind(&new.location)
        .bind(&new.status)
        .bind(new.acquisition_date)
        .bind(&new.observations)
        .bind(now)
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_article", e))?;
        article_from_row(&row)
    }

    #[instrument(skip(self, article), fields(article_id = %article.id), err)]
    async fn update_article(&self, article: &Article) -> StoreResult<bool> {
        let result = sqlx::query(concat!(
            "UPDATE articles SET code = $2, name = $3, description = $4, tipo = $5, category = $6, ",
            "unit = $7, stock_min = $8, stock_current = $9, location = $10, status = $11, ",
            "acquisition_date = $12, observations = $13, updated_at = $14 ",
            "WHERE id = $1"
        ))
        .bind(article.id.get())
        .bind(&article.code)
        .bind(&article.name)
        .bind(&article.description)
        .bind(&article.tipo)
        .bind(&article.category)
        .bind(&article.unit)
        .bind(article.stock_min)
        .bind(article.stock_current)
        .bind(&article.location)
        .bind(&article.status)
        .bind(article.acquisition_date)
        .bind(&article.observations)
        .bind(article.updated_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("update_article", e))?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self), err)]
    async fn delete_article(&self, id: ArticleId) -> StoreResult<bool> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        sqlx::query("DELETE FROM reports WHERE article_id = $1")
            .bind(id.get())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("delete_article_reports", e))?;

        let deleted = sqlx::query("DELETE FROM articles WHERE id = $1")
            .bind(id.get())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("delete_article", e))?
            .rows_affected();

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;
        Ok(deleted > 0)
    }

    async fn suggest(&self, field: SuggestionField, query: &str, limit: usize) -> StoreResult<Vec<String>> {
        // `field` comes from a closed enum, so interpolating the column is safe.
        let column = field.as_str();
        let sql = format!(
            "SELECT DISTINCT {column} AS value FROM articles \
             WHERE {column} IS NOT NULL AND {column} <> '' AND {column} ILIKE $1 \
             ORDER BY value LIMIT $2"
        );
        let values: Vec<String> = sqlx::query_scalar(&sql)
            .bind(contains_pattern(query))
            .bind(limit as i64)
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("suggest", e))?;
        Ok(values)
    }

    async fn count_articles(&self) -> StoreResult<u64> {
        self.count("count_articles", "SELECT COUNT(*) FROM articles").await
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Users
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait]
impl UserStore for PostgresStore {
    #[instrument(skip(self), err)]
    async fn list_users(&self, filter: &UserFilter) -> StoreResult<Vec<User>> {
        let search = filter
            .search
            .as_deref()
            .filter(|s| !s.is_empty())
            .map(contains_pattern);
        let rows = sqlx::query(select_users!(
            "WHERE ($1::TEXT IS NULL OR username ILIKE $1 OR full_name ILIKE $1 OR email ILIKE $1) \
             AND ($2::TEXT IS NULL OR role = $2) \
             AND ($3::TEXT IS NULL OR status = $3) \
             ORDER BY created_at DESC, id DESC"
        ))
        .bind(search)
        .bind(filter.role.map(|r| r.as_str()))
        .bind(filter.status.map(|s| s.as_str()))
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_users", e))?;
        collect(rows, user_from_row)
    }

    async fn get_user(&self, id: UserId) -> StoreResult<Option<User>> {
        sqlx::query(select_users!("WHERE id = $1"))
            .bind(id.get())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_user", e))?
            .as_ref()
            .map(user_from_row)
            .transpose()
    }

    async fn find_user_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        sqlx::query(select_users!("WHERE username = $1"))
            .bind(username)
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("find_user_by_username", e))?
            .as_ref()
            .map(user_from_row)
            .transpose()
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        sqlx::query(select_users!("WHERE email = $1"))
            .bind(email)
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("find_user_by_email", e))?
            .as_ref()
            .map(user_from_row)
            .transpose()
    }

    #[instrument(skip(self, new), fields(username = %new.username), err)]
    async fn insert_user(&self, new: NewUser, now: DateTime<Utc>) -> StoreResult<User> {
        let row = sqlx::query(concat!(
            "INSERT INTO users (username, email, password_hash, full_name, role, status, created_at) ",
            "VALUES ($1, $2, $3, $4, $5, $6, $7) ",
            "RETURNING id, username, email, password_hash, full_name, role, status, last_login, created_at"
        ))
        .bind(&new.username)
        .bind(&new.email)
        .bind(&new.password_hash)
        .bind(&new.full_name)
        .bind(new.role.as_str())
        .bind(new.status.as_str())
        .bind(now)
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_user", e))?;
        user_from_row(&row)
    }

    #[instrument(skip(self, user), fields(user_id = %user.id), err)]
    async fn update_user(&self, user: &User) -> StoreResult<bool> {
        let result = sqlx::query(concat!(
            "UPDATE users SET username = $2, email = $3, password_hash = $4, full_name = $5, ",
            "role = $6, status = $7 ",
            "WHERE id = $1"
        ))
        .bind(user.id.get())
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.full_name)
        .bind(user.role.as_str())
        .bind(user.status.as_str())
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("update_user", e))?;
        Ok(result.rows_affected() > 0)
    }

    async fn touch_last_login(&self, id: UserId, at: DateTime<Utc>) -> StoreResult<()> {
        sqlx::query("UPDATE users SET last_login = $2 WHERE id = $1")
            .bind(id.get())
            .bind(at)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("touch_last_login", e))?;
        Ok(())
    }

    async fn count_users(&self) -> StoreResult<u64> {
        self.count("count_users", "SELECT COUNT(*) FROM users").await
    }

    async fn count_active_users(&self) -> StoreResult<u64> {
        self.count(
            "count_active_users",
            "SELECT COUNT(*) FROM users WHERE status = 'ACTIVO'",
        )
        .await
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Reports
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait]
impl ReportStore for PostgresStore {
    #[instrument(skip(self), err)]
    async fn list_reports(&self, status: Option<ReportStatus>) -> StoreResult<Vec<Report>> {
        let rows = sqlx::query(select_reports!(
            "WHERE ($1::TEXT IS NULL OR status = $1) ORDER BY created_at DESC, id DESC"
        ))
        .bind(status.map(|s| s.as_str()))
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_reports", e))?;
        collect(rows, report_from_row)
    }

    async fn list_reports_by_user(&self, user_id: UserId) -> StoreResult<Vec<Report>> {
        let rows = sqlx::query(select_reports!(
            "WHERE user_id = $1 ORDER BY created_at DESC, id DESC"
        ))
        .bind(user_id.get())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_reports_by_user", e))?;
        collect(rows, report_from_row)
    }

    async fn get_report(&self, id: ReportId) -> StoreResult<Option<Report>> {
        sqlx::query(select_reports!("WHERE id = $1"))
            .bind(id.get())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_report", e))?
            .as_ref()
            .map(report_from_row)
            .transpose()
    }

    #[instrument(skip(self, new), fields(article_id = %new.article_id, user_id = %new.user_id), err)]
    async fn insert_report(&self, new: NewReport, now: DateTime<Utc>) -> StoreResult<Report> {
        let row = sqlx::query(concat!(
            "INSERT INTO reports (article_id, user_id, report_type, message, status, created_at) ",
            "VALUES ($1, $2, $3, $4, $5, $6) ",
            "RETURNING id, article_id, user_id, report_type, message, status, admin_response, created_at, updated_at"
        ))
        .bind(new.article_id.get())
        .bind(new.user_id.get())
        .bind(new.report_type.as_str())
        .bind(&new.message)
        .bind(new.status.as_str())
        .bind(now)
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_report", e))?;
        report_from_row(&row)
    }

    #[instrument(skip(self, report), fields(report_id = %report.id), err)]
    async fn update_report(&self, report: &Report) -> StoreResult<bool> {
        let result = sqlx::query(
            "UPDATE reports SET status = $2, admin_response = $3, updated_at = $4 WHERE id = $1",
        )
        .bind(report.id.get())
        .bind(report.status.as_str())
        .bind(&report.admin_response)
        .bind(report.updated_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("update_report", e))?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_report(&self, id: ReportId) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM reports WHERE id = $1")
            .bind(id.get())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_report", e))?;
        Ok(result.rows_affected() > 0)
    }

    async fn count_reports(&self) -> StoreResult<u64> {
        self.count("count_reports", "SELECT COUNT(*) FROM reports").await
    }

    async fn count_reports_since(&self, since: DateTime<Utc>) -> StoreResult<u64> {
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM reports WHERE created_at >= $1")
            .bind(since)
            .fetch_one(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("count_reports_since", e))?;
        Ok(n.max(0) as u64)
    }

    async fn report_groups(&self) -> StoreResult<Vec<(ReportStatus, ReportType, u64)>> {
        let rows = sqlx::query(
            "SELECT status, report_type, COUNT(*) AS n FROM reports GROUP BY status, report_type",
        )
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("report_groups", e))?;

        rows.iter()
            .map(|row| -> StoreResult<(ReportStatus, ReportType, u64)> {
                let n: i64 = col(row, "reports", "n")?;
                Ok((
                    parsed(row, "reports", "status")?,
                    parsed(row, "reports", "report_type")?,
                    n.max(0) as u64,
                ))
            })
            .collect()
    }
}

#[async_trait]
impl StoreHealth for PostgresStore {
    async fn ping(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1")
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("ping", e))?;
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "PostgreSQL"
    }
}
