//! Storage seams.
//!
//! Each aggregate has its own async trait; [`Store`] bundles them so the
//! API holds a single `Arc<dyn Store>`. Every write method is atomic: it
//! either fully applies or leaves the store untouched.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use rigstock_auth::{NewUser, Role, User, UserStatus};
use rigstock_core::{ArticleId, ReportId, UserId};
use rigstock_inventory::{Article, NewArticle, SuggestionField};
use rigstock_reports::{NewReport, Report, ReportStatus, ReportType};

use crate::StoreResult;

mod memory;
mod postgres;

pub use memory::InMemoryStore;
pub use postgres::PostgresStore;

/// Equipment catalog.
#[async_trait]
pub trait ArticleStore: Send + Sync {
    /// All articles in insertion order.
    async fn list_articles(&self) -> StoreResult<Vec<Article>>;

    async fn get_article(&self, id: ArticleId) -> StoreResult<Option<Article>>;

    /// Exact match on the (already normalized) code.
    async fn find_article_by_code(&self, code: &str) -> StoreResult<Option<Article>>;

    /// Case-insensitive exact name match, optionally ignoring one article.
    async fn find_article_by_name(
        &self,
        name: &str,
        exclude: Option<ArticleId>,
    ) -> StoreResult<Option<Article>>;

    /// Fails with `Duplicate` when the code is taken.
    async fn insert_article(&self, new: NewArticle, now: DateTime<Utc>) -> StoreResult<Article>;

    /// Overwrite every column of an existing article. Returns `false` when
    /// the id no longer exists.
    async fn update_article(&self, article: &Article) -> StoreResult<bool>;

    /// Hard delete; reports filed against the article go with it.
    async fn delete_article(&self, id: ArticleId) -> StoreResult<bool>;

    /// Distinct non-empty values of `field` containing `query`
    /// (case-insensitive), at most `limit`.
    async fn suggest(&self, field: SuggestionField, query: &str, limit: usize) -> StoreResult<Vec<String>>;

    async fn count_articles(&self) -> StoreResult<u64>;
}

/// Filters for the user directory listing. `None` means "any".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserFilter {
    /// Case-insensitive substring over username, full name and email.
    pub search: Option<String>,
    pub role: Option<Role>,
    pub status: Option<UserStatus>,
}

impl UserFilter {
    pub fn matches(&self, user: &User) -> bool {
        if self.role.is_some_and(|r| r != user.role) {
            return false;
        }
        if self.status.is_some_and(|s| s != user.status) {
            return false;
        }
        match self.search.as_deref().map(str::to_lowercase) {
            None => true,
            Some(needle) if needle.is_empty() => true,
            Some(needle) => [&user.username, &user.full_name, &user.email]
                .iter()
                .any(|v| v.to_lowercase().contains(&needle)),
        }
    }
}

/// Credential store.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Matching users, newest first.
    async fn list_users(&self, filter: &UserFilter) -> StoreResult<Vec<User>>;

    async fn get_user(&self, id: UserId) -> StoreResult<Option<User>>;

    async fn find_user_by_username(&self, username: &str) -> StoreResult<Option<User>>;

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>>;

    /// Fails with `Duplicate` when the username or email is taken.
    async fn insert_user(&self, new: NewUser, now: DateTime<Utc>) -> StoreResult<User>;

    /// Overwrite the editable columns of an existing user. `last_login` is
    /// owned by [`UserStore::touch_last_login`] and left as stored. Returns
    /// `false` when the id no longer exists.
    async fn update_user(&self, user: &User) -> StoreResult<bool>;

    async fn touch_last_login(&self, id: UserId, at: DateTime<Utc>) -> StoreResult<()>;

    async fn count_users(&self) -> StoreResult<u64>;

    async fn count_active_users(&self) -> StoreResult<u64>;
}

/// Issue ledger.
#[async_trait]
pub trait ReportStore: Send + Sync {
    /// Every report, newest first, optionally narrowed to one status.
    async fn list_reports(&self, status: Option<ReportStatus>) -> StoreResult<Vec<Report>>;

    /// Reports filed by one user, newest first.
    async fn list_reports_by_user(&self, user_id: UserId) -> StoreResult<Vec<Report>>;

    async fn get_report(&self, id: ReportId) -> StoreResult<Option<Report>>;

    async fn insert_report(&self, new: NewReport, now: DateTime<Utc>) -> StoreResult<Report>;

    async fn update_report(&self, report: &Report) -> StoreResult<bool>;

    async fn delete_report(&self, id: ReportId) -> StoreResult<bool>;

    async fn count_reports(&self) -> StoreResult<u64>;

    async fn count_reports_since(&self, since: DateTime<Utc>) -> StoreResult<u64>;

    /// Report counts grouped by `(status, type)`; empty groups are omitted.
    async fn report_groups(&self) -> StoreResult<Vec<(ReportStatus, ReportType, u64)>>;
}

/// Connectivity probe used by the health routes.
#[async_trait]
pub trait StoreHealth: Send + Sync {
    async fn ping(&self) -> StoreResult<()>;

    /// Human-readable backend name.
    fn backend(&self) -> &'static str;
}

/// Everything the API needs from persistence.
pub trait Store: ArticleStore + UserStore + ReportStore + StoreHealth {}

impl<T> Store for T where T: ArticleStore + UserStore + ReportStore + StoreHealth {}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(username: &str, full_name: &str, role: Role, status: UserStatus) -> User {
        User {
            id: UserId::new(2),
            username: username.into(),
            email: format!("{username}@field.example"),
            password_hash: "x".into(),
            full_name: full_name.into(),
            role,
            status,
            last_login: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn empty_filter_matches_everyone() {
        let u = user("ana", "Ana Ruiz", Role::User, UserStatus::Inactive);
        assert!(UserFilter::default().matches(&u));
    }

    #[test]
    fn search_is_case_insensitive_over_three_fields() {
        let u = user("ana", "Ana Ruiz", Role::User, UserStatus::Active);
        let by = |s: &str| UserFilter {
            search: Some(s.into()),
            ..Default::default()
        };
        assert!(by("RUIZ").matches(&u));
        assert!(by("field.example").matches(&u));
        assert!(!by("pedro").matches(&u));
    }

    #[test]
    fn role_and_status_narrow_results() {
        let u = user("ana", "Ana Ruiz", Role::User, UserStatus::Active);
        let admins = UserFilter {
            role: Some(Role::Admin),
            ..Default::default()
        };
        let inactive = UserFilter {
            status: Some(UserStatus::Inactive),
            ..Default::default()
        };
        assert!(!admins.matches(&u));
        assert!(!inactive.matches(&u));
    }
}
