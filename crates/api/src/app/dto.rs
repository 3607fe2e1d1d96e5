use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use rigstock_auth::{Role, User, UserStatus};
use rigstock_core::{ArticleId, ReportId, UserId};
use rigstock_inventory::Article;
use rigstock_reports::{Report, ReportStatus, ReportType};

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Default, Deserialize)]
pub struct LoginRequest {
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SuggestionsQuery {
    pub field: Option<String>,
    pub query: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UserListQuery {
    pub search: Option<String>,
    pub role: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ReportListQuery {
    pub status: Option<String>,
}

// -------------------------
// Response DTOs
// -------------------------

/// Public view of an account; never carries the password hash.
#[derive(Debug, Clone, Serialize)]
pub struct UserView {
    pub id: UserId,
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub role: Role,
    pub status: UserStatus,
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<&User> for UserView {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            full_name: user.full_name.clone(),
            role: user.role,
            status: user.status,
            last_login: user.last_login,
            created_at: user.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct UserList {
    pub total: usize,
    pub users: Vec<UserView>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginResponse {
    pub message: &'static str,
    pub token: String,
    pub user: UserView,
}

#[derive(Debug, Clone, Serialize)]
pub struct VerifyResponse {
    pub valid: bool,
    pub user: UserView,
}

/// `{message, user}` envelope returned by account mutations.
#[derive(Debug, Clone, Serialize)]
pub struct UserResponse {
    pub message: &'static str,
    pub user: UserView,
}

impl UserResponse {
    pub fn new(message: &'static str, user: &User) -> Self {
        Self {
            message,
            user: UserView::from(user),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Message {
    pub message: &'static str,
}

impl Message {
    pub fn new(message: &'static str) -> Self {
        Self { message }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CodeCheck {
    pub exists: bool,
}

/// Article as embedded in an operator's own report listing.
#[derive(Debug, Clone, Serialize)]
pub struct ArticleBrief {
    pub id: ArticleId,
    pub code: String,
    pub name: String,
}

impl From<&Article> for ArticleBrief {
    fn from(a: &Article) -> Self {
        Self {
            id: a.id,
            code: a.code.clone(),
            name: a.name.clone(),
        }
    }
}

/// Article as embedded in the administrator's report listing.
#[derive(Debug, Clone, Serialize)]
pub struct ArticleSummary {
    pub id: ArticleId,
    pub code: String,
    pub name: String,
    pub tipo: Option<String>,
    pub status: String,
}

impl From<&Article> for ArticleSummary {
    fn from(a: &Article) -> Self {
        Self {
            id: a.id,
            code: a.code.clone(),
            name: a.name.clone(),
            tipo: a.tipo.clone(),
            status: a.status.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ReporterSummary {
    pub id: UserId,
    pub username: String,
    pub full_name: String,
}

impl From<&User> for ReporterSummary {
    fn from(u: &User) -> Self {
        Self {
            id: u.id,
            username: u.username.clone(),
            full_name: u.full_name.clone(),
        }
    }
}

/// A report with its article (and, for administrators, its reporter) inlined.
#[derive(Debug, Clone, Serialize)]
pub struct ReportView<A> {
    pub id: ReportId,
    pub article: Option<A>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<ReporterSummary>,
    pub report_type: ReportType,
    pub message: String,
    pub status: ReportStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub admin_response: Option<String>,
}

impl<A> ReportView<A> {
    pub fn new(report: Report, article: Option<A>, user: Option<ReporterSummary>) -> Self {
        Self {
            id: report.id,
            article,
            user,
            report_type: report.report_type,
            message: report.message,
            status: report.status,
            created_at: report.created_at,
            updated_at: report.updated_at,
            admin_response: report.admin_response,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ReportCreated {
    pub id: ReportId,
    pub message: &'static str,
    pub article_id: ArticleId,
    pub report_type: ReportType,
    pub status: ReportStatus,
    pub created_at: DateTime<Utc>,
}

impl From<&Report> for ReportCreated {
    fn from(r: &Report) -> Self {
        Self {
            id: r.id,
            message: "report created",
            article_id: r.article_id,
            report_type: r.report_type,
            status: r.status,
            created_at: r.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ReportUpdated {
    pub id: ReportId,
    pub message: &'static str,
    pub status: ReportStatus,
    pub admin_response: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl From<&Report> for ReportUpdated {
    fn from(r: &Report) -> Self {
        Self {
            id: r.id,
            message: "report updated",
            status: r.status,
            admin_response: r.admin_response.clone(),
            updated_at: r.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_view_has_no_password_hash() {
        let user = User {
            id: UserId::new(3),
            username: "ana".into(),
            email: "ana@field.example".into(),
            password_hash: "$argon2id$secret".into(),
            full_name: "Ana Ruiz".into(),
            role: Role::User,
            status: UserStatus::Active,
            last_login: None,
            created_at: Utc::now(),
        };
        let json = serde_json::to_value(UserView::from(&user)).unwrap();
        assert!(json.get("password_hash").is_none());
        assert_eq!(json["role"], "USER");
        assert_eq!(json["status"], "ACTIVO");
        assert_eq!(json["id"], 3);
    }
}
