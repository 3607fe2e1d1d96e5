use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use rigstock_core::{patch::nullable, ArticleId, DomainError, DomainResult, ReportId, UserId};

/// Kind of issue an operator reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReportType {
    Falla,
    Mantenimiento,
    Observacion,
    Solicitud,
}

impl ReportType {
    pub const ALL: [ReportType; 4] = [
        ReportType::Falla,
        ReportType::Mantenimiento,
        ReportType::Observacion,
        ReportType::Solicitud,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ReportType::Falla => "FALLA",
            ReportType::Mantenimiento => "MANTENIMIENTO",
            ReportType::Observacion => "OBSERVACION",
            ReportType::Solicitud => "SOLICITUD",
        }
    }
}

impl core::str::FromStr for ReportType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| {
                DomainError::validation(
                    "invalid report_type, must be one of: FALLA, MANTENIMIENTO, OBSERVACION, SOLICITUD",
                )
            })
    }
}

/// Triage state of a report. New reports always start as `Pendiente`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReportStatus {
    #[default]
    Pendiente,
    EnRevision,
    Resuelto,
    Cerrado,
}

impl ReportStatus {
    pub const ALL: [ReportStatus; 4] = [
        ReportStatus::Pendiente,
        ReportStatus::EnRevision,
        ReportStatus::Resuelto,
        ReportStatus::Cerrado,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ReportStatus::Pendiente => "PENDIENTE",
            ReportStatus::EnRevision => "EN_REVISION",
            ReportStatus::Resuelto => "RESUELTO",
            ReportStatus::Cerrado => "CERRADO",
        }
    }

    /// Statuses that count as answered in the response rate.
    pub fn is_answered(&self) -> bool {
        matches!(self, ReportStatus::Resuelto | ReportStatus::Cerrado)
    }
}

impl core::str::FromStr for ReportStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| {
                DomainError::validation(
                    "invalid status, must be one of: PENDIENTE, EN_REVISION, RESUELTO, CERRADO",
                )
            })
    }
}

/// Stored report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
    pub id: ReportId,
    pub article_id: ArticleId,
    pub user_id: UserId,
    pub report_type: ReportType,
    pub message: String,
    pub status: ReportStatus,
    pub admin_response: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Raw creation payload.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateReport {
    pub article_id: Option<i64>,
    pub report_type: Option<String>,
    pub message: Option<String>,
}

/// Validated report ready for insertion; the reporter comes from the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewReport {
    pub article_id: ArticleId,
    pub user_id: UserId,
    pub report_type: ReportType,
    pub message: String,
    pub status: ReportStatus,
}

impl CreateReport {
    /// Check required fields and the type enum. Whether the article exists
    /// is checked by the caller against the catalog.
    pub fn validate(self, reporter: UserId) -> DomainResult<NewReport> {
        let message = self.message.as_deref().map(str::trim).unwrap_or_default();
        let report_type = self.report_type.as_deref().map(str::trim).unwrap_or_default();

        let mut errors = Vec::new();
        if self.article_id.is_none_or(|id| id == 0) {
            errors.push("article_id is required".to_string());
        }
        if report_type.is_empty() {
            errors.push("report_type is required".to_string());
        }
        if message.is_empty() {
            errors.push("message is required".to_string());
        }
        DomainError::check(errors)?;

        Ok(NewReport {
            article_id: ArticleId::new(self.article_id.unwrap_or_default()),
            user_id: reporter,
            report_type: report_type.parse()?,
            message: message.to_string(),
            status: ReportStatus::Pendiente,
        })
    }
}

/// Administrator update: status and/or response.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReportPatch {
    pub status: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub admin_response: Option<Option<String>>,
}

impl ReportPatch {
    pub fn apply(self, current: &Report, now: DateTime<Utc>) -> DomainResult<Report> {
        let status = self.status.as_deref().map(str::parse::<ReportStatus>).transpose()?;

        let mut next = current.clone();
        if let Some(status) = status {
            next.status = status;
        }
        if let Some(response) = self.admin_response {
            next.admin_response = response.map(|r| r.trim().to_string());
        }
        next.updated_at = Some(now);
        Ok(next)
    }
}
