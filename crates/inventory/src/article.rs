use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use rigstock_core::{normalize, ArticleId, DomainError, DomainResult};

/// Unit assigned when the caller does not send one.
pub const DEFAULT_UNIT: &str = "unidad";

/// Operational status assigned when the caller does not send one.
pub const DEFAULT_STATUS: &str = "FUNCIONANDO";

/// Minimum length (after trimming) of codes and names.
pub(crate) const MIN_TEXT_LEN: usize = 3;

/// Autocomplete queries shorter than this return no suggestions.
pub const MIN_SUGGESTION_QUERY: usize = 2;

/// Upper bound on returned suggestions.
pub const MAX_SUGGESTIONS: usize = 10;

/// Persisted article (equipment or tool).
///
/// # Invariants
/// - `code` is upper-case, trimmed and globally unique.
/// - `name` is title-cased; unique (case-insensitive) among tools.
/// - `stock_min` and `stock_current` are never negative.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Article {
    pub id: ArticleId,
    pub code: String,
    pub name: String,
    pub description: String,
    pub tipo: Option<String>,
    pub category: Option<String>,
    pub unit: String,
    pub stock_min: i64,
    pub stock_current: i64,
    pub location: Option<String>,
    pub status: String,
    pub acquisition_date: Option<NaiveDate>,
    pub observations: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Article {
    pub fn is_tool(&self) -> bool {
        is_tool(self.tipo.as_deref())
    }

    /// Value of a suggestion-eligible field.
    pub fn field(&self, field: SuggestionField) -> Option<&str> {
        match field {
            SuggestionField::Name => Some(self.name.as_str()),
            SuggestionField::Category => self.category.as_deref(),
            SuggestionField::Location => self.location.as_deref(),
            SuggestionField::Unit => Some(self.unit.as_str()),
        }
    }
}

/// Tools ("herramienta") must have unique names; machinery may share them.
pub fn is_tool(tipo: Option<&str>) -> bool {
    tipo.is_some_and(|t| t.to_lowercase().contains("herramienta"))
}

/// Error reported when a tool name collides with an existing article.
pub fn similar_tool_error(existing: &Article) -> DomainError {
    DomainError::conflict(format!(
        "a similar tool already exists: {} (code: {})",
        existing.name, existing.code
    ))
}

/// Raw article creation payload, as received from the caller.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateArticle {
    pub code: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub tipo: Option<String>,
    pub category: Option<String>,
    pub unit: Option<String>,
    pub stock_min: Option<i64>,
    pub stock_current: Option<i64>,
    pub location: Option<String>,
    pub status: Option<String>,
    pub acquisition_date: Option<String>,
    pub observations: Option<String>,
}

/// Validated, normalized article ready for insertion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewArticle {
    pub code: String,
    pub name: String,
    pub description: String,
    pub tipo: Option<String>,
    pub category: Option<String>,
    pub unit: String,
    pub stock_min: i64,
    pub stock_current: i64,
    pub location: Option<String>,
    pub status: String,
    pub acquisition_date: Option<NaiveDate>,
    pub observations: Option<String>,
}

impl NewArticle {
    pub fn is_tool(&self) -> bool {
        is_tool(self.tipo.as_deref())
    }
}

impl CreateArticle {
    /// Validate all fields and return the normalized record.
    ///
    /// Every failing field contributes one message; nothing is normalized
    /// unless all checks pass.
    pub fn validate(self) -> DomainResult<NewArticle> {
        let mut errors = Vec::new();

        check_code(self.code.as_deref(), &mut errors);
        check_name(self.name.as_deref(), &mut errors);
        check_stock("stock_min", self.stock_min, &mut errors);
        check_stock("stock_current", self.stock_current, &mut errors);

        let acquisition_date = match self.acquisition_date.as_deref().map(str::trim) {
            Some(raw) if !raw.is_empty() => match normalize::parse_date(raw) {
                Ok(date) => Some(date),
                Err(e) => {
                    errors.extend(validation_messages(e));
                    None
                }
            },
            _ => None,
        };

        DomainError::check(errors)?;

        Ok(NewArticle {
            code: normalize::upper(self.code.as_deref().unwrap_or_default()),
            name: normalize::title(self.name.as_deref().unwrap_or_default()),
            description: self.description.as_deref().map(str::trim).unwrap_or_default().to_string(),
            tipo: self.tipo,
            category: normalize::title_opt(self.category.as_deref()),
            unit: non_blank(self.unit.as_deref().map(normalize::lower), DEFAULT_UNIT),
            stock_min: self.stock_min.unwrap_or(0),
            stock_current: self.stock_current.unwrap_or(0),
            location: normalize::title_opt(self.location.as_deref()),
            status: non_blank(self.status.map(|s| s.trim().to_string()), DEFAULT_STATUS),
            acquisition_date,
            observations: self.observations,
        })
    }
}

/// Autocomplete-eligible article columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SuggestionField {
    #[default]
    Name,
    Category,
    Location,
    Unit,
}

impl SuggestionField {
    pub fn as_str(&self) -> &'static str {
        match self {
            SuggestionField::Name => "name",
            SuggestionField::Category => "category",
            SuggestionField::Location => "location",
            SuggestionField::Unit => "unit",
        }
    }
}

impl core::str::FromStr for SuggestionField {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "name" => Ok(Self::Name),
            "category" => Ok(Self::Category),
            "location" => Ok(Self::Location),
            "unit" => Ok(Self::Unit),
            _ => Err(DomainError::validation(
                "invalid field, must be one of: name, category, location, unit",
            )),
        }
    }
}

pub(crate) fn check_code(code: Option<&str>, errors: &mut Vec<String>) {
    match code.map(str::trim) {
        None | Some("") => errors.push("code is required".into()),
        Some(c) if c.chars().count() < MIN_TEXT_LEN => {
            errors.push(format!("code must be at least {MIN_TEXT_LEN} characters"))
        }
        Some(_) => {}
    }
}

pub(crate) fn check_name(name: Option<&str>, errors: &mut Vec<String>) {
    match name.map(str::trim) {
        None | Some("") => errors.push("name is required".into()),
        Some(n) if n.chars().count() < MIN_TEXT_LEN => {
            errors.push(format!("name must be at least {MIN_TEXT_LEN} characters"))
        }
        Some(_) => {}
    }
}

pub(crate) fn check_stock(field: &str, value: Option<i64>, errors: &mut Vec<String>) {
    if value.is_some_and(|v| v < 0) {
        errors.push(format!("{field} cannot be negative"));
    }
}

pub(crate) fn validation_messages(err: DomainError) -> Vec<String> {
    match err {
        DomainError::Validation(msgs) => msgs,
        other => vec![other.to_string()],
    }
}

pub(crate) fn non_blank(value: Option<String>, default: &str) -> String {
    value
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(json: serde_json::Value) -> CreateArticle {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn create_normalizes_and_applies_defaults() {
        let new = payload(serde_json::json!({"code": "  p-01 ", "name": "pump one"}))
            .validate()
            .unwrap();

        assert_eq!(new.code, "P-01");
        assert_eq!(new.name, "Pump One");
        assert_eq!(new.unit, "unidad");
        assert_eq!(new.stock_min, 0);
        assert_eq!(new.stock_current, 0);
        assert_eq!(new.status, "FUNCIONANDO");
        assert_eq!(new.description, "");
        assert_eq!(new.acquisition_date, None);
    }

    #[test]
    fn create_normalizes_optional_fields() {
        let new = payload(serde_json::json!({
            "code": "tl-9",
            "name": "LLAVE inglesa",
            "category": " herramientas manuales ",
            "location": "bodega norte",
            "unit": " PIEZA ",
            "acquisition_date": "2023-07-01",
        }))
        .validate()
        .unwrap();

        assert_eq!(new.category.as_deref(), Some("Herramientas Manuales"));
        assert_eq!(new.location.as_deref(), Some("Bodega Norte"));
        assert_eq!(new.unit, "pieza");
        assert_eq!(new.acquisition_date, NaiveDate::from_ymd_opt(2023, 7, 1));
    }

    #[test]
    fn create_collects_itemized_errors() {
        let err = payload(serde_json::json!({"code": "ab", "stock_min": -1, "stock_current": -5}))
            .validate()
            .unwrap_err();

        let DomainError::Validation(msgs) = err else {
            panic!("expected validation error");
        };
        assert_eq!(msgs.len(), 4);
        assert!(msgs.iter().any(|m| m.contains("code must be at least")));
        assert!(msgs.iter().any(|m| m == "name is required"));
        assert!(msgs.iter().any(|m| m.contains("stock_min")));
        assert!(msgs.iter().any(|m| m.contains("stock_current")));
    }

    #[test]
    fn create_rejects_bad_date_format() {
        let err = payload(serde_json::json!({"code": "abc", "name": "abc", "acquisition_date": "01/02/2023"}))
            .validate()
            .unwrap_err();
        assert!(err.to_string().contains("YYYY-MM-DD"));
    }

    #[test]
    fn code_length_counts_trimmed_text() {
        let err = payload(serde_json::json!({"code": "  ab  ", "name": "Valid"}))
            .validate()
            .unwrap_err();
        assert!(err.to_string().contains("code must be at least 3"));
    }

    #[test]
    fn tool_detection_is_case_insensitive() {
        assert!(is_tool(Some("Herramienta manual")));
        assert!(is_tool(Some("HERRAMIENTA")));
        assert!(!is_tool(Some("maquinaria")));
        assert!(!is_tool(None));
    }

    #[test]
    fn suggestion_field_allow_list() {
        assert_eq!("category".parse::<SuggestionField>().unwrap(), SuggestionField::Category);
        assert!("code".parse::<SuggestionField>().is_err());
        assert!("description".parse::<SuggestionField>().is_err());
    }
}
