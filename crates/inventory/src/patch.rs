//! Sparse article updates: only keys present in the payload are touched.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use rigstock_core::{normalize, patch::nullable, DomainError, DomainResult};

use crate::article::{
    check_code, check_name, check_stock, non_blank, validation_messages, Article, DEFAULT_UNIT,
};

/// Partial update payload. `Option<Option<_>>` fields accept explicit `null`
/// to clear the stored value.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ArticlePatch {
    pub code: Option<String>,
    pub name: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub description: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub tipo: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub category: Option<Option<String>>,
    pub unit: Option<String>,
    pub stock_min: Option<i64>,
    pub stock_current: Option<i64>,
    #[serde(default, deserialize_with = "nullable")]
    pub location: Option<Option<String>>,
    pub status: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub acquisition_date: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub observations: Option<Option<String>>,
}

impl ArticlePatch {
    /// Whether the patch can change the outcome of the tool-name uniqueness rule.
    pub fn touches_tool_identity(&self) -> bool {
        self.name.is_some() || self.tipo.is_some()
    }

    /// Validate the present fields and return the updated record.
    ///
    /// Fields absent from the patch keep their stored value.
    pub fn apply(self, current: &Article, now: DateTime<Utc>) -> DomainResult<Article> {
        let mut errors = Vec::new();

        if self.code.is_some() {
            check_code(self.code.as_deref(), &mut errors);
        }
        if self.name.is_some() {
            check_name(self.name.as_deref(), &mut errors);
        }
        check_stock("stock_min", self.stock_min, &mut errors);
        check_stock("stock_current", self.stock_current, &mut errors);

        let acquisition_date = match &self.acquisition_date {
            None => current.acquisition_date,
            Some(None) => None,
            Some(Some(raw)) if raw.trim().is_empty() => None,
            Some(Some(raw)) => match normalize::parse_date(raw) {
                Ok(date) => Some(date),
                Err(e) => {
                    errors.extend(validation_messages(e));
                    None
                }
            },
        };

        DomainError::check(errors)?;

        let mut next = current.clone();
        if let Some(code) = self.code {
            next.code = normalize::upper(&code);
        }
        if let Some(name) = self.name {
            next.name = normalize::title(&name);
        }
        if let Some(description) = self.description {
            next.description = description.as_deref().map(str::trim).unwrap_or_default().to_string();
        }
        if let Some(tipo) = self.tipo {
            next.tipo = tipo;
        }
        if let Some(category) = self.category {
            next.category = normalize::title_opt(category.as_deref());
        }
        if let Some(unit) = self.unit {
            next.unit = non_blank(Some(normalize::lower(&unit)), DEFAULT_UNIT);
        }
        if let Some(v) = self.stock_min {
            next.stock_min = v;
        }
        if let Some(v) = self.stock_current {
            next.stock_current = v;
        }
        if let Some(location) = self.location {
            next.location = normalize::title_opt(location.as_deref());
        }
        if let Some(status) = self.status {
            next.status = status.trim().to_string();
        }
        next.acquisition_date = acquisition_date;
        if let Some(observations) = self.observations {
            next.observations = observations;
        }
        next.updated_at = now;

        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rigstock_core::ArticleId;

    fn stored() -> Article {
        let t = Utc::now();
        Article {
            id: ArticleId::new(7),
            code: "P-01".into(),
            name: "Pump One".into(),
            description: "centrifugal".into(),
            tipo: Some("maquinaria".into()),
            category: Some("Bombas".into()),
            unit: "unidad".into(),
            stock_min: 1,
            stock_current: 4,
            location: Some("Pozo 3".into()),
            status: "FUNCIONANDO".into(),
            acquisition_date: NaiveDate::from_ymd_opt(2022, 5, 1),
            observations: None,
            created_at: t,
            updated_at: t,
        }
    }

    fn patch(json: serde_json::Value) -> ArticlePatch {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn unspecified_fields_are_unchanged() {
        let current = stored();
        let now = Utc::now();
        let next = patch(serde_json::json!({"stock_current": 9})).apply(&current, now).unwrap();

        assert_eq!(next.stock_current, 9);
        assert_eq!(next.updated_at, now);
        let mut expected = current.clone();
        expected.stock_current = 9;
        expected.updated_at = now;
        assert_eq!(next, expected);
    }

    #[test]
    fn present_fields_are_normalized() {
        let next = patch(serde_json::json!({
            "name": "bomba DOS",
            "unit": " KIT ",
            "location": "taller central",
            "code": " p-02 ",
        }))
        .apply(&stored(), Utc::now())
        .unwrap();

        assert_eq!(next.name, "Bomba Dos");
        assert_eq!(next.unit, "kit");
        assert_eq!(next.location.as_deref(), Some("Taller Central"));
        assert_eq!(next.code, "P-02");
    }

    #[test]
    fn explicit_null_clears_optional_fields() {
        let next = patch(serde_json::json!({"category": null, "acquisition_date": null}))
            .apply(&stored(), Utc::now())
            .unwrap();
        assert_eq!(next.category, None);
        assert_eq!(next.acquisition_date, None);
        assert_eq!(next.location.as_deref(), Some("Pozo 3"));
    }

    #[test]
    fn rejects_negative_stock_and_bad_date() {
        let err = patch(serde_json::json!({"stock_min": -2, "acquisition_date": "2022/01/01"}))
            .apply(&stored(), Utc::now())
            .unwrap_err();
        let DomainError::Validation(msgs) = err else {
            panic!("expected validation error");
        };
        assert_eq!(msgs.len(), 2);
    }

    #[test]
    fn blank_unit_falls_back_to_default() {
        let mut current = stored();
        current.unit = "kit".into();
        let next = patch(serde_json::json!({"unit": "   "})).apply(&current, Utc::now()).unwrap();
        assert_eq!(next.unit, DEFAULT_UNIT);
    }

    #[test]
    fn rejects_short_name() {
        assert!(patch(serde_json::json!({"name": " x "})).apply(&stored(), Utc::now()).is_err());
    }

    #[test]
    fn tool_identity_tracking() {
        assert!(patch(serde_json::json!({"name": "Taladro"})).touches_tool_identity());
        assert!(patch(serde_json::json!({"tipo": null})).touches_tool_identity());
        assert!(!patch(serde_json::json!({"stock_min": 1})).touches_tool_identity());
    }
}
