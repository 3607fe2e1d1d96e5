//! Canonicalization rules applied to free-text fields before persistence.
//!
//! Every rule is deterministic and idempotent so that comparisons against
//! stored values (uniqueness checks, lookups) are stable.

use chrono::NaiveDate;

use crate::error::DomainError;

/// Accepted calendar-date format for date fields.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Trim and upper-case (article codes).
pub fn upper(value: &str) -> String {
    value.trim().to_uppercase()
}

/// Trim and lower-case (units, usernames, emails).
pub fn lower(value: &str) -> String {
    value.trim().to_lowercase()
}

/// Trim and title-case: the first cased character of every word is
/// upper-cased, the rest lower-cased. A word boundary is any character
/// without case, so `"3-way valve"` becomes `"3-Way Valve"`.
pub fn title(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut prev_cased = false;
    for c in value.trim().chars() {
        let cased = c.is_uppercase() || c.is_lowercase();
        if cased {
            if prev_cased {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
        } else {
            out.push(c);
        }
        prev_cased = cased;
    }
    out
}

/// Title-case an optional field; blank input collapses to `None`.
pub fn title_opt(value: Option<&str>) -> Option<String> {
    value.map(title).filter(|v| !v.is_empty())
}

/// Parse an ISO calendar date (`YYYY-MM-DD`).
pub fn parse_date(value: &str) -> Result<NaiveDate, DomainError> {
    NaiveDate::parse_from_str(value.trim(), DATE_FORMAT)
        .map_err(|_| DomainError::validation("invalid date format, use YYYY-MM-DD"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn title_cases_words() {
        assert_eq!(title("  pump one "), "Pump One");
        assert_eq!(title("DRILL bit"), "Drill Bit");
        assert_eq!(title("3-way valve"), "3-Way Valve");
        assert_eq!(title("llave o'neil"), "Llave O'Neil");
    }

    #[test]
    fn blank_optional_becomes_none() {
        assert_eq!(title_opt(Some("   ")), None);
        assert_eq!(title_opt(Some("bodega norte")), Some("Bodega Norte".into()));
        assert_eq!(title_opt(None), None);
    }

    #[test]
    fn parses_iso_dates_only() {
        assert_eq!(
            parse_date("2024-03-15").unwrap(),
            NaiveDate::from_ymd_opt(2024, 3, 15).unwrap()
        );
        assert!(parse_date("15/03/2024").is_err());
        assert!(parse_date("2024-13-01").is_err());
        assert!(parse_date("").is_err());
    }

    proptest! {
        #[test]
        fn title_is_idempotent(s in "[a-zA-Z0-9 '\\-]{0,40}") {
            let once = title(&s);
            prop_assert_eq!(title(&once), once);
        }

        #[test]
        fn upper_has_no_lowercase_ascii(s in "[a-z0-9\\- ]{0,20}") {
            let code = upper(&s);
            prop_assert!(!code.chars().any(|c| c.is_ascii_lowercase()));
            prop_assert_eq!(code.trim(), code.as_str());
        }
    }
}
