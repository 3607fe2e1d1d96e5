use thiserror::Error;

pub type StoreResult<T> = Result<T, StoreError>;

/// Persistence failure.
///
/// `Duplicate` is the only variant callers are expected to branch on; every
/// other variant ends up as a 500 at the HTTP boundary.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A unique constraint rejected the write.
    #[error("{0}")]
    Duplicate(String),

    #[error("database error in {operation}: {message}")]
    Backend { operation: &'static str, message: String },

    /// A stored row could not be mapped back into a domain value.
    #[error("corrupt row in {table}: {message}")]
    Corrupt { table: &'static str, message: String },

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    pub fn backend(operation: &'static str, message: impl Into<String>) -> Self {
        Self::Backend {
            operation,
            message: message.into(),
        }
    }

    pub fn corrupt(table: &'static str, message: impl ToString) -> Self {
        Self::Corrupt {
            table,
            message: message.to_string(),
        }
    }
}

/// Map sqlx errors the way every Postgres operation reports them.
///
/// | sqlx error | SQLSTATE | StoreError |
/// |---|---|---|
/// | Database, unique violation | `23505` | `Duplicate` |
/// | Database, other | any | `Backend` |
/// | PoolClosed / PoolTimedOut / Io | n/a | `Unavailable` |
/// | anything else | n/a | `Backend` |
pub(crate) fn map_sqlx_error(operation: &'static str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            if db_err.code().as_deref() == Some("23505") {
                StoreError::Duplicate(duplicate_message(db_err.constraint()))
            } else {
                StoreError::backend(operation, db_err.message())
            }
        }
        sqlx::Error::PoolClosed => StoreError::Unavailable(format!("connection pool closed in {operation}")),
        sqlx::Error::PoolTimedOut => StoreError::Unavailable(format!("connection pool timed out in {operation}")),
        sqlx::Error::Io(e) => StoreError::Unavailable(format!("io error in {operation}: {e}")),
        other => StoreError::backend(operation, other.to_string()),
    }
}

fn duplicate_message(constraint: Option<&str>) -> String {
    match constraint {
        Some("articles_code_key") => "article code already exists".to_string(),
        Some("users_username_key") => "username already exists".to_string(),
        Some("users_email_key") => "email is already registered".to_string(),
        Some(other) => format!("duplicate value violates {other}"),
        None => "duplicate value".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_constraints_get_readable_messages() {
        assert_eq!(duplicate_message(Some("articles_code_key")), "article code already exists");
        assert_eq!(duplicate_message(Some("users_email_key")), "email is already registered");
        assert!(duplicate_message(Some("x_key")).contains("x_key"));
    }

    #[test]
    fn pool_closed_is_unavailable() {
        let err = map_sqlx_error("list_articles", sqlx::Error::PoolClosed);
        assert!(matches!(err, StoreError::Unavailable(_)));
    }
}
