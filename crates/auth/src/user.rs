//! User accounts: model, creation validation and sparse updates.
//!
//! Accounts are never physically deleted; deactivation flips the status to
//! `INACTIVO`. Role changes go through [`crate::admin_policy`] so the
//! single-administrator invariant is enforced in one place.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use rigstock_core::{normalize, DomainError, DomainResult, UserId};

use crate::admin_policy;
use crate::Role;

// ─────────────────────────────────────────────────────────────────────────────
// User Status
// ─────────────────────────────────────────────────────────────────────────────

/// User account status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum UserStatus {
    /// User can authenticate.
    #[default]
    #[serde(rename = "ACTIVO")]
    Active,
    /// Logically deleted; login is refused.
    #[serde(rename = "INACTIVO")]
    Inactive,
}

impl UserStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserStatus::Active => "ACTIVO",
            UserStatus::Inactive => "INACTIVO",
        }
    }
}

impl core::fmt::Display for UserStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for UserStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "ACTIVO" => Ok(UserStatus::Active),
            "INACTIVO" => Ok(UserStatus::Inactive),
            other => Err(DomainError::validation(format!(
                "invalid status '{other}', must be one of: ACTIVO, INACTIVO"
            ))),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// User
// ─────────────────────────────────────────────────────────────────────────────

/// Stored user account.
///
/// `password_hash` is a one-way PHC string and must never leave the server;
/// this type deliberately does not implement `Serialize`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub full_name: String,
    pub role: Role,
    pub status: UserStatus,
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn is_active(&self) -> bool {
        self.status == UserStatus::Active
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Creation
// ─────────────────────────────────────────────────────────────────────────────

/// How the role of a new account is decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleAssignment {
    /// User-management endpoint: the account is always an operator.
    PinnedUser,
    /// Privileged endpoint: the caller picks the role (never ADMIN).
    CallerAssigned,
}

/// Raw creation payload.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateUser {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub full_name: Option<String>,
    pub role: Option<String>,
}

/// Validated creation request. The password is still plaintext; hash it
/// with [`crate::password`] before building a [`NewUser`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRegistration {
    pub username: String,
    pub email: String,
    pub password: String,
    pub full_name: String,
    pub role: Role,
}

/// Account ready for insertion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub full_name: String,
    pub role: Role,
    pub status: UserStatus,
}

impl UserRegistration {
    pub fn into_new_user(self, password_hash: String) -> NewUser {
        NewUser {
            username: self.username,
            email: self.email,
            password_hash,
            full_name: self.full_name,
            role: self.role,
            status: UserStatus::Active,
        }
    }
}

impl CreateUser {
    pub fn validate(self, assignment: RoleAssignment) -> DomainResult<UserRegistration> {
        let mut errors = Vec::new();
        for (field, value) in [
            ("username", &self.username),
            ("email", &self.email),
            ("password", &self.password),
            ("full_name", &self.full_name),
        ] {
            if value.as_deref().map_or(true, |v| v.trim().is_empty()) {
                errors.push(format!("{field} is required"));
            }
        }
        if let Some(email) = self.email.as_deref().map(str::trim) {
            if !email.is_empty() && !email.contains('@') {
                errors.push("invalid email format".to_string());
            }
        }
        DomainError::check(errors)?;

        let requested = match self.role.as_deref().map(str::trim) {
            None | Some("") => Role::User,
            Some(raw) => raw.parse()?,
        };
        admin_policy::ensure_new_account_role(requested)?;
        let role = match assignment {
            RoleAssignment::PinnedUser => Role::User,
            RoleAssignment::CallerAssigned => requested,
        };

        Ok(UserRegistration {
            username: normalize::lower(self.username.as_deref().unwrap_or_default()),
            email: normalize::lower(self.email.as_deref().unwrap_or_default()),
            password: self.password.unwrap_or_default(),
            full_name: normalize::title(self.full_name.as_deref().unwrap_or_default()),
            role,
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Update
// ─────────────────────────────────────────────────────────────────────────────

/// Sparse update payload for an existing account.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserPatch {
    pub username: Option<String>,
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub role: Option<String>,
    pub password: Option<String>,
}

/// Outcome of applying a [`UserPatch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserUpdate {
    /// The account with every non-password change applied.
    pub user: User,
    /// New plaintext password to hash, if one was sent.
    pub new_password: Option<String>,
    pub username_changed: bool,
    pub email_changed: bool,
}

impl UserPatch {
    pub fn apply(self, current: &User) -> DomainResult<UserUpdate> {
        let role = self.role.as_deref().map(str::parse::<Role>).transpose()?;
        if let Some(role) = role {
            admin_policy::ensure_role_change(current, role)?;
        }

        let mut errors = Vec::new();
        if self.username.as_deref().is_some_and(|v| v.trim().is_empty()) {
            errors.push("username cannot be empty".to_string());
        }
        if let Some(email) = self.email.as_deref().map(str::trim) {
            if email.is_empty() || !email.contains('@') {
                errors.push("invalid email format".to_string());
            }
        }
        if self.full_name.as_deref().is_some_and(|v| v.trim().is_empty()) {
            errors.push("full_name cannot be empty".to_string());
        }
        DomainError::check(errors)?;

        let mut next = current.clone();
        let mut username_changed = false;
        let mut email_changed = false;

        if let Some(username) = self.username {
            next.username = normalize::lower(&username);
            username_changed = next.username != current.username;
        }
        if let Some(email) = self.email {
            next.email = normalize::lower(&email);
            email_changed = next.email != current.email;
        }
        if let Some(full_name) = self.full_name {
            next.full_name = normalize::title(&full_name);
        }
        if let Some(role) = role {
            next.role = role;
        }

        Ok(UserUpdate {
            user: next,
            new_password: self.password.filter(|p| !p.is_empty()),
            username_changed,
            email_changed,
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn operator(id: i64) -> User {
        User {
            id: UserId::new(id),
            username: "juan".into(),
            email: "juan@example.com".into(),
            password_hash: "x".into(),
            full_name: "Juan Perez".into(),
            role: Role::User,
            status: UserStatus::Active,
            last_login: None,
            created_at: Utc::now(),
        }
    }

    fn admin() -> User {
        User {
            role: Role::Admin,
            username: "admin".into(),
            ..operator(1)
        }
    }

    fn create(role: Option<&str>) -> CreateUser {
        CreateUser {
            username: Some("  Maria.Lopez ".into()),
            email: Some(" Maria@Example.COM".into()),
            password: Some("s3cret!".into()),
            full_name: Some("maria lopez".into()),
            role: role.map(str::to_string),
        }
    }

    #[test]
    fn create_normalizes_identity_fields() {
        let reg = create(None).validate(RoleAssignment::PinnedUser).unwrap();
        assert_eq!(reg.username, "maria.lopez");
        assert_eq!(reg.email, "maria@example.com");
        assert_eq!(reg.full_name, "Maria Lopez");
        assert_eq!(reg.role, Role::User);
        assert_eq!(reg.password, "s3cret!");
    }

    #[test]
    fn create_requires_all_fields() {
        let err = CreateUser::default().validate(RoleAssignment::PinnedUser).unwrap_err();
        let DomainError::Validation(msgs) = err else {
            panic!("expected validation error");
        };
        assert_eq!(msgs.len(), 4);
    }

    #[test]
    fn pinned_assignment_ignores_requested_role() {
        let reg = create(Some("USER")).validate(RoleAssignment::PinnedUser).unwrap();
        assert_eq!(reg.role, Role::User);
    }

    #[test]
    fn admin_role_rejected_on_every_creation_path() {
        for mode in [RoleAssignment::PinnedUser, RoleAssignment::CallerAssigned] {
            let err = create(Some("ADMIN")).validate(mode).unwrap_err();
            assert!(matches!(err, DomainError::Forbidden(_)));
        }
    }

    #[test]
    fn unknown_role_is_a_validation_error() {
        let err = create(Some("SUPERVISOR")).validate(RoleAssignment::CallerAssigned).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn patch_changes_only_sent_fields() {
        let current = operator(5);
        let update = UserPatch {
            full_name: Some("juan carlos perez".into()),
            ..Default::default()
        }
        .apply(&current)
        .unwrap();

        assert_eq!(update.user.full_name, "Juan Carlos Perez");
        assert_eq!(update.user.email, current.email);
        assert_eq!(update.user.username, current.username);
        assert!(!update.email_changed);
        assert_eq!(update.new_password, None);
    }

    #[test]
    fn patch_normalizes_email_and_flags_change() {
        let update = UserPatch {
            email: Some(" NEW@Example.com ".into()),
            password: Some("".into()),
            ..Default::default()
        }
        .apply(&operator(5))
        .unwrap();
        assert_eq!(update.user.email, "new@example.com");
        assert!(update.email_changed);
        assert_eq!(update.new_password, None);
    }

    #[test]
    fn primary_admin_cannot_be_demoted() {
        let err = UserPatch {
            role: Some("USER".into()),
            ..Default::default()
        }
        .apply(&admin())
        .unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));
    }

    #[test]
    fn primary_admin_other_fields_still_editable() {
        let update = UserPatch {
            full_name: Some("jefe de planta".into()),
            role: Some("ADMIN".into()),
            ..Default::default()
        }
        .apply(&admin())
        .unwrap();
        assert_eq!(update.user.role, Role::Admin);
        assert_eq!(update.user.full_name, "Jefe De Planta");
    }

    #[test]
    fn operator_cannot_be_promoted() {
        let err = UserPatch {
            role: Some("ADMIN".into()),
            ..Default::default()
        }
        .apply(&operator(3))
        .unwrap_err();
        assert!(matches!(err, DomainError::Forbidden(_)));
    }
}
