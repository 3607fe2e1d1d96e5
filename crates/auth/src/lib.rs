//! `rigstock-auth` — authentication and authorization policy.
//!
//! This crate is decoupled from HTTP and storage: user lookups are passed in
//! by the caller and lockout counters sit behind [`LoginAttemptStore`].

pub mod admin_policy;
pub mod authorize;
pub mod claims;
pub mod lockout;
pub mod login;
pub mod password;
pub mod roles;
pub mod token;
pub mod user;

pub use authorize::{authorize, require_admin, AuthzError};
pub use claims::{validate_claims, SessionClaims, TokenValidationError};
pub use lockout::{InMemoryLoginAttempts, LockoutPolicy, LoginAttemptStore};
pub use login::{Authenticated, Authenticator, LoginError};
pub use roles::Role;
pub use token::{Hs256Tokens, TokenError, TokenVerifier};
pub use user::{
    CreateUser, NewUser, RoleAssignment, User, UserPatch, UserRegistration, UserStatus, UserUpdate,
};
