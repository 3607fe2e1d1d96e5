//! `rigstock-core` — shared domain building blocks.
//!
//! Pure primitives only: identifiers, the domain error model and the text
//! normalization rules every entity applies before persistence.

pub mod error;
pub mod id;
pub mod normalize;
pub mod patch;

pub use error::{DomainError, DomainResult};
pub use id::{ArticleId, ReportId, UserId};
