//! Equipment catalog domain.
//!
//! Business rules for articles (tools and machinery), implemented as pure
//! validation/normalization logic (no IO, no HTTP, no storage).

pub mod article;
pub mod patch;

pub use article::{
    Article, CreateArticle, DEFAULT_STATUS, DEFAULT_UNIT, MAX_SUGGESTIONS, MIN_SUGGESTION_QUERY,
    NewArticle, SuggestionField, is_tool, similar_tool_error,
};
pub use patch::ArticlePatch;
