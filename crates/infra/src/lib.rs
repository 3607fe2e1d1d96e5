//! Infrastructure layer: persistence backends and shared counters.
//!
//! The API talks to storage only through the traits in [`store`]; the
//! in-memory backend serves development and tests, the Postgres backend
//! serves deployments (`USE_PERSISTENT_STORES=true`).

pub mod error;
pub mod store;

#[cfg(feature = "redis")]
pub mod lockout;

pub use error::{StoreError, StoreResult};
pub use store::{
    ArticleStore, InMemoryStore, PostgresStore, ReportStore, Store, StoreHealth, UserFilter,
    UserStore,
};

#[cfg(feature = "redis")]
pub use lockout::RedisLoginAttempts;
