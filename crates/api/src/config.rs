//! Process configuration read from the environment.

use chrono::Duration;
use tracing::warn;

use rigstock_auth::lockout::{LOCKOUT_WINDOW_SECS, MAX_FAILED_ATTEMPTS};
use rigstock_auth::token::TOKEN_TTL_HOURS;
use rigstock_auth::LockoutPolicy;

/// Signing secret used when neither `JWT_SECRET` nor `SECRET_KEY` is set.
pub const DEV_JWT_SECRET: &str = "dev-secret-key";

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";

/// Credentials of the primary administrator created on an empty user table.
#[derive(Clone)]
pub struct AdminBootstrap {
    pub username: String,
    pub password: String,
    pub email: String,
    pub full_name: String,
}

impl core::fmt::Debug for AdminBootstrap {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AdminBootstrap")
            .field("username", &self.username)
            .field("email", &self.email)
            .field("full_name", &self.full_name)
            .finish_non_exhaustive()
    }
}

impl Default for AdminBootstrap {
    fn default() -> Self {
        Self {
            username: "admin".into(),
            password: "admin123".into(),
            email: "admin@rigstock.local".into(),
            full_name: "Administrador".into(),
        }
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub jwt_secret: String,
    pub bind_addr: String,
    /// Postgres instead of the in-memory store.
    pub use_persistent_stores: bool,
    pub database_url: Option<String>,
    /// Shared lockout counter; only honoured with the `redis` feature.
    pub redis_url: Option<String>,
    /// Reported by the detailed health check.
    pub environment: String,
    pub admin: AdminBootstrap,
    pub token_ttl: Duration,
    pub lockout: LockoutPolicy,
}

impl core::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AppConfig")
            .field("bind_addr", &self.bind_addr)
            .field("use_persistent_stores", &self.use_persistent_stores)
            .field("environment", &self.environment)
            .field("admin", &self.admin)
            .field("token_ttl", &self.token_ttl)
            .field("lockout", &self.lockout)
            .finish_non_exhaustive()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            jwt_secret: DEV_JWT_SECRET.into(),
            bind_addr: DEFAULT_BIND_ADDR.into(),
            use_persistent_stores: false,
            database_url: None,
            redis_url: None,
            environment: "development".into(),
            admin: AdminBootstrap::default(),
            token_ttl: Duration::hours(TOKEN_TTL_HOURS),
            lockout: LockoutPolicy::default(),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        let jwt_secret = get("JWT_SECRET").or_else(|| get("SECRET_KEY")).unwrap_or_else(|| {
            warn!("JWT_SECRET not set; using insecure dev default");
            DEV_JWT_SECRET.to_string()
        });

        let admin_defaults = AdminBootstrap::default();
        let admin = AdminBootstrap {
            username: get("ADMIN_USERNAME").unwrap_or(admin_defaults.username),
            password: get("ADMIN_PASSWORD").unwrap_or(admin_defaults.password),
            email: get("ADMIN_EMAIL").unwrap_or(admin_defaults.email),
            full_name: get("ADMIN_FULL_NAME").unwrap_or(admin_defaults.full_name),
        };

        let token_ttl = get("TOKEN_TTL_HOURS")
            .and_then(|v| v.trim().parse::<i64>().ok())
            .filter(|h| *h > 0)
            .map(Duration::hours)
            .unwrap_or(defaults.token_ttl);

        let lockout = LockoutPolicy {
            max_attempts: get("LOCKOUT_MAX_ATTEMPTS")
                .and_then(|v| v.trim().parse::<u32>().ok())
                .filter(|n| *n > 0)
                .unwrap_or(MAX_FAILED_ATTEMPTS),
            window: Duration::seconds(
                get("LOCKOUT_WINDOW_SECS")
                    .and_then(|v| v.trim().parse::<i64>().ok())
                    .filter(|s| *s > 0)
                    .unwrap_or(LOCKOUT_WINDOW_SECS),
            ),
        };

        Self {
            jwt_secret,
            bind_addr: get("BIND_ADDR").unwrap_or(defaults.bind_addr),
            use_persistent_stores: get("USE_PERSISTENT_STORES").is_some_and(|v| parse_flag(&v)),
            database_url: get("DATABASE_URL"),
            redis_url: get("REDIS_URL"),
            environment: get("APP_ENV").unwrap_or(defaults.environment),
            admin,
            token_ttl,
            lockout,
        }
    }

    /// In-memory configuration with a fixed secret, for tests and tooling.
    pub fn in_memory(jwt_secret: impl Into<String>) -> Self {
        Self {
            jwt_secret: jwt_secret.into(),
            environment: "test".into(),
            ..Self::default()
        }
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn from(pairs: &[(&str, &str)]) -> AppConfig {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|k| vars.get(k).cloned())
    }

    #[test]
    fn defaults_when_nothing_is_set() {
        let cfg = from(&[]);
        assert_eq!(cfg.jwt_secret, DEV_JWT_SECRET);
        assert_eq!(cfg.bind_addr, DEFAULT_BIND_ADDR);
        assert!(!cfg.use_persistent_stores);
        assert_eq!(cfg.environment, "development");
        assert_eq!(cfg.admin.username, "admin");
        assert_eq!(cfg.token_ttl, Duration::hours(24));
        assert_eq!(cfg.lockout, LockoutPolicy::default());
    }

    #[test]
    fn secret_key_is_a_fallback_for_jwt_secret() {
        assert_eq!(from(&[("SECRET_KEY", "legacy")]).jwt_secret, "legacy");
        assert_eq!(
            from(&[("SECRET_KEY", "legacy"), ("JWT_SECRET", "primary")]).jwt_secret,
            "primary"
        );
        assert_eq!(from(&[("JWT_SECRET", "  ")]).jwt_secret, DEV_JWT_SECRET);
    }

    #[test]
    fn persistent_flag_accepts_common_spellings() {
        for v in ["true", "TRUE", "1", "yes"] {
            assert!(from(&[("USE_PERSISTENT_STORES", v)]).use_persistent_stores, "{v}");
        }
        assert!(!from(&[("USE_PERSISTENT_STORES", "false")]).use_persistent_stores);
    }

    #[test]
    fn invalid_numeric_overrides_fall_back() {
        let cfg = from(&[("TOKEN_TTL_HOURS", "-3"), ("LOCKOUT_MAX_ATTEMPTS", "many")]);
        assert_eq!(cfg.token_ttl, Duration::hours(TOKEN_TTL_HOURS));
        assert_eq!(cfg.lockout.max_attempts, MAX_FAILED_ATTEMPTS);

        let cfg = from(&[("LOCKOUT_WINDOW_SECS", "60")]);
        assert_eq!(cfg.lockout.window, Duration::seconds(60));
    }

    #[test]
    fn debug_output_hides_secrets() {
        let cfg = from(&[("JWT_SECRET", "s3cr3t"), ("ADMIN_PASSWORD", "hunter2")]);
        let dbg = format!("{cfg:?}");
        assert!(!dbg.contains("s3cr3t"));
        assert!(!dbg.contains("hunter2"));
    }
}
