//! Failed-login lockout tracking.
//!
//! After `max_attempts` failures inside `window`, further logins for that
//! username are refused until the window (anchored at the first failure)
//! elapses or a successful login clears the counter.
//!
//! The in-memory tracker is process-local and resets on restart; a
//! multi-instance deployment needs a shared [`LoginAttemptStore`]
//! (see the `redis` feature of `rigstock-infra`).

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

/// Failures allowed inside one window before the account locks.
pub const MAX_FAILED_ATTEMPTS: u32 = 5;

/// Length of the lockout window in seconds.
pub const LOCKOUT_WINDOW_SECS: i64 = 900;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockoutPolicy {
    pub max_attempts: u32,
    pub window: Duration,
}

impl Default for LockoutPolicy {
    fn default() -> Self {
        Self {
            max_attempts: MAX_FAILED_ATTEMPTS,
            window: Duration::seconds(LOCKOUT_WINDOW_SECS),
        }
    }
}

/// Counter of failed logins keyed by username.
#[async_trait]
pub trait LoginAttemptStore: Send + Sync {
    /// Whether the username is currently locked out.
    async fn is_locked(&self, username: &str, now: DateTime<Utc>) -> bool;

    /// Record one failure and return the failure count within the current window.
    async fn record_failure(&self, username: &str, now: DateTime<Utc>) -> u32;

    /// Forget all failures for the username (successful login).
    async fn clear(&self, username: &str);
}

#[derive(Debug, Clone, Copy)]
struct Attempts {
    count: u32,
    first_failure: DateTime<Utc>,
}

/// Process-local lockout tracker.
#[derive(Debug, Default)]
pub struct InMemoryLoginAttempts {
    policy: LockoutPolicy,
    inner: Mutex<HashMap<String, Attempts>>,
}

impl InMemoryLoginAttempts {
    pub fn new(policy: LockoutPolicy) -> Self {
        Self {
            policy,
            inner: Mutex::new(HashMap::new()),
        }
    }

    fn window_open(&self, attempts: &Attempts, now: DateTime<Utc>) -> bool {
        now - attempts.first_failure < self.policy.window
    }

    fn table(&self) -> MutexGuard<'_, HashMap<String, Attempts>> {
        self.inner.lock().unwrap_or_else(|poisoned| {
            tracing::error!("login attempt table lock poisoned; recovering");
            PoisonError::into_inner(poisoned)
        })
    }
}

#[async_trait]
impl LoginAttemptStore for InMemoryLoginAttempts {
    async fn is_locked(&self, username: &str, now: DateTime<Utc>) -> bool {
        let mut map = self.table();
        let Some(attempts) = map.get(username).copied() else {
            return false;
        };
        if !self.window_open(&attempts, now) {
            map.remove(username);
            return false;
        }
        attempts.count >= self.policy.max_attempts
    }

    async fn record_failure(&self, username: &str, now: DateTime<Utc>) -> u32 {
        let mut map = self.table();
        // Only failures inside an open window are kept.
        map.retain(|_, a| self.window_open(a, now));
        let fresh = Attempts {
            count: 0,
            first_failure: now,
        };
        let entry = map.entry(username.to_string()).or_insert(fresh);
        entry.count += 1;
        entry.count
    }

    async fn clear(&self, username: &str) {
        self.table().remove(username);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn locks_after_max_failures_within_window() {
        let tracker = InMemoryLoginAttempts::default();
        let t0 = Utc::now();

        for i in 1..=4 {
            assert_eq!(tracker.record_failure("op", t0 + Duration::seconds(i)).await, i as u32);
            assert!(!tracker.is_locked("op", t0 + Duration::seconds(i)).await);
        }
        assert_eq!(tracker.record_failure("op", t0 + Duration::seconds(5)).await, 5);
        assert!(tracker.is_locked("op", t0 + Duration::seconds(6)).await);
        assert!(tracker.is_locked("op", t0 + Duration::seconds(899)).await);
    }

    #[tokio::test]
    async fn lock_lifts_when_window_elapses() {
        let tracker = InMemoryLoginAttempts::default();
        let t0 = Utc::now();
        for _ in 0..5 {
            tracker.record_failure("op", t0).await;
        }
        assert!(tracker.is_locked("op", t0).await);
        assert!(!tracker.is_locked("op", t0 + Duration::seconds(900)).await);

        // A failure after expiry starts a new window.
        assert_eq!(tracker.record_failure("op", t0 + Duration::seconds(901)).await, 1);
    }

    #[tokio::test]
    async fn clear_resets_counter() {
        let tracker = InMemoryLoginAttempts::default();
        let now = Utc::now();
        for _ in 0..5 {
            tracker.record_failure("op", now).await;
        }
        tracker.clear("op").await;
        assert!(!tracker.is_locked("op", now).await);
        assert_eq!(tracker.record_failure("op", now).await, 1);
    }

    #[tokio::test]
    async fn expired_entries_are_pruned() {
        let tracker = InMemoryLoginAttempts::default();
        let t0 = Utc::now();
        for i in 0..1_000 {
            tracker.record_failure(&format!("ghost{i}"), t0).await;
        }
        assert_eq!(tracker.table().len(), 1_000);

        let later = t0 + Duration::days(30);
        assert_eq!(tracker.record_failure("op", later).await, 1);
        assert_eq!(tracker.table().len(), 1);

        tracker.record_failure("ghost0", t0).await;
        assert!(!tracker.is_locked("ghost0", later).await);
        assert_eq!(tracker.table().len(), 1);
    }

    #[tokio::test]
    async fn poisoned_table_keeps_counting() {
        let tracker = std::sync::Arc::new(InMemoryLoginAttempts::default());
        let now = Utc::now();
        for _ in 0..5 {
            tracker.record_failure("op", now).await;
        }
        let poisoner = tracker.clone();
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.inner.lock().unwrap();
            panic!("poison");
        })
        .join();
        assert!(tracker.inner.is_poisoned());

        assert!(tracker.is_locked("op", now).await);
        assert_eq!(tracker.record_failure("op", now).await, 6);
    }

    #[tokio::test]
    async fn usernames_are_tracked_independently() {
        let tracker = InMemoryLoginAttempts::default();
        let now = Utc::now();
        for _ in 0..5 {
            tracker.record_failure("a", now).await;
        }
        assert!(tracker.is_locked("a", now).await);
        assert!(!tracker.is_locked("b", now).await);
    }
}
