//! Fixed-window rate limiting for downloads and uploads.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use modhub_shared::clients::redis::RedisClient;
use modhub_shared::errors::{AppError, AppResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rule {
    pub limit: u64,
    pub window_secs: u64,
}

impl Rule {
    pub fn per_hour(limit: u64) -> Self {
        Self { limit, window_secs: 3600 }
    }

    pub fn per_day(limit: u64) -> Self {
        Self { limit, window_secs: 86_400 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allowed,
    Limited { retry_after_secs: u64 },
}

#[axum::async_trait]
pub trait RateLimiter: Send + Sync {
    async fn hit(&self, key: &str, rule: Rule) -> Decision;
}

/// 429 with the window's remaining seconds once `rule` is exhausted for `key`.
pub async fn enforce(limiter: &dyn RateLimiter, key: &str, rule: Rule) -> AppResult<()> {
    match limiter.hit(key, rule).await {
        Decision::Allowed => Ok(()),
        Decision::Limited { retry_after_secs } => {
            tracing::debug!(key, retry_after_secs, "rate limit exceeded");
            Err(AppError::rate_limited(retry_after_secs))
        }
    }
}

pub fn download_key(subject: &str) -> String {
    format!("rl:download:{subject}")
}

pub fn upload_key(subject: &str) -> String {
    format!("rl:upload:{subject}")
}

/// Shared windows in Redis (`INCR` + `EXPIRE`). Lets requests through when
/// Redis is unreachable.
pub struct RedisRateLimiter {
    client: RedisClient,
}

impl RedisRateLimiter {
    pub fn new(client: RedisClient) -> Self {
        Self { client }
    }
}

#[axum::async_trait]
impl RateLimiter for RedisRateLimiter {
    async fn hit(&self, key: &str, rule: Rule) -> Decision {
        match self.client.window_hit(key, rule.window_secs).await {
            Ok(hit) if hit.count > rule.limit => Decision::Limited { retry_after_secs: hit.ttl_secs },
            Ok(_) => Decision::Allowed,
            Err(e) => {
                tracing::warn!(error = %e, key, "rate limiter unavailable, allowing request");
                Decision::Allowed
            }
        }
    }
}

/// Per-process windows, used when no Redis is configured.
#[derive(Default)]
pub struct LocalRateLimiter {
    windows: Mutex<HashMap<String, Window>>,
}

struct Window {
    started: Instant,
    count: u64,
    length: Duration,
}

impl Window {
    fn expired(&self, now: Instant) -> bool {
        now.duration_since(self.started) >= self.length
    }
}

/// Map size at which `hit` sweeps expired windows before inserting.
const SWEEP_THRESHOLD: usize = 1024;

impl LocalRateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops every window that has run its course.
    pub fn cleanup(&self) {
        let now = Instant::now();
        if let Ok(mut windows) = self.windows.lock() {
            let before = windows.len();
            windows.retain(|_, w| !w.expired(now));
            let dropped = before - windows.len();
            if dropped > 0 {
                tracing::debug!(dropped, remaining = windows.len(), "expired rate limit windows dropped");
            }
        }
    }

    #[cfg(test)]
    fn tracked_keys(&self) -> usize {
        self.windows.lock().map(|w| w.len()).unwrap_or(0)
    }
}

#[axum::async_trait]
impl RateLimiter for LocalRateLimiter {
    async fn hit(&self, key: &str, rule: Rule) -> Decision {
        let length = Duration::from_secs(rule.window_secs);
        let now = Instant::now();

        let Ok(mut windows) = self.windows.lock() else {
            tracing::warn!(key, "rate limiter state poisoned, allowing request");
            return Decision::Allowed;
        };
        if windows.len() >= SWEEP_THRESHOLD && !windows.contains_key(key) {
            windows.retain(|_, w| !w.expired(now));
        }
        let entry = windows
            .entry(key.to_string())
            .or_insert(Window { started: now, count: 0, length });
        if entry.expired(now) {
            *entry = Window { started: now, count: 0, length };
        }
        entry.count += 1;

        if entry.count > rule.limit {
            let left = length.saturating_sub(now.duration_since(entry.started));
            Decision::Limited { retry_after_secs: left.as_secs().max(1) }
        } else {
            Decision::Allowed
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use modhub_shared::errors::ErrorCode;

    #[tokio::test]
    async fn local_window_limits_per_key() {
        let limiter = LocalRateLimiter::new();
        let rule = Rule { limit: 2, window_secs: 60 };

        assert_eq!(limiter.hit("a", rule).await, Decision::Allowed);
        assert_eq!(limiter.hit("a", rule).await, Decision::Allowed);
        match limiter.hit("a", rule).await {
            Decision::Limited { retry_after_secs } => assert!(retry_after_secs <= 60 && retry_after_secs > 0),
            Decision::Allowed => panic!("third hit should be limited"),
        }
        assert_eq!(limiter.hit("b", rule).await, Decision::Allowed);
    }

    #[tokio::test]
    async fn enforce_maps_to_rate_limited_error() {
        let limiter = LocalRateLimiter::new();
        let rule = Rule::per_hour(0);

        let err = enforce(&limiter, &download_key("198.51.100.3"), rule).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::RateLimited);
    }

    #[tokio::test]
    async fn expired_windows_do_not_pile_up() {
        let limiter = LocalRateLimiter::new();
        let rule = Rule { limit: 5, window_secs: 0 };

        for i in 0..10_000 {
            assert_eq!(limiter.hit(&download_key(&format!("10.0.{}.{}", i / 256, i % 256)), rule).await, Decision::Allowed);
        }
        assert!(limiter.tracked_keys() <= SWEEP_THRESHOLD);

        limiter.cleanup();
        assert_eq!(limiter.tracked_keys(), 0);
    }

    #[tokio::test]
    async fn cleanup_keeps_live_windows() {
        let limiter = LocalRateLimiter::new();
        limiter.hit("live", Rule { limit: 1, window_secs: 60 }).await;
        limiter.hit("gone", Rule { limit: 1, window_secs: 0 }).await;

        limiter.cleanup();
        assert_eq!(limiter.tracked_keys(), 1);
        assert!(matches!(
            limiter.hit("live", Rule { limit: 1, window_secs: 60 }).await,
            Decision::Limited { .. }
        ));
    }
}
