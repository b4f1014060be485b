use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;

/// Calls allowed per bucket in one wall-clock second.
pub const DEFAULT_CALLS_PER_SECOND: u32 = 5;

/// How long an over-budget caller waits before going ahead anyway.
pub const THROTTLE_PAUSE: Duration = Duration::from_millis(200);

/// Fixed-window limiter keyed by bucket name and the current unix second.
///
/// Callers over budget are slowed down, never rejected.
#[derive(Clone)]
pub struct SearchRateLimiter {
    inner: Arc<Mutex<RateLimiterInner>>,
    max_per_second: u32,
    pause: Duration,
}

struct RateLimiterInner {
    // bucket -> (window second, calls seen in that window)
    windows: HashMap<String, (i64, u32)>,
}

impl SearchRateLimiter {
    pub fn new(max_per_second: u32) -> Self {
        Self::with_pause(max_per_second, THROTTLE_PAUSE)
    }

    pub fn with_pause(max_per_second: u32, pause: Duration) -> Self {
        Self {
            inner: Arc::new(Mutex::new(RateLimiterInner {
                windows: HashMap::new(),
            })),
            max_per_second,
            pause,
        }
    }

    /// Count one call in `bucket` for the window `now_secs`.
    /// Returns false when the call exceeds the per-second budget.
    pub async fn record(&self, bucket: &str, now_secs: i64) -> bool {
        let mut inner = self.inner.lock().await;

        // Drop windows that can no longer be hit.
        inner.windows.retain(|_, (second, _)| *second >= now_secs);

        let window = inner
            .windows
            .entry(bucket.to_string())
            .or_insert((now_secs, 0));
        if window.0 < now_secs {
            *window = (now_secs, 0);
        }
        window.1 += 1;
        window.1 <= self.max_per_second
    }

    /// Count a call against `bucket`, pausing briefly when over budget.
    pub async fn throttle(&self, bucket: &str) {
        let now_secs = chrono::Utc::now().timestamp();
        if !self.record(bucket, now_secs).await {
            tracing::debug!(bucket, pause_ms = self.pause.as_millis() as u64, "rate limited, pausing");
            tokio::time::sleep(self.pause).await;
        }
    }
}

impl Default for SearchRateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_CALLS_PER_SECOND)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn budget_is_per_second() {
        let limiter = SearchRateLimiter::new(5);
        for _ in 0..5 {
            assert!(limiter.record("movie", 100).await);
        }
        assert!(!limiter.record("movie", 100).await);
        assert!(!limiter.record("movie", 100).await);

        // Next second starts a fresh window.
        assert!(limiter.record("movie", 101).await);
    }

    #[tokio::test]
    async fn buckets_are_independent() {
        let limiter = SearchRateLimiter::new(1);
        assert!(limiter.record("movie", 7).await);
        assert!(!limiter.record("movie", 7).await);
        assert!(limiter.record("tv", 7).await);
    }

    #[tokio::test]
    async fn throttle_never_rejects() {
        let limiter = SearchRateLimiter::with_pause(1, Duration::from_millis(1));
        for _ in 0..3 {
            limiter.throttle("movie").await;
        }
    }
}
