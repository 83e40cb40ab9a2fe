// src/ratelimit/mod.rs
use crate::types::RateLimitConfig;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::debug;

/// One fixed window per observed client key. The window resets wholesale at
/// its boundary, not per-request, so a burst of `max_requests` at the start
/// of a window followed by one more is rejected even though a sliding window
/// might allow it. Worst case straddling two windows admits up to 2x max.
#[derive(Debug, Clone)]
struct RateWindow {
    count: u32,
    window_started: Instant,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RateDecision {
    Allowed {
        remaining: u32,
    },
    Rejected {
        retry_after_seconds: u64,
        limit: u32,
        reset_at: DateTime<Utc>,
    },
}

/// Fixed-window inbound rate limiter, one counter per client key.
#[derive(Debug)]
pub struct RateLimiter {
    windows: Mutex<HashMap<String, RateWindow>>,
    max_requests: u32,
    window: Duration,
    reclaim_after: Duration,
}

impl RateLimiter {
    pub fn new(config: &RateLimitConfig) -> Self {
        Self {
            windows: Mutex::new(HashMap::new()),
            max_requests: config.max_requests,
            window: Duration::from_millis(config.window_ms),
            reclaim_after: Duration::from_millis(
                config.window_ms * config.reclaim_after_windows.max(1) as u64,
            ),
        }
    }

    /// Check-and-count in one critical section: a request that would exceed
    /// the window budget is rejected and not counted.
    pub async fn check(&self, client_key: &str) -> RateDecision {
        let now = Instant::now();
        let mut windows = self.windows.lock().await;

        let window = windows
            .entry(client_key.to_string())
            .or_insert_with(|| RateWindow {
                count: 0,
                window_started: now,
            });

        if now.duration_since(window.window_started) >= self.window {
            window.count = 0;
            window.window_started = now;
        }

        if window.count < self.max_requests {
            window.count += 1;
            RateDecision::Allowed {
                remaining: self.max_requests - window.count,
            }
        } else {
            let remaining = self
                .window
                .saturating_sub(now.duration_since(window.window_started));
            let retry_after_seconds = remaining.as_secs_f64().ceil() as u64;
            debug!(
                client = client_key,
                retry_after_seconds, "request rejected by inbound rate limit"
            );
            RateDecision::Rejected {
                retry_after_seconds,
                limit: self.max_requests,
                reset_at: Utc::now() + chrono::Duration::milliseconds(remaining.as_millis() as i64),
            }
        }
    }

    /// Drop windows that have been idle long enough that keeping the counter
    /// around no longer changes any decision.
    pub async fn reclaim_stale(&self) {
        let now = Instant::now();
        let mut windows = self.windows.lock().await;
        windows.retain(|_, w| now.duration_since(w.window_started) < self.reclaim_after);
    }

    pub async fn tracked_clients(&self) -> usize {
        self.windows.lock().await.len()
    }
}
