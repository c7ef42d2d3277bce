//! Sliding-window rate limiting for ingestion callers.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// A bounded sliding-window rate limiter keyed by caller identity.
///
/// Each key holds at most `max_requests` timestamps; stale entries are
/// pruned on every [`check`](RateLimiter::check), so memory stays bounded
/// by the number of active keys. Construct one at process start and share
/// it; no teardown is needed beyond process exit.
#[derive(Debug)]
pub struct RateLimiter {
    max_requests: usize,
    window: Duration,
    hits: Mutex<HashMap<String, VecDeque<Instant>>>,
}

impl RateLimiter {
    /// Allow up to `max_requests` per key within each `window`.
    pub fn new(max_requests: usize, window: Duration) -> Self {
        Self { max_requests, window, hits: Mutex::new(HashMap::new()) }
    }

    /// Record a request for `key` and report whether it is allowed.
    ///
    /// Returns `false` when the key already has `max_requests` requests
    /// inside the window; the rejected request is not recorded.
    pub fn check(&self, key: &str) -> bool {
        let now = Instant::now();
        let mut hits = match self.hits.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        // Prune every key so idle callers do not accumulate state.
        hits.retain(|_, timestamps| {
            while timestamps.front().is_some_and(|t| now.duration_since(*t) >= self.window) {
                timestamps.pop_front();
            }
            !timestamps.is_empty()
        });

        let timestamps = hits.entry(key.to_string()).or_default();
        if timestamps.len() >= self.max_requests {
            return false;
        }
        timestamps.push_back(now);
        true
    }
}
