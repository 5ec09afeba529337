use std::time::{Duration, Instant};

use dashmap::DashMap;

/// Per-username login brute force limiter.
pub struct LoginRateLimiter {
    /// username -> (failed_count, window_start)
    entries: DashMap<String, (u32, Instant)>,
    max_failures: u32,
    window: Duration,
}

impl LoginRateLimiter {
    /// 5 failures per 15 minutes.
    pub fn new() -> Self {
        Self::with_limits(5, Duration::from_secs(15 * 60))
    }

    pub fn with_limits(max_failures: u32, window: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            max_failures,
            window,
        }
    }

    /// Returns the seconds until the next attempt is allowed when locked out.
    /// Does NOT increment the counter, call `record_failure()` on a bad password.
    pub fn check(&self, username: &str) -> Result<(), u64> {
        let now = Instant::now();
        let Some(entry) = self.entries.get(&username.to_lowercase()) else {
            return Ok(());
        };

        let (count, start) = entry.value();
        let elapsed = now.duration_since(*start);
        if elapsed > self.window || *count < self.max_failures {
            return Ok(());
        }

        Err(self.window.saturating_sub(elapsed).as_secs().max(1))
    }

    pub fn record_failure(&self, username: &str) {
        let now = Instant::now();
        let mut entry = self
            .entries
            .entry(username.to_lowercase())
            .or_insert((0, now));
        let (count, start) = entry.value_mut();

        if now.duration_since(*start) > self.window {
            *count = 1;
            *start = now;
        } else {
            *count += 1;
        }
    }

    /// Forget failures after a successful login.
    pub fn reset(&self, username: &str) {
        self.entries.remove(&username.to_lowercase());
    }

    pub fn cleanup(&self) {
        let now = Instant::now();
        let window = self.window;
        self.entries
            .retain(|_, (_, start)| now.duration_since(*start) < window);
    }
}

impl Default for LoginRateLimiter {
    fn default() -> Self {
        Self::new()
    }
}
