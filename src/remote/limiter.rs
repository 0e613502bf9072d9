//! Per-host connection rate limiting
//!
//! Opening SSH sessions too fast trips sshd's MaxStartups and per-host
//! intrusion detection, so admission to each hostname is bounded: at most
//! `max_per_window` new sessions within any trailing window. The check is a
//! bounded-sleep poll loop rather than a precise token bucket; session setup
//! cost dominates, so coarse granularity is acceptable. One mutex guards all
//! hosts' windows.

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::debug;

/// Rate limiter configuration
#[derive(Debug, Clone)]
pub struct RateLimiterConfig {
    /// Maximum admissions per host within the window
    pub max_per_window: usize,
    /// Trailing window length
    pub window: Duration,
    /// Sleep between re-checks while blocked
    pub poll_interval: Duration,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            max_per_window: 5,
            window: Duration::from_secs(60),
            poll_interval: Duration::from_secs(5),
        }
    }
}

/// Sliding-window admission control, one window per hostname
pub struct RateLimiter {
    config: RateLimiterConfig,
    /// Per-host ring of the most recent admission instants, capped at
    /// `max_per_window` entries
    windows: Mutex<HashMap<String, VecDeque<Instant>>>,
}

impl RateLimiter {
    pub fn new(config: RateLimiterConfig) -> Self {
        Self {
            config,
            windows: Mutex::new(HashMap::new()),
        }
    }

    /// Block until a new session to `hostname` is permitted, then record
    /// the admission.
    pub async fn admit(&self, hostname: &str) {
        loop {
            if self.try_admit(hostname, Instant::now()) {
                return;
            }
            debug!(host = %hostname, "rate limit reached, backing off");
            tokio::time::sleep(self.config.poll_interval).await;
        }
    }

    /// Single admission attempt at time `now`; records the admission on
    /// success. Taking `now` as a parameter keeps the window logic testable
    /// without real sleeps.
    fn try_admit(&self, hostname: &str, now: Instant) -> bool {
        let mut windows = self.windows.lock();
        let window = windows.entry(hostname.to_string()).or_default();

        let clear = window.len() < self.config.max_per_window
            || window
                .front()
                .map_or(true, |oldest| now.duration_since(*oldest) > self.config.window);

        if clear {
            window.push_back(now);
            while window.len() > self.config.max_per_window {
                window.pop_front();
            }
        }
        clear
    }
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────
