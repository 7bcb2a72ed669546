//! Sliding-window token budget for LLM calls
//!
//! Usage entries from the last minute are persisted so separate runs of the
//! pipeline share one budget.

use chrono::{DateTime, Local, TimeDelta};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::clock::{Clock, SystemClock};
use crate::error::StoreResult;
use crate::store;

/// Default window filename inside the data directory
pub const RATE_LIMIT_FILE: &str = "rate_limiter_usage.json";

/// Default tokens allowed per minute
pub const DEFAULT_MAX_TOKENS_PER_MINUTE: u64 = 20_000;

/// Share of the budget above which new requests are discouraged
const HEADROOM_RATIO: f64 = 0.8;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct WindowEntry {
    #[serde(with = "crate::timestamp")]
    timestamp: DateTime<Local>,
    tokens: u64,
}

/// Snapshot of the current window
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RateLimitStats {
    pub current_usage: u64,
    pub max_limit: u64,
    pub percentage_used: f64,
    pub requests_in_window: usize,
    /// Usage is below 80% of the budget
    pub can_make_request: bool,
}

/// Token budget over a one-minute sliding window
pub struct TokenRateLimiter {
    path: PathBuf,
    max_tokens_per_minute: u64,
    clock: Arc<dyn Clock>,
}

impl TokenRateLimiter {
    pub fn new(path: impl Into<PathBuf>, max_tokens_per_minute: u64) -> Self {
        Self::with_clock(path, max_tokens_per_minute, Arc::new(SystemClock))
    }

    pub fn with_clock(
        path: impl Into<PathBuf>,
        max_tokens_per_minute: u64,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            path: path.into(),
            max_tokens_per_minute,
            clock,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Tokens used in the last minute
    pub fn current_usage(&self) -> u64 {
        total_tokens(&self.window())
    }

    pub fn can_make_request(&self, estimated_tokens: u64) -> bool {
        self.current_usage().saturating_add(estimated_tokens) <= self.max_tokens_per_minute
    }

    /// How long to wait before `estimated_tokens` fit in the budget
    ///
    /// Returns `None` when the request fits now. Otherwise the wait lasts until
    /// the oldest entry leaves the window.
    pub fn wait_time(&self, estimated_tokens: u64) -> Option<Duration> {
        let window = self.window();
        if total_tokens(&window).saturating_add(estimated_tokens) <= self.max_tokens_per_minute {
            return None;
        }

        let oldest = window.iter().map(|e| e.timestamp).min()?;
        let wait_until = oldest + TimeDelta::minutes(1);
        (wait_until - self.clock.now())
            .to_std()
            .ok()
            .filter(|d| !d.is_zero())
    }

    /// Block the current thread until the request fits
    pub fn wait_if_needed(&self, estimated_tokens: u64) {
        if let Some(wait) = self.wait_time(estimated_tokens) {
            info!(
                "Rate limit protection: waiting {:.1} seconds",
                wait.as_secs_f64()
            );
            std::thread::sleep(wait);
        }
    }

    /// Add a usage entry stamped now
    pub fn record_usage(&self, tokens_used: u64) -> StoreResult<()> {
        let mut window = self.window();
        window.push(WindowEntry {
            timestamp: self.clock.now(),
            tokens: tokens_used,
        });
        store::write_json(&self.path, &window)
    }

    pub fn stats(&self) -> RateLimitStats {
        let window = self.window();
        let current_usage = total_tokens(&window);
        let percentage_used = if self.max_tokens_per_minute == 0 {
            100.0
        } else {
            current_usage as f64 / self.max_tokens_per_minute as f64 * 100.0
        };

        if percentage_used >= 100.0 {
            warn!("Token budget exhausted for this minute ({current_usage} tokens)");
        }

        RateLimitStats {
            current_usage,
            max_limit: self.max_tokens_per_minute,
            percentage_used,
            requests_in_window: window.len(),
            can_make_request: (current_usage as f64)
                < self.max_tokens_per_minute as f64 * HEADROOM_RATIO,
        }
    }

    /// Entries from the last minute
    fn window(&self) -> Vec<WindowEntry> {
        let cutoff = self.clock.now() - TimeDelta::minutes(1);
        let entries: Vec<WindowEntry> = store::load_or_default(&self.path);
        entries.into_iter().filter(|e| e.timestamp > cutoff).collect()
    }
}

fn total_tokens(window: &[WindowEntry]) -> u64 {
    window
        .iter()
        .fold(0u64, |total, e| total.saturating_add(e.tokens))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use tempfile::TempDir;

    fn limiter(dir: &TempDir, max: u64) -> (TokenRateLimiter, Arc<FixedClock>) {
        let clock = Arc::new(FixedClock::new(Local::now()));
        let limiter =
            TokenRateLimiter::with_clock(dir.path().join(RATE_LIMIT_FILE), max, clock.clone());
        (limiter, clock)
    }

    #[test]
    fn test_empty_window() {
        let dir = TempDir::new().unwrap();
        let (limiter, _) = limiter(&dir, 1000);

        assert_eq!(limiter.current_usage(), 0);
        assert!(limiter.can_make_request(1000));
        assert!(!limiter.can_make_request(1001));
        assert_eq!(limiter.wait_time(500), None);
    }

    #[test]
    fn test_usage_accumulates_within_window() {
        let dir = TempDir::new().unwrap();
        let (limiter, clock) = limiter(&dir, 1000);

        limiter.record_usage(300).unwrap();
        clock.advance(TimeDelta::seconds(10));
        limiter.record_usage(400).unwrap();

        assert_eq!(limiter.current_usage(), 700);
        assert!(limiter.can_make_request(300));
        assert!(!limiter.can_make_request(301));
    }

    #[test]
    fn test_old_entries_leave_window() {
        let dir = TempDir::new().unwrap();
        let (limiter, clock) = limiter(&dir, 1000);

        limiter.record_usage(900).unwrap();
        clock.advance(TimeDelta::seconds(61));
        assert_eq!(limiter.current_usage(), 0);
    }

    #[test]
    fn test_wait_time_until_oldest_expires() {
        let dir = TempDir::new().unwrap();
        let (limiter, clock) = limiter(&dir, 1000);

        limiter.record_usage(600).unwrap();
        clock.advance(TimeDelta::seconds(20));
        limiter.record_usage(300).unwrap();

        let wait = limiter.wait_time(200).unwrap();
        assert_eq!(wait, Duration::from_secs(40));
        assert_eq!(limiter.wait_time(100), None);
    }

    #[test]
    fn test_huge_estimates_do_not_overflow() {
        let dir = TempDir::new().unwrap();
        let (limiter, _) = limiter(&dir, 1000);

        assert!(!limiter.can_make_request(u64::MAX));
        assert_eq!(limiter.wait_time(u64::MAX), None);

        limiter.record_usage(500).unwrap();
        limiter.record_usage(u64::MAX).unwrap();
        assert_eq!(limiter.current_usage(), u64::MAX);
        assert!(!limiter.can_make_request(u64::MAX));
        assert!(limiter.wait_time(u64::MAX).is_some());
        assert!(!limiter.stats().can_make_request);
    }

    #[test]
    fn test_stats() {
        let dir = TempDir::new().unwrap();
        let (limiter, _) = limiter(&dir, 1000);

        limiter.record_usage(500).unwrap();
        let stats = limiter.stats();
        assert_eq!(stats.current_usage, 500);
        assert_eq!(stats.max_limit, 1000);
        assert_eq!(stats.requests_in_window, 1);
        assert!((stats.percentage_used - 50.0).abs() < f64::EPSILON);
        assert!(stats.can_make_request);

        limiter.record_usage(300).unwrap();
        assert!(!limiter.stats().can_make_request);
    }
}
