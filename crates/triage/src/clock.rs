//! Time source for date-scoped bookkeeping
//!
//! Stores ask a [`Clock`] for "now" and "today" instead of reading the system
//! time directly, so tests can pin the calendar day.

use chrono::{DateTime, Local, NaiveDate, TimeDelta};
use std::sync::RwLock;

/// Source of the current local time
pub trait Clock: Send + Sync {
    /// Current local timestamp
    fn now(&self) -> DateTime<Local>;

    /// Current local calendar day
    fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }
}

/// Wall-clock time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }
}

/// A clock that only moves when told to
#[derive(Debug)]
pub struct FixedClock {
    now: RwLock<DateTime<Local>>,
}

impl FixedClock {
    pub fn new(now: DateTime<Local>) -> Self {
        Self {
            now: RwLock::new(now),
        }
    }

    /// Jump to an absolute time
    pub fn set(&self, now: DateTime<Local>) {
        *self.now.write().unwrap() = now;
    }

    /// Move the clock forward (or backward, for a negative delta)
    pub fn advance(&self, delta: TimeDelta) {
        let mut now = self.now.write().unwrap();
        *now += delta;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Local> {
        *self.now.read().unwrap()
    }
}
