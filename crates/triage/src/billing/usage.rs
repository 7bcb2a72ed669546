//! Per-user daily usage ledger
//!
//! Backed by a single JSON document keyed by user id, then by ISO date:
//!
//! ```json
//! { "<user_id>": { "<YYYY-MM-DD>": { "user_id": "...", "emails_processed": 3, ... } } }
//! ```
//!
//! Every mutation rewrites the whole file. Concurrent writers are not
//! coordinated, so simultaneous `record_usage` calls from different processes
//! can lose increments.

use chrono::{DateTime, Local, NaiveDate};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::plans::{PlanLimits, PlanType};
use crate::clock::{Clock, SystemClock};
use crate::error::StoreResult;
use crate::store;

/// Default ledger filename inside the data directory
pub const USAGE_FILE: &str = "usage.json";

/// One user's processing count for one calendar day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageRecord {
    pub user_id: String,
    /// Calendar day, `YYYY-MM-DD`
    pub date: String,
    pub emails_processed: u64,
    pub daily_limit: u64,
    pub plan_type: PlanType,
    #[serde(with = "crate::timestamp")]
    pub created_at: DateTime<Local>,
    #[serde(with = "crate::timestamp")]
    pub updated_at: DateTime<Local>,
}

impl UsageRecord {
    /// A zero-usage record for the given day
    pub fn new(
        user_id: impl Into<String>,
        date: NaiveDate,
        plan_type: PlanType,
        daily_limit: u64,
        now: DateTime<Local>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            date: date_key(date),
            emails_processed: 0,
            daily_limit,
            plan_type,
            created_at: now,
            updated_at: now,
        }
    }

    /// Emails still allowed today
    pub fn remaining(&self) -> u64 {
        self.daily_limit.saturating_sub(self.emails_processed)
    }

    pub fn is_exhausted(&self) -> bool {
        self.emails_processed >= self.daily_limit
    }
}

/// On-disk shape: user id -> date -> record
pub type UsageDocument = BTreeMap<String, BTreeMap<String, UsageRecord>>;

/// Tracks emails processed per user per day against plan limits
pub struct UsageLedger {
    path: PathBuf,
    limits: PlanLimits,
    clock: Arc<dyn Clock>,
}

impl UsageLedger {
    /// Open a ledger at `path` using the system clock
    ///
    /// The file is not touched until the first write.
    pub fn new(path: impl Into<PathBuf>, limits: PlanLimits) -> Self {
        Self::with_clock(path, limits, Arc::new(SystemClock))
    }

    pub fn with_clock(path: impl Into<PathBuf>, limits: PlanLimits, clock: Arc<dyn Clock>) -> Self {
        Self {
            path: path.into(),
            limits,
            clock,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn limits(&self) -> &PlanLimits {
        &self.limits
    }

    /// Add `emails_processed` to today's count for a user
    ///
    /// Creates today's record on first use with the plan's limit (or the
    /// unlimited sentinel for admins). The plan of an existing record is not
    /// changed. Returns the updated record.
    pub fn record_usage(
        &self,
        user_id: &str,
        plan_type: PlanType,
        emails_processed: u64,
        is_admin: bool,
    ) -> StoreResult<UsageRecord> {
        let mut ledger = self.load();
        let now = self.clock.now();
        let today = self.clock.today();
        let limit = self.limits.effective_limit(plan_type, is_admin);

        let record = ledger
            .entry(user_id.to_string())
            .or_default()
            .entry(date_key(today))
            .or_insert_with(|| {
                debug!("Starting usage record for {} on {}", user_id, today);
                UsageRecord::new(user_id, today, plan_type, limit, now)
            });

        record.emails_processed = record.emails_processed.saturating_add(emails_processed);
        if record.daily_limit == 0 {
            record.daily_limit = limit;
        }
        record.updated_at = now;
        let record = record.clone();

        store::write_json(&self.path, &ledger)?;

        info!(
            "Recorded {} emails for {} ({}/{} today)",
            emails_processed, user_id, record.emails_processed, record.daily_limit
        );
        Ok(record)
    }

    /// Today's record for a user
    ///
    /// Missing records are synthesized with zero usage and the free plan's
    /// limit; they are not written to disk.
    pub fn get_usage_for_today(&self, user_id: &str, is_admin: bool) -> UsageRecord {
        let today = self.clock.today();

        let stored = self
            .load()
            .remove(user_id)
            .and_then(|mut days| days.remove(&date_key(today)));

        match stored {
            Some(mut record) => {
                if is_admin {
                    record.daily_limit = self.limits.effective_limit(record.plan_type, true);
                }
                record
            }
            None => UsageRecord::new(
                user_id,
                today,
                PlanType::Free,
                self.limits.effective_limit(PlanType::Free, is_admin),
                self.clock.now(),
            ),
        }
    }

    /// Whether the user is still under today's limit
    pub fn can_process_more(&self, user_id: &str, is_admin: bool) -> bool {
        if is_admin {
            return true;
        }
        !self.get_usage_for_today(user_id, false).is_exhausted()
    }

    /// Emails the user may still process today
    pub fn remaining_today(&self, user_id: &str, is_admin: bool) -> u64 {
        self.get_usage_for_today(user_id, is_admin).remaining()
    }

    /// All stored records for a user, oldest day first
    pub fn history(&self, user_id: &str) -> Vec<UsageRecord> {
        self.load()
            .remove(user_id)
            .map(|days| days.into_values().collect())
            .unwrap_or_default()
    }

    fn load(&self) -> UsageDocument {
        store::load_or_default(&self.path)
    }
}

fn date_key(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}
