//! Processed-email tracking to avoid handling the same message twice
//!
//! Each user gets one JSON file under `<data_dir>/tracking/`. The tracker keeps
//! the document in memory and rewrites the file after every mutation.

use chrono::{DateTime, Local, TimeDelta};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::clock::{Clock, SystemClock};
use crate::error::StoreResult;
use crate::store;
use crate::timestamp;

/// Subdirectory of the data directory holding tracking files
pub const TRACKING_DIR: &str = "tracking";

/// When and how an email was processed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessedEntry {
    /// Kept as a string so one bad timestamp cannot invalidate the whole file
    pub processed_at: String,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl ProcessedEntry {
    fn processed_at(&self) -> Option<DateTime<Local>> {
        timestamp::parse(&self.processed_at)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct TrackingCounters {
    total_processed: u64,
    duplicates_skipped: u64,
    #[serde(default, with = "crate::timestamp::option")]
    last_cleanup: Option<DateTime<Local>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct TrackingDocument {
    user_id: String,
    processed_emails: BTreeMap<String, ProcessedEntry>,
    #[serde(default, with = "crate::timestamp::option")]
    last_updated: Option<DateTime<Local>>,
    statistics: TrackingCounters,
}

impl TrackingDocument {
    fn empty(user_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            ..Self::default()
        }
    }
}

/// Summary of a user's tracking file
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackingStats {
    pub user_id: String,
    /// Entries currently held
    pub total_tracked: usize,
    /// Distinct emails ever marked, including ones since cleaned up
    pub total_processed: u64,
    pub duplicates_skipped: u64,
    pub last_updated: Option<DateTime<Local>>,
    pub last_cleanup: Option<DateTime<Local>>,
}

/// Remembers which email ids a user has already processed
pub struct ProcessedEmailTracker {
    path: PathBuf,
    data: TrackingDocument,
    clock: Arc<dyn Clock>,
}

impl ProcessedEmailTracker {
    /// Open the tracker for `user_id`, stored under `<data_dir>/tracking/`
    pub fn open(data_dir: &Path, user_id: &str) -> Self {
        Self::open_with_clock(data_dir, user_id, Arc::new(SystemClock))
    }

    pub fn open_with_clock(data_dir: &Path, user_id: &str, clock: Arc<dyn Clock>) -> Self {
        let path = tracking_path(data_dir, user_id);
        let mut data: TrackingDocument = store::load_or_default(&path);
        if data.user_id.is_empty() {
            data = TrackingDocument {
                user_id: user_id.to_string(),
                ..data
            };
        }
        debug!(
            "Loaded {} tracked emails for {}",
            data.processed_emails.len(),
            user_id
        );
        Self { path, data, clock }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_processed(&self, email_id: &str) -> bool {
        self.data.processed_emails.contains_key(email_id)
    }

    /// Mark one email as processed
    pub fn mark_processed(
        &mut self,
        email_id: &str,
        metadata: Option<serde_json::Map<String, serde_json::Value>>,
    ) -> StoreResult<()> {
        self.mark_batch_processed(&[email_id], metadata)
    }

    /// Mark several emails as processed with one timestamp and one write
    pub fn mark_batch_processed<S: AsRef<str>>(
        &mut self,
        email_ids: &[S],
        metadata: Option<serde_json::Map<String, serde_json::Value>>,
    ) -> StoreResult<()> {
        let timestamp = self.clock.now().to_rfc3339();
        let metadata = metadata.unwrap_or_default();

        for email_id in email_ids {
            let email_id: &str = email_id.as_ref();
            let entry = ProcessedEntry {
                processed_at: timestamp.clone(),
                metadata: metadata.clone(),
            };
            let previous = self
                .data
                .processed_emails
                .insert(email_id.to_string(), entry);
            if previous.is_none() {
                self.data.statistics.total_processed += 1;
            }
        }

        self.save()
    }

    /// Keep only ids that have not been processed, counting the rest as skipped duplicates
    pub fn filter_unprocessed<S: AsRef<str>>(
        &mut self,
        email_ids: &[S],
    ) -> StoreResult<Vec<String>> {
        let (seen, fresh): (Vec<&str>, Vec<&str>) = email_ids
            .iter()
            .map(|id| AsRef::<str>::as_ref(id))
            .partition(|id| self.is_processed(id));

        if !seen.is_empty() {
            self.data.statistics.duplicates_skipped += seen.len() as u64;
            debug!("Skipping {} already processed emails", seen.len());
            self.save()?;
        }

        Ok(fresh.into_iter().map(String::from).collect())
    }

    /// Drop entries older than `days_to_keep` days
    ///
    /// Entries whose timestamp cannot be parsed are dropped too. Returns the
    /// number of entries removed.
    pub fn cleanup_older_than(&mut self, days_to_keep: i64) -> StoreResult<usize> {
        let now = self.clock.now();
        let cutoff = now - TimeDelta::days(days_to_keep);

        let before = self.data.processed_emails.len();
        self.data
            .processed_emails
            .retain(|_, entry| entry.processed_at().is_some_and(|ts| ts >= cutoff));
        let removed = before - self.data.processed_emails.len();

        if removed > 0 {
            self.data.statistics.last_cleanup = Some(now);
            self.save()?;
            info!(
                "Removed {} tracking entries older than {} days for {}",
                removed, days_to_keep, self.data.user_id
            );
        }

        Ok(removed)
    }

    pub fn statistics(&self) -> TrackingStats {
        TrackingStats {
            user_id: self.data.user_id.clone(),
            total_tracked: self.data.processed_emails.len(),
            total_processed: self.data.statistics.total_processed,
            duplicates_skipped: self.data.statistics.duplicates_skipped,
            last_updated: self.data.last_updated,
            last_cleanup: self.data.statistics.last_cleanup,
        }
    }

    /// Forget everything tracked for this user
    pub fn reset(&mut self) -> StoreResult<()> {
        self.data = TrackingDocument::empty(&self.data.user_id);
        self.save()
    }

    /// Ids processed at or after `since`
    pub fn processed_since(&self, since: DateTime<Local>) -> Vec<String> {
        self.data
            .processed_emails
            .iter()
            .filter(|(_, entry)| entry.processed_at().is_some_and(|ts| ts >= since))
            .map(|(id, _)| id.clone())
            .collect()
    }

    fn save(&mut self) -> StoreResult<()> {
        self.data.last_updated = Some(self.clock.now());
        store::write_json(&self.path, &self.data)
    }
}

/// `<data_dir>/tracking/email_tracking_<user_id>.json`
///
/// Characters outside `[A-Za-z0-9@._+-]` become `_`, so ids with path
/// separators stay inside the tracking directory.
fn tracking_path(data_dir: &Path, user_id: &str) -> PathBuf {
    let safe_id: String = user_id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || "@._+-".contains(c) {
                c
            } else {
                '_'
            }
        })
        .collect();
    data_dir
        .join(TRACKING_DIR)
        .join(format!("email_tracking_{safe_id}.json"))
}
