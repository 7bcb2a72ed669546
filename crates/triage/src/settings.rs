//! Runtime settings for the triage stores
//!
//! Loaded from (in order of priority):
//! 1. Environment variables (`TRIAGE_DATA_DIR`, `TRIAGE_MAX_TOKENS_PER_MINUTE`)
//! 2. `settings.json` in the config directory
//! 3. Built-in defaults

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::billing::{PlanLimits, SUBSCRIPTIONS_FILE, USAGE_FILE};
use crate::rate_limit::{DEFAULT_MAX_TOKENS_PER_MINUTE, RATE_LIMIT_FILE};
use crate::search::DEFAULT_MAX_EMAILS;

/// Settings filename in the config directory
pub const SETTINGS_FILE: &str = "settings.json";

const DATA_DIR_ENV: &str = "TRIAGE_DATA_DIR";
const MAX_TOKENS_ENV: &str = "TRIAGE_MAX_TOKENS_PER_MINUTE";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Directory holding the usage, subscription, and tracking files
    pub data_dir: PathBuf,
    pub plan_limits: PlanLimits,
    /// Users who bypass the daily limit
    pub admin_users: Vec<String>,
    pub max_tokens_per_minute: u64,
    pub tracking_retention_days: i64,
    pub default_max_emails: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_dir: config::config_dir().unwrap_or_else(|| PathBuf::from(".")),
            plan_limits: PlanLimits::default(),
            admin_users: Vec::new(),
            max_tokens_per_minute: DEFAULT_MAX_TOKENS_PER_MINUTE,
            tracking_retention_days: 30,
            default_max_emails: DEFAULT_MAX_EMAILS,
        }
    }
}

impl Settings {
    /// Load settings from the config directory, then apply environment overrides
    pub fn load() -> Result<Self> {
        let settings = if config::config_exists(SETTINGS_FILE) {
            config::load_json(SETTINGS_FILE)?
        } else {
            log::debug!("No {} found, using defaults", SETTINGS_FILE);
            Self::default()
        };
        settings.with_env_overrides()
    }

    /// Load settings from a specific JSON file, then apply environment overrides
    pub fn from_file(path: &Path) -> Result<Self> {
        let settings: Self = config::load_json_file(path)?;
        settings.with_env_overrides()
    }

    /// Parse settings from a JSON string (no environment overrides)
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Failed to parse settings JSON")
    }

    fn with_env_overrides(mut self) -> Result<Self> {
        if let Some(dir) = std::env::var_os(DATA_DIR_ENV).filter(|v| !v.is_empty()) {
            self.data_dir = PathBuf::from(dir);
        }
        if let Ok(max) = std::env::var(MAX_TOKENS_ENV) {
            self.max_tokens_per_minute = max
                .trim()
                .parse()
                .with_context(|| format!("{MAX_TOKENS_ENV} must be a number, got {max:?}"))?;
        }
        Ok(self)
    }

    pub fn is_admin(&self, user_id: &str) -> bool {
        self.admin_users.iter().any(|u| u == user_id)
    }

    pub fn usage_path(&self) -> PathBuf {
        self.data_dir.join(USAGE_FILE)
    }

    pub fn subscriptions_path(&self) -> PathBuf {
        self.data_dir.join(SUBSCRIPTIONS_FILE)
    }

    pub fn rate_limit_path(&self) -> PathBuf {
        self.data_dir.join(RATE_LIMIT_FILE)
    }
}
