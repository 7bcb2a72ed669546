//! Triage crate - bookkeeping for LLM-driven Gmail triage
//!
//! This crate provides the pieces of the triage service that hold state or
//! logic of their own:
//! - Gmail search-string parsing and canonical re-serialization
//! - Subscription plans and per-user subscription records
//! - Daily usage ledger enforcing plan limits
//! - Processed-email tracking to skip duplicates
//! - Sliding-window token budget for model calls
//!
//! All stores are single JSON files rewritten on every mutation, without
//! cross-process locking.

pub mod billing;
pub mod clock;
pub mod error;
pub mod rate_limit;
pub mod search;
pub mod settings;
mod store;
pub mod timestamp;
pub mod tracking;

pub use billing::{
    BillingEvent, PlanLimits, PlanType, StatusUpdate, SubscriptionPlan, SubscriptionStatus,
    SubscriptionStore, UNLIMITED_DAILY_LIMIT, UsageLedger, UsageRecord, UserSubscription,
    plan_catalog,
};
pub use clock::{Clock, FixedClock, SystemClock};
pub use error::{StoreError, StoreResult};
pub use rate_limit::{RateLimitStats, TokenRateLimiter};
pub use search::{ParsedFilter, TypedFilter, parse_search, to_query};
pub use settings::Settings;
pub use tracking::{ProcessedEmailTracker, TrackingStats};
