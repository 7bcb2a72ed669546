//! Plans, subscriptions, and the daily usage ledger
//!
//! Each store is a single JSON file rewritten on every mutation.

mod plans;
mod subscriptions;
mod usage;

pub use plans::{
    PlanLimits, PlanType, SubscriptionPlan, UNLIMITED_DAILY_LIMIT, UnknownPlan, plan,
    plan_catalog, plan_for_price_id,
};
pub use subscriptions::{
    BillingEvent, SUBSCRIPTIONS_FILE, StatusUpdate, SubscriptionStatus, SubscriptionStore,
    UserSubscription,
};
pub use usage::{USAGE_FILE, UsageDocument, UsageLedger, UsageRecord};
