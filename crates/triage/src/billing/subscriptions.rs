//! User subscriptions persisted as a JSON map keyed by user id
//!
//! Billing-provider calls (customer creation, checkout, cancellation) happen
//! outside this crate. This store only keeps the local record those calls
//! produce and applies the status changes they report.

use chrono::{DateTime, Local};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::plans::{PlanLimits, PlanType, plan, plan_for_price_id};
use crate::clock::{Clock, SystemClock};
use crate::error::StoreResult;
use crate::store;

/// Default subscriptions filename inside the data directory
pub const SUBSCRIPTIONS_FILE: &str = "subscriptions.json";

/// Billing status of a subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Active,
    Canceled,
    PastDue,
    Unpaid,
    Incomplete,
    IncompleteExpired,
    Trialing,
}

/// A user's plan and billing state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserSubscription {
    pub user_id: String,
    pub stripe_customer_id: Option<String>,
    pub stripe_subscription_id: Option<String>,
    pub plan_type: PlanType,
    pub status: SubscriptionStatus,
    #[serde(default, with = "crate::timestamp::option")]
    pub current_period_start: Option<DateTime<Local>>,
    #[serde(default, with = "crate::timestamp::option")]
    pub current_period_end: Option<DateTime<Local>>,
    #[serde(with = "crate::timestamp")]
    pub created_at: DateTime<Local>,
    #[serde(with = "crate::timestamp")]
    pub updated_at: DateTime<Local>,
    #[serde(default, with = "crate::timestamp::option")]
    pub canceled_at: Option<DateTime<Local>>,
    #[serde(default, with = "crate::timestamp::option")]
    pub trial_end: Option<DateTime<Local>>,
}

impl UserSubscription {
    /// New subscription record
    ///
    /// Free plans are active immediately. Paid plans start incomplete until
    /// payment is confirmed through [`SubscriptionStore::apply_event`] or
    /// [`SubscriptionStore::apply_status`].
    pub fn new(user_id: impl Into<String>, plan_type: PlanType, now: DateTime<Local>) -> Self {
        let (status, period_start) = if plan_type.is_paid() {
            (SubscriptionStatus::Incomplete, None)
        } else {
            (SubscriptionStatus::Active, Some(now))
        };

        Self {
            user_id: user_id.into(),
            stripe_customer_id: None,
            stripe_subscription_id: None,
            plan_type,
            status,
            current_period_start: period_start,
            current_period_end: None,
            created_at: now,
            updated_at: now,
            canceled_at: None,
            trial_end: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == SubscriptionStatus::Active
    }

    /// Plan whose limits apply: the subscribed plan while active, otherwise free
    pub fn effective_plan(&self) -> PlanType {
        if self.is_active() {
            self.plan_type
        } else {
            PlanType::Free
        }
    }
}

/// Status change reported by the billing provider
#[derive(Debug, Clone, PartialEq)]
pub struct StatusUpdate {
    pub status: SubscriptionStatus,
    pub current_period_start: Option<DateTime<Local>>,
    pub current_period_end: Option<DateTime<Local>>,
    /// Set when the provider reports a different plan (e.g. by price id)
    pub plan_type: Option<PlanType>,
}

/// Subscription lifecycle event reported by the billing provider
#[derive(Debug, Clone, PartialEq)]
pub enum BillingEvent {
    /// The customer's subscription was created; `price_id` picks the plan
    SubscriptionCreated {
        customer_id: String,
        subscription_id: String,
        status: SubscriptionStatus,
        current_period_start: Option<DateTime<Local>>,
        current_period_end: Option<DateTime<Local>>,
        price_id: Option<String>,
    },
    SubscriptionUpdated {
        subscription_id: String,
        status: SubscriptionStatus,
        current_period_start: Option<DateTime<Local>>,
        current_period_end: Option<DateTime<Local>>,
    },
    /// The subscription ended; the user falls back to the free plan
    SubscriptionDeleted { subscription_id: String },
    /// An invoice was paid. `None` for invoices outside any subscription.
    PaymentSucceeded { subscription_id: Option<String> },
    PaymentFailed { subscription_id: Option<String> },
}

impl BillingEvent {
    fn subscription_id(&self) -> Option<&str> {
        match self {
            BillingEvent::SubscriptionCreated { subscription_id, .. }
            | BillingEvent::SubscriptionUpdated { subscription_id, .. }
            | BillingEvent::SubscriptionDeleted { subscription_id } => Some(subscription_id),
            BillingEvent::PaymentSucceeded { subscription_id }
            | BillingEvent::PaymentFailed { subscription_id } => subscription_id.as_deref(),
        }
    }
}

type SubscriptionDocument = BTreeMap<String, UserSubscription>;

/// JSON-file-backed subscription records
pub struct SubscriptionStore {
    path: PathBuf,
    clock: Arc<dyn Clock>,
}

impl SubscriptionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_clock(path, Arc::new(SystemClock))
    }

    pub fn with_clock(path: impl Into<PathBuf>, clock: Arc<dyn Clock>) -> Self {
        Self {
            path: path.into(),
            clock,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, user_id: &str) -> Option<UserSubscription> {
        self.load().remove(user_id)
    }

    pub fn all(&self) -> Vec<UserSubscription> {
        self.load().into_values().collect()
    }

    /// Insert or replace a user's subscription
    pub fn save(&self, subscription: UserSubscription) -> StoreResult<()> {
        let mut subscriptions = self.load();
        subscriptions.insert(subscription.user_id.clone(), subscription);
        store::write_json(&self.path, &subscriptions)
    }

    /// Create (or replace) a user's subscription on the given plan
    pub fn create(&self, user_id: &str, plan_type: PlanType) -> StoreResult<UserSubscription> {
        let subscription = UserSubscription::new(user_id, plan_type, self.clock.now());
        self.save(subscription.clone())?;
        info!("Created {} subscription for {}", plan_type, user_id);
        Ok(subscription)
    }

    /// Move a user to another plan
    ///
    /// Returns `false` if the user has no subscription. Downgrading to free
    /// drops the external subscription id and activates immediately; moving to
    /// a paid plan waits for payment confirmation.
    pub fn change_plan(&self, user_id: &str, plan_type: PlanType) -> StoreResult<bool> {
        let mut subscriptions = self.load();
        let Some(subscription) = subscriptions.get_mut(user_id) else {
            warn!("Cannot change plan: no subscription for {}", user_id);
            return Ok(false);
        };

        let now = self.clock.now();
        if plan_type.is_paid() {
            subscription.status = SubscriptionStatus::Incomplete;
            subscription.current_period_start = None;
        } else {
            subscription.stripe_subscription_id = None;
            subscription.status = SubscriptionStatus::Active;
            subscription.current_period_start = Some(now);
        }
        subscription.current_period_end = None;
        subscription.plan_type = plan_type;
        subscription.updated_at = now;

        store::write_json(&self.path, &subscriptions)?;
        info!("Changed plan for {} to {}", user_id, plan_type);
        Ok(true)
    }

    /// Mark a user's subscription as canceled
    pub fn cancel(&self, user_id: &str) -> StoreResult<bool> {
        let mut subscriptions = self.load();
        let Some(subscription) = subscriptions.get_mut(user_id) else {
            return Ok(false);
        };

        let now = self.clock.now();
        subscription.status = SubscriptionStatus::Canceled;
        subscription.canceled_at = Some(now);
        subscription.updated_at = now;

        store::write_json(&self.path, &subscriptions)?;
        info!("Canceled subscription for {}", user_id);
        Ok(true)
    }

    /// Record the external customer and subscription ids for a user
    pub fn link_external_ids(
        &self,
        user_id: &str,
        customer_id: Option<String>,
        subscription_id: Option<String>,
    ) -> StoreResult<bool> {
        let mut subscriptions = self.load();
        let Some(subscription) = subscriptions.get_mut(user_id) else {
            return Ok(false);
        };

        if customer_id.is_some() {
            subscription.stripe_customer_id = customer_id;
        }
        if subscription_id.is_some() {
            subscription.stripe_subscription_id = subscription_id;
        }
        subscription.updated_at = self.clock.now();

        store::write_json(&self.path, &subscriptions)?;
        Ok(true)
    }

    /// Apply a provider status update to whoever owns `subscription_id`
    ///
    /// Returns `false` if no user has that subscription id.
    pub fn apply_status(&self, subscription_id: &str, update: StatusUpdate) -> StoreResult<bool> {
        let mut subscriptions = self.load();
        let Some(subscription) = subscriptions
            .values_mut()
            .find(|s| s.stripe_subscription_id.as_deref() == Some(subscription_id))
        else {
            warn!("No user found for subscription id {}", subscription_id);
            return Ok(false);
        };

        let now = self.clock.now();
        subscription.status = update.status;
        subscription.current_period_start = update.current_period_start;
        subscription.current_period_end = update.current_period_end;
        if let Some(plan_type) = update.plan_type {
            subscription.plan_type = plan_type;
        }
        if update.status == SubscriptionStatus::Canceled {
            subscription.canceled_at = Some(now);
        }
        subscription.updated_at = now;
        let user_id = subscription.user_id.clone();

        store::write_json(&self.path, &subscriptions)?;
        info!("Subscription for {} is now {:?}", user_id, update.status);
        Ok(true)
    }

    /// Apply a billing-provider event to the matching local record
    ///
    /// Subscription creation is matched by customer id, everything else by
    /// subscription id. Returns `false` when no user matches. Invoices that
    /// belong to no subscription are acknowledged without changes.
    pub fn apply_event(&self, event: &BillingEvent, limits: &PlanLimits) -> StoreResult<bool> {
        if event.subscription_id().is_none() {
            return Ok(true);
        }

        let mut subscriptions = self.load();
        let found = match event {
            BillingEvent::SubscriptionCreated { customer_id, .. } => subscriptions
                .values_mut()
                .find(|s| s.stripe_customer_id.as_deref() == Some(customer_id.as_str())),
            _ => subscriptions
                .values_mut()
                .find(|s| s.stripe_subscription_id.as_deref() == event.subscription_id()),
        };
        let Some(subscription) = found else {
            warn!("No user found for billing event {:?}", event);
            return Ok(false);
        };

        let now = self.clock.now();
        match event {
            BillingEvent::SubscriptionCreated {
                subscription_id,
                status,
                current_period_start,
                current_period_end,
                price_id,
                ..
            } => {
                subscription.stripe_subscription_id = Some(subscription_id.clone());
                subscription.status = *status;
                subscription.current_period_start = *current_period_start;
                subscription.current_period_end = *current_period_end;
                if let Some(price_id) = price_id {
                    subscription.plan_type =
                        plan_for_price_id(price_id, limits).unwrap_or_default();
                }
            }
            BillingEvent::SubscriptionUpdated {
                status,
                current_period_start,
                current_period_end,
                ..
            } => {
                subscription.status = *status;
                subscription.current_period_start = *current_period_start;
                subscription.current_period_end = *current_period_end;
                if *status == SubscriptionStatus::Canceled {
                    subscription.canceled_at = Some(now);
                }
            }
            BillingEvent::SubscriptionDeleted { .. } => {
                subscription.status = SubscriptionStatus::Canceled;
                subscription.canceled_at = Some(now);
                subscription.plan_type = PlanType::Free;
            }
            BillingEvent::PaymentSucceeded { .. } => {
                subscription.status = SubscriptionStatus::Active;
            }
            BillingEvent::PaymentFailed { .. } => {
                subscription.status = SubscriptionStatus::PastDue;
            }
        }
        subscription.updated_at = now;
        let user_id = subscription.user_id.clone();
        let status = subscription.status;

        store::write_json(&self.path, &subscriptions)?;
        info!("Billing event applied for {}: now {:?}", user_id, status);
        Ok(true)
    }

    pub fn find_by_customer_id(&self, customer_id: &str) -> Option<UserSubscription> {
        self.load()
            .into_values()
            .find(|s| s.stripe_customer_id.as_deref() == Some(customer_id))
    }

    pub fn find_by_subscription_id(&self, subscription_id: &str) -> Option<UserSubscription> {
        self.load()
            .into_values()
            .find(|s| s.stripe_subscription_id.as_deref() == Some(subscription_id))
    }

    pub fn is_active(&self, user_id: &str) -> bool {
        self.get(user_id).is_some_and(|s| s.is_active())
    }

    /// Plan whose limits apply to the user (free unless actively subscribed)
    pub fn effective_plan(&self, user_id: &str) -> PlanType {
        self.get(user_id)
            .map(|s| s.effective_plan())
            .unwrap_or_default()
    }

    /// Daily processing limit for the user
    pub fn daily_limit(&self, user_id: &str, limits: &PlanLimits) -> u64 {
        limits.daily_limit(self.effective_plan(user_id))
    }

    /// Display name of the user's subscribed plan
    pub fn plan_name(&self, user_id: &str, limits: &PlanLimits) -> String {
        let plan_type = self.get(user_id).map(|s| s.plan_type).unwrap_or_default();
        plan(plan_type, limits).name
    }

    fn load(&self) -> SubscriptionDocument {
        store::load_or_default(&self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use chrono::TimeDelta;
    use tempfile::TempDir;

    fn store(dir: &TempDir) -> (SubscriptionStore, Arc<FixedClock>) {
        let clock = Arc::new(FixedClock::new(Local::now()));
        let store = SubscriptionStore::with_clock(dir.path().join(SUBSCRIPTIONS_FILE), clock.clone());
        (store, clock)
    }

    #[test]
    fn test_create_free_is_active() {
        let dir = TempDir::new().unwrap();
        let (store, _) = store(&dir);

        let sub = store.create("u1", PlanType::Free).unwrap();
        assert_eq!(sub.status, SubscriptionStatus::Active);
        assert!(sub.current_period_start.is_some());
        assert!(store.is_active("u1"));
        assert_eq!(store.get("u1"), Some(sub));
    }

    #[test]
    fn test_create_paid_waits_for_payment() {
        let dir = TempDir::new().unwrap();
        let (store, _) = store(&dir);
        let limits = PlanLimits::default();

        let sub = store.create("u1", PlanType::Premium).unwrap();
        assert_eq!(sub.status, SubscriptionStatus::Incomplete);
        assert!(!store.is_active("u1"));
        assert_eq!(store.effective_plan("u1"), PlanType::Free);
        assert_eq!(store.daily_limit("u1", &limits), 10);
        assert_eq!(store.plan_name("u1", &limits), "Premium");
    }

    #[test]
    fn test_payment_confirmation_activates() {
        let dir = TempDir::new().unwrap();
        let (store, clock) = store(&dir);
        let limits = PlanLimits::default();

        store.create("u1", PlanType::Basic).unwrap();
        assert!(store
            .link_external_ids("u1", Some("cus_1".into()), Some("sub_1".into()))
            .unwrap());

        let start = clock.now();
        let update = StatusUpdate {
            status: SubscriptionStatus::Active,
            current_period_start: Some(start),
            current_period_end: Some(start + TimeDelta::days(30)),
            plan_type: None,
        };
        assert!(store.apply_status("sub_1", update).unwrap());

        assert!(store.is_active("u1"));
        assert_eq!(store.daily_limit("u1", &limits), 100);
        assert_eq!(store.find_by_customer_id("cus_1").unwrap().user_id, "u1");
        assert_eq!(store.find_by_subscription_id("sub_1").unwrap().user_id, "u1");
    }

    #[test]
    fn test_apply_status_unknown_subscription() {
        let dir = TempDir::new().unwrap();
        let (store, _) = store(&dir);
        store.create("u1", PlanType::Free).unwrap();

        let update = StatusUpdate {
            status: SubscriptionStatus::Active,
            current_period_start: None,
            current_period_end: None,
            plan_type: None,
        };
        assert!(!store.apply_status("sub_missing", update).unwrap());
    }

    #[test]
    fn test_canceled_status_sets_canceled_at() {
        let dir = TempDir::new().unwrap();
        let (store, _) = store(&dir);
        store.create("u1", PlanType::Basic).unwrap();
        store
            .link_external_ids("u1", None, Some("sub_9".into()))
            .unwrap();

        let update = StatusUpdate {
            status: SubscriptionStatus::Canceled,
            current_period_start: None,
            current_period_end: None,
            plan_type: None,
        };
        store.apply_status("sub_9", update).unwrap();
        assert!(store.get("u1").unwrap().canceled_at.is_some());
    }

    #[test]
    fn test_cancel() {
        let dir = TempDir::new().unwrap();
        let (store, _) = store(&dir);

        assert!(!store.cancel("ghost").unwrap());

        store.create("u1", PlanType::Free).unwrap();
        assert!(store.cancel("u1").unwrap());
        let sub = store.get("u1").unwrap();
        assert_eq!(sub.status, SubscriptionStatus::Canceled);
        assert!(sub.canceled_at.is_some());
        assert!(!store.is_active("u1"));
    }

    #[test]
    fn test_change_plan() {
        let dir = TempDir::new().unwrap();
        let (store, _) = store(&dir);

        assert!(!store.change_plan("ghost", PlanType::Basic).unwrap());

        store.create("u1", PlanType::Free).unwrap();
        assert!(store.change_plan("u1", PlanType::Premium).unwrap());
        let sub = store.get("u1").unwrap();
        assert_eq!(sub.plan_type, PlanType::Premium);
        assert_eq!(sub.status, SubscriptionStatus::Incomplete);

        store
            .link_external_ids("u1", None, Some("sub_2".into()))
            .unwrap();
        assert!(store.change_plan("u1", PlanType::Free).unwrap());
        let sub = store.get("u1").unwrap();
        assert_eq!(sub.status, SubscriptionStatus::Active);
        assert!(sub.stripe_subscription_id.is_none());
    }

    #[test]
    fn test_all_and_missing_user() {
        let dir = TempDir::new().unwrap();
        let (store, _) = store(&dir);
        let limits = PlanLimits::default();

        assert!(store.all().is_empty());
        assert_eq!(store.plan_name("ghost", &limits), "Free");
        assert_eq!(store.daily_limit("ghost", &limits), 10);

        store.create("a", PlanType::Free).unwrap();
        store.create("b", PlanType::Basic).unwrap();
        assert_eq!(store.all().len(), 2);
    }

    /// An active basic-plan user linked to `cus_1`/`sub_1` with a 30-day period
    fn linked_user(store: &SubscriptionStore, clock: &FixedClock) -> DateTime<Local> {
        store.create("u1", PlanType::Basic).unwrap();
        store
            .link_external_ids("u1", Some("cus_1".into()), Some("sub_1".into()))
            .unwrap();
        let start = clock.now();
        let update = StatusUpdate {
            status: SubscriptionStatus::Active,
            current_period_start: Some(start),
            current_period_end: Some(start + TimeDelta::days(30)),
            plan_type: None,
        };
        store.apply_status("sub_1", update).unwrap();
        start
    }

    #[test]
    fn test_event_subscription_created() {
        let dir = TempDir::new().unwrap();
        let (store, clock) = store(&dir);
        let limits = PlanLimits::default();
        store.create("u1", PlanType::Free).unwrap();
        store
            .link_external_ids("u1", Some("cus_1".into()), None)
            .unwrap();

        let start = clock.now();
        let premium_price = plan(PlanType::Premium, &limits).stripe_price_id;
        let event = BillingEvent::SubscriptionCreated {
            customer_id: "cus_1".into(),
            subscription_id: "sub_new".into(),
            status: SubscriptionStatus::Active,
            current_period_start: Some(start),
            current_period_end: Some(start + TimeDelta::days(30)),
            price_id: premium_price,
        };
        assert!(store.apply_event(&event, &limits).unwrap());

        let sub = store.get("u1").unwrap();
        assert_eq!(sub.stripe_subscription_id.as_deref(), Some("sub_new"));
        assert_eq!(sub.plan_type, PlanType::Premium);
        assert_eq!(sub.current_period_end, Some(start + TimeDelta::days(30)));
        assert_eq!(store.daily_limit("u1", &limits), 1000);

        // Unknown price ids fall back to the free plan
        let event = BillingEvent::SubscriptionCreated {
            customer_id: "cus_1".into(),
            subscription_id: "sub_other".into(),
            status: SubscriptionStatus::Active,
            current_period_start: None,
            current_period_end: None,
            price_id: Some("price_mystery".into()),
        };
        assert!(store.apply_event(&event, &limits).unwrap());
        assert_eq!(store.get("u1").unwrap().plan_type, PlanType::Free);

        let event = BillingEvent::SubscriptionCreated {
            customer_id: "cus_missing".into(),
            subscription_id: "sub_x".into(),
            status: SubscriptionStatus::Active,
            current_period_start: None,
            current_period_end: None,
            price_id: None,
        };
        assert!(!store.apply_event(&event, &limits).unwrap());
    }

    #[test]
    fn test_event_subscription_updated() {
        let dir = TempDir::new().unwrap();
        let (store, clock) = store(&dir);
        let limits = PlanLimits::default();
        let start = linked_user(&store, &clock);

        let next = start + TimeDelta::days(30);
        let event = BillingEvent::SubscriptionUpdated {
            subscription_id: "sub_1".into(),
            status: SubscriptionStatus::Trialing,
            current_period_start: Some(next),
            current_period_end: Some(next + TimeDelta::days(30)),
        };
        assert!(store.apply_event(&event, &limits).unwrap());
        let sub = store.get("u1").unwrap();
        assert_eq!(sub.status, SubscriptionStatus::Trialing);
        assert_eq!(sub.current_period_start, Some(next));
        assert!(sub.canceled_at.is_none());

        let event = BillingEvent::SubscriptionUpdated {
            subscription_id: "sub_1".into(),
            status: SubscriptionStatus::Canceled,
            current_period_start: Some(next),
            current_period_end: Some(next + TimeDelta::days(30)),
        };
        store.apply_event(&event, &limits).unwrap();
        let sub = store.get("u1").unwrap();
        assert!(sub.canceled_at.is_some());
        assert_eq!(sub.plan_type, PlanType::Basic);
    }

    #[test]
    fn test_event_subscription_deleted() {
        let dir = TempDir::new().unwrap();
        let (store, clock) = store(&dir);
        let limits = PlanLimits::default();
        linked_user(&store, &clock);

        let event = BillingEvent::SubscriptionDeleted {
            subscription_id: "sub_1".into(),
        };
        assert!(store.apply_event(&event, &limits).unwrap());

        let sub = store.get("u1").unwrap();
        assert_eq!(sub.status, SubscriptionStatus::Canceled);
        assert_eq!(sub.plan_type, PlanType::Free);
        assert!(sub.canceled_at.is_some());
        assert_eq!(store.daily_limit("u1", &limits), 10);
    }

    #[test]
    fn test_event_payment_succeeded() {
        let dir = TempDir::new().unwrap();
        let (store, clock) = store(&dir);
        let limits = PlanLimits::default();
        let start = linked_user(&store, &clock);
        let failed = BillingEvent::PaymentFailed {
            subscription_id: Some("sub_1".into()),
        };
        store.apply_event(&failed, &limits).unwrap();

        clock.advance(TimeDelta::days(2));
        let event = BillingEvent::PaymentSucceeded {
            subscription_id: Some("sub_1".into()),
        };
        assert!(store.apply_event(&event, &limits).unwrap());

        let sub = store.get("u1").unwrap();
        assert_eq!(sub.status, SubscriptionStatus::Active);
        assert_eq!(sub.current_period_start, Some(start));
        assert_eq!(sub.current_period_end, Some(start + TimeDelta::days(30)));

        // Invoices outside a subscription are acknowledged and change nothing
        let before = store.get("u1");
        let event = BillingEvent::PaymentSucceeded {
            subscription_id: None,
        };
        assert!(store.apply_event(&event, &limits).unwrap());
        assert_eq!(store.get("u1"), before);
    }

    #[test]
    fn test_event_payment_failed() {
        let dir = TempDir::new().unwrap();
        let (store, clock) = store(&dir);
        let limits = PlanLimits::default();
        let start = linked_user(&store, &clock);

        let event = BillingEvent::PaymentFailed {
            subscription_id: Some("sub_1".into()),
        };
        assert!(store.apply_event(&event, &limits).unwrap());

        let sub = store.get("u1").unwrap();
        assert_eq!(sub.status, SubscriptionStatus::PastDue);
        assert_eq!(sub.current_period_start, Some(start));
        assert_eq!(sub.current_period_end, Some(start + TimeDelta::days(30)));
        assert_eq!(store.effective_plan("u1"), PlanType::Free);

        let event = BillingEvent::PaymentFailed {
            subscription_id: Some("sub_missing".into()),
        };
        assert!(!store.apply_event(&event, &limits).unwrap());
    }

    #[test]
    fn test_offsetless_timestamps_are_read() {
        let dir = TempDir::new().unwrap();
        let (store, _) = store(&dir);
        std::fs::write(
            store.path(),
            r#"{"u1": {
                "user_id": "u1", "stripe_customer_id": "cus_1",
                "stripe_subscription_id": "sub_1", "plan_type": "basic",
                "status": "active",
                "current_period_start": "2024-01-01T00:00:00",
                "current_period_end": "2024-01-31T00:00:00",
                "created_at": "2024-01-01T09:00:00.123456",
                "updated_at": "2024-01-01T09:00:00.123456",
                "canceled_at": null, "trial_end": null
            }}"#,
        )
        .unwrap();

        let sub = store.get("u1").unwrap();
        assert_eq!(sub.plan_type, PlanType::Basic);
        assert!(sub.current_period_end.is_some());
        assert_eq!(store.effective_plan("u1"), PlanType::Basic);
    }

    #[test]
    fn test_status_serialization() {
        let json = serde_json::to_string(&SubscriptionStatus::PastDue).unwrap();
        assert_eq!(json, "\"past_due\"");
        let status: SubscriptionStatus = serde_json::from_str("\"incomplete_expired\"").unwrap();
        assert_eq!(status, SubscriptionStatus::IncompleteExpired);
    }
}
