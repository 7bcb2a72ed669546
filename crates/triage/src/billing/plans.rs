//! Subscription plans and their daily processing limits

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Daily limit that stands in for "unlimited" (admin override)
///
/// Kept as a plain number because stored records and limit comparisons
/// already depend on it.
pub const UNLIMITED_DAILY_LIMIT: u64 = 999_999;

/// Subscription tier
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanType {
    #[default]
    Free,
    Basic,
    Premium,
}

impl PlanType {
    pub const ALL: [PlanType; 3] = [PlanType::Free, PlanType::Basic, PlanType::Premium];

    pub fn as_str(&self) -> &'static str {
        match self {
            PlanType::Free => "free",
            PlanType::Basic => "basic",
            PlanType::Premium => "premium",
        }
    }

    pub fn is_paid(&self) -> bool {
        !matches!(self, PlanType::Free)
    }
}

impl fmt::Display for PlanType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a plan name is not recognized
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown plan type: {0}")]
pub struct UnknownPlan(pub String);

impl FromStr for PlanType {
    type Err = UnknownPlan;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "free" => Ok(PlanType::Free),
            "basic" => Ok(PlanType::Basic),
            "premium" => Ok(PlanType::Premium),
            other => Err(UnknownPlan(other.to_string())),
        }
    }
}

/// Daily email limits per plan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlanLimits {
    pub free: u64,
    pub basic: u64,
    pub premium: u64,
}

impl Default for PlanLimits {
    fn default() -> Self {
        Self {
            free: 10,
            basic: 100,
            premium: 1000,
        }
    }
}

impl PlanLimits {
    pub fn daily_limit(&self, plan: PlanType) -> u64 {
        match plan {
            PlanType::Free => self.free,
            PlanType::Basic => self.basic,
            PlanType::Premium => self.premium,
        }
    }

    /// Look up a limit by plan name, using the free limit for unknown names
    pub fn daily_limit_for_name(&self, plan: &str) -> u64 {
        match plan.parse::<PlanType>() {
            Ok(plan) => self.daily_limit(plan),
            Err(e) => {
                log::warn!("{e}, using free plan limit");
                self.free
            }
        }
    }

    /// Limit for a plan, or the unlimited sentinel for admins
    pub fn effective_limit(&self, plan: PlanType, is_admin: bool) -> u64 {
        if is_admin {
            UNLIMITED_DAILY_LIMIT
        } else {
            self.daily_limit(plan)
        }
    }
}

/// Catalog entry describing a plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubscriptionPlan {
    pub plan_type: PlanType,
    pub name: String,
    /// Monthly price in the smallest currency unit
    pub price_cents: u64,
    pub currency: String,
    pub daily_email_limit: u64,
    /// Billing-provider price id (paid plans only)
    pub stripe_price_id: Option<String>,
    pub features: Vec<String>,
}

impl SubscriptionPlan {
    /// Price formatted for display, e.g. "$9.99"
    pub fn display_price(&self) -> String {
        format!("${}.{:02}", self.price_cents / 100, self.price_cents % 100)
    }
}

/// Build the plan catalog using the configured limits
pub fn plan_catalog(limits: &PlanLimits) -> Vec<SubscriptionPlan> {
    PlanType::ALL.iter().map(|p| plan(*p, limits)).collect()
}

/// Catalog entry for a single plan
pub fn plan(plan_type: PlanType, limits: &PlanLimits) -> SubscriptionPlan {
    let limit = limits.daily_limit(plan_type);
    let processed = format!("{limit} emails processed per day");

    let (name, price_cents, stripe_price_id, features): (&str, u64, Option<String>, Vec<&str>) =
        match plan_type {
            PlanType::Free => (
                "Free",
                0,
                None,
                vec!["Basic email categorization", "Standard Gmail integration"],
            ),
            PlanType::Basic => (
                "Basic",
                999,
                Some(price_id_from_env(
                    "STRIPE_BASIC_PRICE_ID",
                    "price_basic_monthly",
                )),
                vec![
                    "Advanced email categorization",
                    "Automated responses",
                    "Slack notifications",
                    "Email cleanup",
                ],
            ),
            PlanType::Premium => (
                "Premium",
                2999,
                Some(price_id_from_env(
                    "STRIPE_PREMIUM_PRICE_ID",
                    "price_premium_monthly",
                )),
                vec![
                    "Advanced email categorization",
                    "Automated responses",
                    "Slack notifications",
                    "Email cleanup",
                    "Priority support",
                    "Custom email rules",
                    "Analytics dashboard",
                ],
            ),
        };

    SubscriptionPlan {
        plan_type,
        name: name.to_string(),
        price_cents,
        currency: "usd".to_string(),
        daily_email_limit: limit,
        stripe_price_id,
        features: std::iter::once(processed)
            .chain(features.into_iter().map(String::from))
            .collect(),
    }
}

/// Find the plan whose billing-provider price id matches
pub fn plan_for_price_id(price_id: &str, limits: &PlanLimits) -> Option<PlanType> {
    plan_catalog(limits)
        .into_iter()
        .find(|p| p.stripe_price_id.as_deref() == Some(price_id))
        .map(|p| p.plan_type)
}

fn price_id_from_env(var: &str, default: &str) -> String {
    std::env::var(var)
        .ok()
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_string())
}
