//! Credit accounts and subscription plans.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::UserId;

// ============================================================================
// Constants
// ============================================================================

/// Credits granted when an account is first created.
pub const SIGNUP_BONUS_CREDITS: i64 = 50;

/// Length of a subscription billing period.
pub const BILLING_PERIOD_DAYS: i64 = 30;

/// A user's credit account.
///
/// One row per user. The balance is an integer number of credits and is
/// never allowed to drop below zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreditAccount {
    /// Owner of the account.
    pub user_id: UserId,

    /// Current spendable balance.
    pub balance: i64,

    /// Credits bought through Stripe or PayPal.
    pub lifetime_purchased: i64,

    /// Credits granted by plans, bonuses and the signup bonus.
    pub lifetime_granted: i64,

    /// Credits spent on features.
    pub lifetime_spent: i64,

    /// Credits returned by refunds.
    pub lifetime_refunded: i64,

    /// Subscription plan.
    pub plan: Plan,

    /// Subscription state, `None` on the free plan.
    pub subscription_status: Option<SubscriptionStatus>,

    /// End of the current paid period.
    pub subscription_period_end: Option<DateTime<Utc>>,

    /// Stripe customer id, once known.
    pub stripe_customer_id: Option<String>,

    /// Stripe subscription id, once known.
    pub stripe_subscription_id: Option<String>,

    /// When the account was created.
    pub created_at: DateTime<Utc>,

    /// When the account was last modified.
    pub updated_at: DateTime<Utc>,
}

impl CreditAccount {
    /// Create an empty free-plan account.
    ///
    /// The signup bonus is applied by the store together with its ledger
    /// entry, so the balance starts at zero here.
    #[must_use]
    pub fn new(user_id: UserId) -> Self {
        let now = Utc::now();
        Self {
            user_id,
            balance: 0,
            lifetime_purchased: 0,
            lifetime_granted: 0,
            lifetime_spent: 0,
            lifetime_refunded: 0,
            plan: Plan::Free,
            subscription_status: None,
            subscription_period_end: None,
            stripe_customer_id: None,
            stripe_subscription_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether the balance covers `amount` credits.
    #[must_use]
    pub fn has_sufficient_credits(&self, amount: i64) -> bool {
        self.balance >= amount
    }

    /// Whether the account has a paid subscription in good standing.
    #[must_use]
    pub fn has_active_subscription(&self) -> bool {
        self.plan != Plan::Free && self.subscription_status == Some(SubscriptionStatus::Active)
    }

    /// Whether the monthly plan grant is due at `now`.
    #[must_use]
    pub fn monthly_grant_due(&self, now: DateTime<Utc>) -> bool {
        self.has_active_subscription()
            && self
                .subscription_period_end
                .is_some_and(|period_end| period_end <= now)
    }

    /// End of the period after the current one: one billing period past the
    /// stored end, or past `now` if the account fell more than a period
    /// behind.
    #[must_use]
    pub fn next_period_end(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let period = Duration::days(BILLING_PERIOD_DAYS);
        match self.subscription_period_end {
            Some(end) if end + period > now => end + period,
            _ => now + period,
        }
    }
}

/// Subscription plans shown on the Pricing page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Plan {
    /// No subscription, pay-as-you-go credit packs only.
    Free,
    /// $9/month, 500 credits/month.
    Starter,
    /// $29/month, 2000 credits/month.
    Pro,
    /// $99/month, 10000 credits/month.
    Business,
}

impl Plan {
    /// Every plan, in display order.
    pub const ALL: [Self; 4] = [Self::Free, Self::Starter, Self::Pro, Self::Business];

    /// Credits granted at the start of each billing period.
    #[must_use]
    pub const fn monthly_credits(self) -> i64 {
        match self {
            Self::Free => 0,
            Self::Starter => 500,
            Self::Pro => 2000,
            Self::Business => 10_000,
        }
    }

    /// Monthly price in cents.
    #[must_use]
    pub const fn monthly_price_cents(self) -> i64 {
        match self {
            Self::Free => 0,
            Self::Starter => 900,
            Self::Pro => 2900,
            Self::Business => 9900,
        }
    }

    /// Stable lowercase name used in storage and Stripe metadata.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::Starter => "starter",
            Self::Pro => "pro",
            Self::Business => "business",
        }
    }
}

impl std::str::FromStr for Plan {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "free" => Ok(Self::Free),
            "starter" => Ok(Self::Starter),
            "pro" => Ok(Self::Pro),
            "business" => Ok(Self::Business),
            other => Err(CoreError::UnknownVariant {
                kind: "plan",
                value: other.to_string(),
            }),
        }
    }
}

/// Status of a paid subscription as reported by Stripe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    /// Paid and current.
    Active,
    /// In a trial period.
    Trialing,
    /// Last invoice failed.
    PastDue,
    /// Cancelled, no further grants.
    Canceled,
}

impl SubscriptionStatus {
    /// Stable lowercase name used in storage.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Trialing => "trialing",
            Self::PastDue => "past_due",
            Self::Canceled => "canceled",
        }
    }

    /// Map a Stripe subscription status string.
    ///
    /// Stripe has more states than we track; the incomplete and unpaid ones
    /// collapse into `PastDue`.
    #[must_use]
    pub fn from_stripe(status: &str) -> Self {
        match status {
            "active" => Self::Active,
            "trialing" => Self::Trialing,
            "canceled" | "incomplete_expired" => Self::Canceled,
            _ => Self::PastDue,
        }
    }
}

impl std::str::FromStr for SubscriptionStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "trialing" => Ok(Self::Trialing),
            "past_due" => Ok(Self::PastDue),
            "canceled" => Ok(Self::Canceled),
            other => Err(CoreError::UnknownVariant {
                kind: "subscription status",
                value: other.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_account_is_empty_free_plan() {
        let account = CreditAccount::new(UserId::generate());
        assert_eq!(account.balance, 0);
        assert_eq!(account.plan, Plan::Free);
        assert!(!account.has_active_subscription());
    }

    #[test]
    fn sufficient_credits_is_inclusive() {
        let mut account = CreditAccount::new(UserId::generate());
        account.balance = 10;
        assert!(account.has_sufficient_credits(10));
        assert!(!account.has_sufficient_credits(11));
    }

    #[test]
    fn monthly_grant_due_only_for_active_expired_periods() {
        let now = Utc::now();
        let mut account = CreditAccount::new(UserId::generate());
        account.plan = Plan::Pro;
        account.subscription_status = Some(SubscriptionStatus::Active);
        account.subscription_period_end = Some(now - Duration::hours(1));
        assert!(account.monthly_grant_due(now));

        account.subscription_status = Some(SubscriptionStatus::PastDue);
        assert!(!account.monthly_grant_due(now));

        account.subscription_status = Some(SubscriptionStatus::Active);
        account.subscription_period_end = Some(account.next_period_end(now));
        assert!(!account.monthly_grant_due(now));
    }

    #[test]
    fn period_rolls_from_previous_end_unless_far_behind() {
        let now = Utc::now();
        let mut account = CreditAccount::new(UserId::generate());

        let recent = now - Duration::days(2);
        account.subscription_period_end = Some(recent);
        assert_eq!(
            account.next_period_end(now),
            recent + Duration::days(BILLING_PERIOD_DAYS)
        );

        account.subscription_period_end = Some(now - Duration::days(90));
        assert_eq!(
            account.next_period_end(now),
            now + Duration::days(BILLING_PERIOD_DAYS)
        );

        account.subscription_period_end = None;
        assert_eq!(
            account.next_period_end(now),
            now + Duration::days(BILLING_PERIOD_DAYS)
        );
    }

    #[test]
    fn plan_names_parse_back() {
        for plan in Plan::ALL {
            assert_eq!(plan.as_str().parse::<Plan>().unwrap(), plan);
        }
        assert!("platinum".parse::<Plan>().is_err());
    }

    #[test]
    fn stripe_statuses_collapse() {
        assert_eq!(SubscriptionStatus::from_stripe("active"), SubscriptionStatus::Active);
        assert_eq!(SubscriptionStatus::from_stripe("unpaid"), SubscriptionStatus::PastDue);
        assert_eq!(
            SubscriptionStatus::from_stripe("incomplete_expired"),
            SubscriptionStatus::Canceled
        );
    }
}
