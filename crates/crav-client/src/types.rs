//! Request and response types for the credits API.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crav_core::pricing::PlanSummary;
use crav_core::{CreditPack, TransactionKind};

/// `GET /api/pricing`.
#[derive(Debug, Clone, Deserialize)]
pub struct Pricing {
    /// Subscription plans.
    pub plans: Vec<PlanSummary>,
    /// One-off credit packs.
    pub packs: Vec<CreditPack>,
    /// Credits per unit of each feature.
    pub feature_costs: BTreeMap<String, i64>,
    /// Credits granted on first sign-in.
    pub signup_bonus: i64,
}

impl Pricing {
    /// Cost of `quantity` uses of `feature`, if the feature is priced.
    #[must_use]
    pub fn cost_of(&self, feature: &str, quantity: u32) -> Option<i64> {
        self.feature_costs
            .get(feature)
            .map(|unit| unit * i64::from(quantity))
    }
}

/// `GET /api/credits/balance`.
#[derive(Debug, Clone, Deserialize)]
pub struct Balance {
    /// Spendable credits.
    pub balance: i64,
    /// Current plan.
    pub plan: String,
    /// Subscription status, if any.
    pub subscription_status: Option<String>,
    /// End of the current billing period.
    pub period_end: Option<DateTime<Utc>>,
    /// Credits bought.
    pub lifetime_purchased: i64,
    /// Credits granted.
    pub lifetime_granted: i64,
    /// Credits spent.
    pub lifetime_spent: i64,
}

/// One ledger row.
#[derive(Debug, Clone, Deserialize)]
pub struct Transaction {
    /// Transaction id.
    pub id: String,
    /// Signed amount; spends are negative.
    pub amount: i64,
    /// Movement kind.
    pub kind: TransactionKind,
    /// Balance after this row.
    pub balance_after: i64,
    /// Feature charged, for spends and their refunds.
    pub feature: Option<String>,
    /// Human-readable description.
    pub description: String,
    /// The spend a refund reverses.
    pub refund_of: Option<String>,
    /// When it happened.
    pub created_at: DateTime<Utc>,
}

/// A page of the ledger, newest first.
#[derive(Debug, Clone, Deserialize)]
pub struct TransactionPage {
    /// Rows.
    pub transactions: Vec<Transaction>,
    /// More rows past this page.
    pub has_more: bool,
}

#[derive(Debug, Serialize)]
pub(crate) struct SpendRequest<'a> {
    pub feature: &'a str,
    pub quantity: u32,
}

#[derive(Debug, Serialize)]
pub(crate) struct InternalSpendRequest<'a> {
    pub user_id: &'a str,
    pub feature: &'a str,
    pub quantity: u32,
}

/// Result of a spend.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SpendReceipt {
    /// The spend's ledger row; pass it to `refund`.
    pub transaction_id: String,
    /// Credits taken.
    pub credits_spent: i64,
    /// Balance afterwards.
    pub balance: i64,
}

#[derive(Debug, Serialize)]
pub(crate) struct RefundRequest<'a> {
    pub transaction_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<&'a str>,
}

/// Result of a refund.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RefundReceipt {
    /// The refund's ledger row.
    pub transaction_id: String,
    /// Credits returned.
    pub credits_refunded: i64,
    /// Balance afterwards.
    pub balance: i64,
}

/// Error body returned by the service.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ApiErrorResponse {
    pub error: ApiErrorBody,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ApiErrorBody {
    pub code: String,
    pub message: String,
    #[serde(default)]
    pub details: Option<serde_json::Value>,
}
