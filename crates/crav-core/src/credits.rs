//! Credit ledger entries.
//!
//! Every balance change produces exactly one `CreditTransaction`, and the
//! transaction records the balance it left behind.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::{TransactionId, UserId};

/// A single ledger row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreditTransaction {
    /// Time-ordered transaction id.
    pub id: TransactionId,

    /// Account the entry belongs to.
    pub user_id: UserId,

    /// Signed credit delta. Spends are negative, everything else positive.
    pub amount: i64,

    /// What kind of movement this is.
    pub kind: TransactionKind,

    /// Balance immediately after this entry was applied.
    pub balance_after: i64,

    /// Feature that consumed the credits (spends and their refunds).
    pub feature: Option<String>,

    /// Human-readable description.
    pub description: String,

    /// The spend this entry refunds, if it is a refund.
    pub refund_of: Option<TransactionId>,

    /// Provider reference (Stripe session, PayPal order, admin id).
    pub external_ref: Option<String>,

    /// Free-form context.
    pub metadata: serde_json::Value,

    /// When the entry was written.
    pub created_at: DateTime<Utc>,
}

impl CreditTransaction {
    fn base(user_id: UserId, amount: i64, kind: TransactionKind, description: String) -> Self {
        Self {
            id: TransactionId::generate(),
            user_id,
            amount,
            kind,
            balance_after: 0,
            feature: None,
            description,
            refund_of: None,
            external_ref: None,
            metadata: serde_json::Value::Null,
            created_at: Utc::now(),
        }
    }

    /// A debit for using a feature. The amount is stored negative.
    #[must_use]
    pub fn spend(user_id: UserId, credits: i64, feature: &str, quantity: u32) -> Self {
        let mut tx = Self::base(
            user_id,
            -credits.abs(),
            TransactionKind::Spend,
            format!("{feature} x{quantity}"),
        );
        tx.feature = Some(feature.to_string());
        tx.metadata = serde_json::json!({ "quantity": quantity });
        tx
    }

    /// Returns the credits taken by `original`.
    #[must_use]
    pub fn refund(original: &Self, reason: &str) -> Self {
        let mut tx = Self::base(
            original.user_id,
            original.amount.abs(),
            TransactionKind::Refund,
            format!("Refund: {reason}"),
        );
        tx.feature.clone_from(&original.feature);
        tx.refund_of = Some(original.id);
        tx
    }

    /// Credits bought through a payment provider.
    #[must_use]
    pub fn purchase(user_id: UserId, credits: i64, provider: &str, external_ref: &str) -> Self {
        let mut tx = Self::base(
            user_id,
            credits,
            TransactionKind::Purchase,
            format!("Purchased {credits} credits via {provider}"),
        );
        tx.external_ref = Some(external_ref.to_string());
        tx.metadata = serde_json::json!({ "provider": provider });
        tx
    }

    /// Monthly plan allowance.
    #[must_use]
    pub fn plan_grant(user_id: UserId, credits: i64, plan_name: &str) -> Self {
        let mut tx = Self::base(
            user_id,
            credits,
            TransactionKind::PlanGrant,
            format!("Monthly {plan_name} plan credits"),
        );
        tx.metadata = serde_json::json!({ "plan": plan_name });
        tx
    }

    /// Promotional or admin-issued credits.
    #[must_use]
    pub fn bonus(user_id: UserId, credits: i64, reason: String) -> Self {
        Self::base(user_id, credits, TransactionKind::Bonus, reason)
    }

    /// The signup bonus written when an account is created.
    #[must_use]
    pub fn signup_bonus(user_id: UserId, credits: i64) -> Self {
        Self::base(
            user_id,
            credits,
            TransactionKind::SignupBonus,
            "Welcome bonus".to_string(),
        )
    }

    /// Attach a provider reference.
    #[must_use]
    pub fn with_external_ref(mut self, external_ref: impl Into<String>) -> Self {
        self.external_ref = Some(external_ref.into());
        self
    }
}

/// Kind of ledger movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    /// Credits consumed by a feature.
    Spend,
    /// Credits returned after a failed operation.
    Refund,
    /// Credits bought.
    Purchase,
    /// Monthly subscription allowance.
    PlanGrant,
    /// Promotional credits.
    Bonus,
    /// One-off welcome credits.
    SignupBonus,
}

impl TransactionKind {
    /// Stable lowercase name used in storage.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Spend => "spend",
            Self::Refund => "refund",
            Self::Purchase => "purchase",
            Self::PlanGrant => "plan_grant",
            Self::Bonus => "bonus",
            Self::SignupBonus => "signup_bonus",
        }
    }
}

impl std::str::FromStr for TransactionKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "spend" => Ok(Self::Spend),
            "refund" => Ok(Self::Refund),
            "purchase" => Ok(Self::Purchase),
            "plan_grant" => Ok(Self::PlanGrant),
            "bonus" => Ok(Self::Bonus),
            "signup_bonus" => Ok(Self::SignupBonus),
            other => Err(CoreError::UnknownVariant {
                kind: "transaction kind",
                value: other.to_string(),
            }),
        }
    }
}
