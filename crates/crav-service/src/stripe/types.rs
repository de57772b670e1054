//! Stripe API types.
//!
//! Only the fields the service reads are modelled; unknown fields are
//! ignored.

use serde::Deserialize;

/// Stripe Checkout session object.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutSession {
    /// Session ID.
    pub id: String,
    /// Checkout URL to redirect the user to.
    #[serde(default)]
    pub url: Option<String>,
    /// `paid`, `unpaid` or `no_payment_required`.
    #[serde(default)]
    pub payment_status: Option<String>,
    /// Customer ID.
    #[serde(default)]
    pub customer: Option<String>,
    /// Total amount in cents.
    #[serde(default)]
    pub amount_total: Option<i64>,
    /// Client reference ID (our `user_id`).
    #[serde(default)]
    pub client_reference_id: Option<String>,
    /// Session metadata (`user_id`, `pack`, `credits`).
    #[serde(default)]
    pub metadata: serde_json::Value,
}

impl CheckoutSession {
    /// String value from the session metadata.
    #[must_use]
    pub fn metadata_str(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(serde_json::Value::as_str)
    }
}

/// Stripe subscription object.
#[derive(Debug, Clone, Deserialize)]
pub struct Subscription {
    /// Subscription ID.
    pub id: String,
    /// Customer ID.
    pub customer: String,
    /// Stripe status (`active`, `past_due`, `canceled`, ...).
    pub status: String,
    /// End of the current period (Unix seconds).
    #[serde(default)]
    pub current_period_end: Option<i64>,
    /// Subscription metadata; `plan` names our plan.
    #[serde(default)]
    pub metadata: serde_json::Value,
    /// Subscription items.
    #[serde(default)]
    pub items: Option<StripeList<SubscriptionItem>>,
}

impl Subscription {
    /// Plan name from metadata, falling back to the first price's lookup key.
    #[must_use]
    pub fn plan_name(&self) -> Option<&str> {
        self.metadata
            .get("plan")
            .and_then(serde_json::Value::as_str)
            .or_else(|| {
                self.items
                    .as_ref()?
                    .data
                    .first()?
                    .price
                    .lookup_key
                    .as_deref()
            })
    }
}

/// Subscription item.
#[derive(Debug, Clone, Deserialize)]
pub struct SubscriptionItem {
    /// The item's price.
    pub price: Price,
}

/// Stripe price object.
#[derive(Debug, Clone, Deserialize)]
pub struct Price {
    /// Price ID.
    pub id: String,
    /// Lookup key set in the dashboard.
    #[serde(default)]
    pub lookup_key: Option<String>,
}

/// Stripe invoice object.
#[derive(Debug, Clone, Deserialize)]
pub struct Invoice {
    /// Invoice ID.
    pub id: String,
    /// Customer ID.
    #[serde(default)]
    pub customer: Option<String>,
    /// Subscription ID.
    #[serde(default)]
    pub subscription: Option<String>,
}

/// Stripe list response wrapper.
#[derive(Debug, Clone, Deserialize)]
pub struct StripeList<T> {
    /// Data items.
    pub data: Vec<T>,
    /// Whether there are more items.
    #[serde(default)]
    pub has_more: bool,
}

/// Stripe webhook event.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEvent {
    /// Event ID.
    pub id: String,
    /// Event type (e.g., "checkout.session.completed").
    #[serde(rename = "type")]
    pub event_type: String,
    /// Event data.
    pub data: WebhookEventData,
    /// Created timestamp (Unix).
    #[serde(default)]
    pub created: i64,
}

/// Webhook event data container.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEventData {
    /// The event object.
    pub object: serde_json::Value,
}

/// Stripe error response.
#[derive(Debug, Clone, Deserialize)]
pub struct StripeErrorResponse {
    /// Error details.
    pub error: StripeErrorDetail,
}

/// Stripe error detail.
#[derive(Debug, Clone, Deserialize)]
pub struct StripeErrorDetail {
    /// Error type.
    #[serde(rename = "type")]
    pub error_type: String,
    /// Error message.
    #[serde(default)]
    pub message: String,
    /// Error code.
    #[serde(default)]
    pub code: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscription_plan_prefers_metadata() {
        let sub: Subscription = serde_json::from_value(serde_json::json!({
            "id": "sub_1",
            "customer": "cus_1",
            "status": "active",
            "metadata": {"plan": "pro"},
            "items": {"data": [{"price": {"id": "price_1", "lookup_key": "business"}}]}
        }))
        .unwrap();
        assert_eq!(sub.plan_name(), Some("pro"));
    }

    #[test]
    fn subscription_plan_falls_back_to_lookup_key() {
        let sub: Subscription = serde_json::from_value(serde_json::json!({
            "id": "sub_1",
            "customer": "cus_1",
            "status": "active",
            "items": {"data": [{"price": {"id": "price_1", "lookup_key": "starter"}}]}
        }))
        .unwrap();
        assert_eq!(sub.plan_name(), Some("starter"));
    }
}
