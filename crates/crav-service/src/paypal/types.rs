//! PayPal REST types.

use serde::{Deserialize, Serialize};

/// OAuth2 client-credentials response.
#[derive(Debug, Clone, Deserialize)]
pub struct AccessToken {
    /// Bearer token.
    pub access_token: String,
    /// Lifetime in seconds.
    pub expires_in: u64,
}

/// Money amount as PayPal sends it (decimal string).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money {
    /// ISO currency code.
    pub currency_code: String,
    /// Decimal amount, e.g. `"9.99"`.
    pub value: String,
}

impl Money {
    /// US dollars from a cent amount.
    #[must_use]
    pub fn usd_from_cents(cents: i64) -> Self {
        Self {
            currency_code: "USD".to_string(),
            value: format!("{}.{:02}", cents / 100, cents % 100),
        }
    }
}

/// Body of `POST /v2/checkout/orders`.
#[derive(Debug, Clone, Serialize)]
pub struct CreateOrderRequest {
    /// Always `CAPTURE`.
    pub intent: &'static str,
    /// One unit per pack.
    pub purchase_units: Vec<PurchaseUnitRequest>,
    /// Redirect URLs.
    pub application_context: ApplicationContext,
}

/// A purchase unit in an order request.
#[derive(Debug, Clone, Serialize)]
pub struct PurchaseUnitRequest {
    /// Credit pack id.
    pub reference_id: String,
    /// Buyer's user id.
    pub custom_id: String,
    /// Line description.
    pub description: String,
    /// Price.
    pub amount: Money,
}

/// Redirects after approval.
#[derive(Debug, Clone, Serialize)]
pub struct ApplicationContext {
    /// Shown on the PayPal page.
    pub brand_name: String,
    /// Where PayPal sends the buyer after approving.
    pub return_url: String,
    /// Where PayPal sends the buyer after cancelling.
    pub cancel_url: String,
    /// Skip the shipping form.
    pub shipping_preference: &'static str,
}

/// PayPal order (create and capture responses).
#[derive(Debug, Clone, Deserialize)]
pub struct Order {
    /// Order id.
    pub id: String,
    /// `CREATED`, `APPROVED`, `COMPLETED`, ...
    pub status: String,
    /// HATEOAS links.
    #[serde(default)]
    pub links: Vec<Link>,
    /// Purchase units.
    #[serde(default)]
    pub purchase_units: Vec<PurchaseUnit>,
}

impl Order {
    /// URL the buyer must visit to approve the order.
    #[must_use]
    pub fn approve_url(&self) -> Option<&str> {
        self.links
            .iter()
            .find(|l| l.rel == "approve" || l.rel == "payer-action")
            .map(|l| l.href.as_str())
    }

    /// Whether the buyer approved the order and it awaits capture.
    #[must_use]
    pub fn is_approved(&self) -> bool {
        self.status == "APPROVED"
    }

    /// Whether the order has been captured.
    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.status == "COMPLETED"
    }

    /// Pack id recorded on the first purchase unit.
    #[must_use]
    pub fn reference_id(&self) -> Option<&str> {
        self.purchase_units.first()?.reference_id.as_deref()
    }

    /// Buyer id from the first purchase unit or its first capture.
    #[must_use]
    pub fn custom_id(&self) -> Option<&str> {
        let unit = self.purchase_units.first()?;
        unit.custom_id.as_deref().or_else(|| {
            unit.payments
                .as_ref()?
                .captures
                .first()?
                .custom_id
                .as_deref()
        })
    }
}

/// HATEOAS link.
#[derive(Debug, Clone, Deserialize)]
pub struct Link {
    /// Target URL.
    pub href: String,
    /// Relation.
    pub rel: String,
}

/// Purchase unit in an order response.
#[derive(Debug, Clone, Deserialize)]
pub struct PurchaseUnit {
    /// Pack id.
    #[serde(default)]
    pub reference_id: Option<String>,
    /// Buyer id.
    #[serde(default)]
    pub custom_id: Option<String>,
    /// Captures, present after capture.
    #[serde(default)]
    pub payments: Option<Payments>,
}

/// Payments on a purchase unit.
#[derive(Debug, Clone, Deserialize)]
pub struct Payments {
    /// Captures.
    #[serde(default)]
    pub captures: Vec<Capture>,
}

/// One capture.
#[derive(Debug, Clone, Deserialize)]
pub struct Capture {
    /// Capture id.
    pub id: String,
    /// Capture status.
    pub status: String,
    /// Buyer id.
    #[serde(default)]
    pub custom_id: Option<String>,
}

/// PayPal error body.
#[derive(Debug, Clone, Deserialize)]
pub struct PayPalErrorResponse {
    /// Error name.
    #[serde(default)]
    pub name: String,
    /// Human-readable message.
    #[serde(default)]
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn money_formats_cents() {
        assert_eq!(Money::usd_from_cents(999).value, "9.99");
        assert_eq!(Money::usd_from_cents(17_999).value, "179.99");
        assert_eq!(Money::usd_from_cents(900).value, "9.00");
    }

    #[test]
    fn captured_order_exposes_pack_and_buyer() {
        let order: Order = serde_json::from_value(serde_json::json!({
            "id": "ORDER-1",
            "status": "COMPLETED",
            "purchase_units": [{
                "reference_id": "creator",
                "payments": {"captures": [{
                    "id": "CAP-1", "status": "COMPLETED", "custom_id": "user-1"
                }]}
            }]
        }))
        .unwrap();
        assert!(order.is_completed());
        assert_eq!(order.reference_id(), Some("creator"));
        assert_eq!(order.custom_id(), Some("user-1"));
    }

    #[test]
    fn approve_link_is_found() {
        let order: Order = serde_json::from_value(serde_json::json!({
            "id": "ORDER-1",
            "status": "CREATED",
            "links": [
                {"href": "https://api/self", "rel": "self"},
                {"href": "https://paypal/approve", "rel": "approve"}
            ]
        }))
        .unwrap();
        assert_eq!(order.approve_url(), Some("https://paypal/approve"));
    }
}
