//! Credit-pack checkout through Stripe and PayPal.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use crav_core::CreditTransaction;
use crav_store::StoreError;

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::state::AppState;

/// Checkout request.
#[derive(Debug, Deserialize)]
pub struct CheckoutRequest {
    /// Credit pack id (`starter`, `creator`, `pro`, `studio`).
    pub pack: String,
}

/// Stripe checkout response.
#[derive(Debug, Serialize)]
pub struct StripeCheckoutResponse {
    /// Stripe checkout session URL.
    pub checkout_url: String,
    /// Session ID for tracking.
    pub session_id: String,
}

/// Start a Stripe Checkout session for a credit pack.
///
/// Credits are granted by the `checkout.session.completed` webhook, not here.
pub async fn stripe_checkout(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Json(body): Json<CheckoutRequest>,
) -> Result<Json<StripeCheckoutResponse>, ApiError> {
    let pack = state.config.pricing.pack(&body.pack)?;

    let stripe = state
        .stripe
        .as_ref()
        .ok_or_else(|| ApiError::ExternalService("Stripe not configured".into()))?;

    let account = state.store.get_or_create_account(&auth.user_id).await?;

    let success_url = format!(
        "{}/billing/success?session_id={{CHECKOUT_SESSION_ID}}",
        state.config.site_url
    );
    let cancel_url = format!("{}/pricing", state.config.site_url);

    let session = stripe
        .create_checkout_session(
            &auth.user_id,
            pack,
            account.stripe_customer_id.as_deref(),
            &success_url,
            &cancel_url,
        )
        .await?;

    let checkout_url = session
        .url
        .ok_or_else(|| ApiError::ExternalService("Stripe returned no checkout URL".into()))?;

    tracing::info!(
        user_id = %auth.user_id,
        pack = %pack.id,
        session_id = %session.id,
        "Stripe checkout session created"
    );

    Ok(Json(StripeCheckoutResponse {
        checkout_url,
        session_id: session.id,
    }))
}

/// PayPal order response.
#[derive(Debug, Serialize)]
pub struct PayPalCheckoutResponse {
    /// PayPal order ID, passed back to the capture endpoint.
    pub order_id: String,
    /// Where to send the buyer.
    pub approve_url: String,
}

/// Create a PayPal order for a credit pack.
pub async fn paypal_checkout(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Json(body): Json<CheckoutRequest>,
) -> Result<Json<PayPalCheckoutResponse>, ApiError> {
    let pack = state.config.pricing.pack(&body.pack)?;

    let paypal = state
        .paypal
        .as_ref()
        .ok_or_else(|| ApiError::ExternalService("PayPal not configured".into()))?;

    let return_url = format!("{}/billing/paypal/return", state.config.site_url);
    let cancel_url = format!("{}/pricing", state.config.site_url);

    let order = paypal
        .create_order(&auth.user_id, pack, &return_url, &cancel_url)
        .await?;

    let approve_url = order
        .approve_url()
        .ok_or_else(|| ApiError::ExternalService("PayPal returned no approval link".into()))?
        .to_string();

    tracing::info!(
        user_id = %auth.user_id,
        pack = %pack.id,
        order_id = %order.id,
        "PayPal order created"
    );

    Ok(Json(PayPalCheckoutResponse {
        order_id: order.id,
        approve_url,
    }))
}

/// PayPal capture request.
#[derive(Debug, Deserialize)]
pub struct CaptureRequest {
    /// Approved order.
    pub order_id: String,
}

/// PayPal capture response.
#[derive(Debug, Serialize)]
pub struct CaptureResponse {
    /// Order ID.
    pub order_id: String,
    /// PayPal order status.
    pub status: String,
    /// Whether this call granted the credits. `false` on a repeat capture.
    pub credited: bool,
    /// Credits in the pack.
    pub credits: i64,
    /// Balance afterwards.
    pub balance: i64,
}

/// Capture an approved PayPal order and grant its credits once.
///
/// The order is read before anything is captured: only its buyer may capture
/// it. An order that is already captured is credited without a second capture.
pub async fn paypal_capture(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Json(body): Json<CaptureRequest>,
) -> Result<Json<CaptureResponse>, ApiError> {
    let paypal = state
        .paypal
        .as_ref()
        .ok_or_else(|| ApiError::ExternalService("PayPal not configured".into()))?;

    let order = paypal.get_order(&body.order_id).await?;

    if order.custom_id() != Some(auth.user_id.to_string().as_str()) {
        tracing::warn!(
            order_id = %order.id,
            user_id = %auth.user_id,
            "PayPal order belongs to another user"
        );
        return Err(ApiError::Forbidden);
    }

    let pack_id = order
        .reference_id()
        .ok_or_else(|| ApiError::BadRequest("PayPal order has no pack reference".into()))?;
    let pack = state.config.pricing.pack(pack_id)?;

    let order = if order.is_approved() {
        match paypal.capture_order(&order.id).await {
            Ok(captured) => captured,
            Err(e) => {
                // Another request may have captured it first.
                let current = paypal.get_order(&order.id).await?;
                if !current.is_completed() {
                    return Err(e.into());
                }
                current
            }
        }
    } else {
        order
    };

    if !order.is_completed() {
        tracing::warn!(order_id = %order.id, status = %order.status, "PayPal order not captured");
        return Err(ApiError::BadRequest(format!(
            "PayPal order is {}",
            order.status
        )));
    }

    state.store.get_or_create_account(&auth.user_id).await?;

    let tx = CreditTransaction::purchase(auth.user_id, pack.credits, "paypal", &order.id);
    let event_id = format!("paypal:{}", order.id);

    let (credited, balance) = match state.store.credit_once(&event_id, "paypal", &tx).await {
        Ok(balance) => {
            tracing::info!(
                user_id = %auth.user_id,
                order_id = %order.id,
                credits = pack.credits,
                balance,
                "Credits added from PayPal capture"
            );
            (true, balance)
        }
        Err(StoreError::DuplicateEvent { .. }) => {
            tracing::info!(order_id = %order.id, "PayPal order already credited");
            let account = state.store.get_or_create_account(&auth.user_id).await?;
            (false, account.balance)
        }
        Err(e) => return Err(e.into()),
    };

    Ok(Json(CaptureResponse {
        order_id: order.id,
        status: order.status,
        credited,
        credits: pack.credits,
        balance,
    }))
}
