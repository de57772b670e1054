//! Stripe webhook handler.

use std::sync::Arc;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crav_core::{CreditAccount, CreditTransaction, Plan, SubscriptionStatus, UserId};
use crav_store::StoreError;

use crate::error::ApiError;
use crate::state::AppState;
use crate::stripe::{verify_webhook, CheckoutSession, Invoice, Subscription, WebhookEvent};

/// Webhook response.
#[derive(Debug, Serialize)]
pub struct WebhookResponse {
    /// Always `true` once the signature checked out.
    pub received: bool,
    /// The event (or the payment it carries) was already applied.
    pub duplicate: bool,
}

/// Handle Stripe webhooks.
///
/// The event id is claimed before anything is applied, so a redelivery is
/// answered with `duplicate` and changes nothing. A failed event releases its
/// claim. Credit grants are also keyed by payment through `credit_once`, so
/// two events for the same session pay out once.
pub async fn stripe_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: String,
) -> Result<Json<WebhookResponse>, ApiError> {
    let secret = state
        .config
        .stripe_webhook_secret
        .as_deref()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| {
            tracing::error!("Stripe webhook received but STRIPE_WEBHOOK_SECRET is not set");
            ApiError::ExternalService("Stripe webhooks not configured".into())
        })?;

    let signature = headers
        .get("stripe-signature")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::BadRequest("Missing Stripe signature".into()))?;

    let event = verify_webhook(secret, &body, signature, Utc::now().timestamp()).map_err(|e| {
        tracing::warn!(error = %e, "Rejected Stripe webhook");
        ApiError::from(e)
    })?;

    tracing::info!(
        event_type = %event.event_type,
        event_id = %event.id,
        "Received Stripe webhook"
    );

    if !state.store.record_event(&event.id, "stripe").await? {
        tracing::info!(event_id = %event.id, "Stripe event already processed");
        return Ok(Json(WebhookResponse {
            received: true,
            duplicate: true,
        }));
    }

    match dispatch(&state, &event).await {
        Ok(duplicate) => Ok(Json(WebhookResponse {
            received: true,
            duplicate,
        })),
        Err(e) => {
            // Release the claim so Stripe's retry is processed.
            if let Err(release) = state.store.forget_event(&event.id).await {
                tracing::error!(event_id = %event.id, error = %release, "Failed to release Stripe event");
            }
            Err(e)
        }
    }
}

/// Apply one event. Returns whether the payment it carries was already
/// credited under another event id.
async fn dispatch(state: &AppState, event: &WebhookEvent) -> Result<bool, ApiError> {
    match event.event_type.as_str() {
        "checkout.session.completed" => handle_checkout_completed(state, event).await,
        "customer.subscription.created" | "customer.subscription.updated" => {
            handle_subscription_update(state, event).await?;
            Ok(false)
        }
        "customer.subscription.deleted" => {
            handle_subscription_deleted(state, event).await?;
            Ok(false)
        }
        "invoice.payment_failed" => {
            handle_payment_failed(state, event).await?;
            Ok(false)
        }
        _ => {
            tracing::debug!(event_type = %event.event_type, "Unhandled Stripe event");
            Ok(false)
        }
    }
}

fn parse_object<T: serde::de::DeserializeOwned>(event: &WebhookEvent) -> Result<T, ApiError> {
    serde_json::from_value(event.data.object.clone()).map_err(|e| {
        tracing::warn!(event_id = %event.id, error = %e, "Malformed Stripe event object");
        ApiError::BadRequest(format!("Malformed {} object", event.event_type))
    })
}

fn parse_user_id(raw: &str) -> Result<UserId, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::BadRequest(format!("Invalid user_id: {raw}")))
}

/// Grant the purchased pack. Returns whether the session was already paid out.
async fn handle_checkout_completed(
    state: &AppState,
    event: &WebhookEvent,
) -> Result<bool, ApiError> {
    let session: CheckoutSession = parse_object(event)?;

    if session.payment_status.as_deref() != Some("paid") {
        tracing::info!(
            session_id = %session.id,
            payment_status = ?session.payment_status,
            "Checkout session not paid yet, skipping"
        );
        return Ok(false);
    }

    let user_raw = session
        .metadata_str("user_id")
        .or(session.client_reference_id.as_deref())
        .ok_or_else(|| ApiError::BadRequest("Checkout session has no user_id".into()))?;
    let user_id = parse_user_id(user_raw)?;

    // The pack id wins over the credits field so prices stay server-side.
    let credits = match session.metadata_str("pack") {
        Some(pack) => state.config.pricing.pack(pack)?.credits,
        None => session
            .metadata_str("credits")
            .and_then(|c| c.parse::<i64>().ok())
            .filter(|c| *c > 0)
            .ok_or_else(|| ApiError::BadRequest("Checkout session has no pack".into()))?,
    };

    let mut account = state.store.get_or_create_account(&user_id).await?;
    if account.stripe_customer_id.is_none() && session.customer.is_some() {
        account.stripe_customer_id.clone_from(&session.customer);
        state.store.update_subscription(&account).await?;
    }

    let tx = CreditTransaction::purchase(user_id, credits, "stripe", &session.id);
    let key = format!("stripe:checkout:{}", session.id);

    match state.store.credit_once(&key, "stripe", &tx).await {
        Ok(balance) => {
            tracing::info!(
                user_id = %user_id,
                session_id = %session.id,
                credits,
                amount_total = ?session.amount_total,
                new_balance = balance,
                transaction_id = %tx.id,
                "Credits added from Stripe checkout"
            );
            Ok(false)
        }
        Err(StoreError::DuplicateEvent { .. }) => {
            tracing::info!(session_id = %session.id, "Checkout session already credited");
            Ok(true)
        }
        Err(e) => Err(e.into()),
    }
}

/// Account for a Stripe customer, falling back to `metadata.user_id`.
async fn account_for_customer(
    state: &AppState,
    customer_id: &str,
    metadata_user: Option<&str>,
) -> Result<Option<CreditAccount>, ApiError> {
    if let Some(account) = state.store.find_account_by_stripe_customer(customer_id).await? {
        return Ok(Some(account));
    }
    match metadata_user {
        Some(raw) => {
            let user_id = parse_user_id(raw)?;
            Ok(Some(state.store.get_or_create_account(&user_id).await?))
        }
        None => Ok(None),
    }
}

async fn handle_subscription_update(state: &AppState, event: &WebhookEvent) -> Result<(), ApiError> {
    let subscription: Subscription = parse_object(event)?;
    let metadata_user = subscription
        .metadata
        .get("user_id")
        .and_then(serde_json::Value::as_str);

    let Some(mut account) =
        account_for_customer(state, &subscription.customer, metadata_user).await?
    else {
        tracing::warn!(
            customer = %subscription.customer,
            subscription_id = %subscription.id,
            "Subscription for unknown customer, ignoring"
        );
        return Ok(());
    };

    let status = SubscriptionStatus::from_stripe(&subscription.status);
    let plan = match subscription.plan_name().map(str::parse::<Plan>) {
        Some(Ok(plan)) => plan,
        Some(Err(e)) => {
            tracing::warn!(subscription_id = %subscription.id, error = %e, "Unknown plan on subscription");
            account.plan
        }
        None => account.plan,
    };

    account.plan = if status == SubscriptionStatus::Canceled {
        Plan::Free
    } else {
        plan
    };
    account.subscription_status = Some(status);
    account.subscription_period_end = subscription
        .current_period_end
        .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0));
    account.stripe_customer_id = Some(subscription.customer.clone());
    account.stripe_subscription_id = Some(subscription.id.clone());

    state.store.update_subscription(&account).await?;

    tracing::info!(
        user_id = %account.user_id,
        subscription_id = %subscription.id,
        plan = account.plan.as_str(),
        status = status.as_str(),
        "Subscription updated"
    );

    // The first period's allowance is granted when the subscription starts;
    // later periods come from the monthly-credits job.
    if event.event_type == "customer.subscription.created" && account.has_active_subscription() {
        let credits = account.plan.monthly_credits();
        let tx = CreditTransaction::plan_grant(account.user_id, credits, account.plan.as_str())
            .with_external_ref(subscription.id.clone());
        let key = format!("stripe:subscription-start:{}", subscription.id);
        match state.store.credit_once(&key, "stripe", &tx).await {
            Ok(balance) => {
                tracing::info!(user_id = %account.user_id, credits, balance, "Initial plan credits granted");
            }
            Err(StoreError::DuplicateEvent { .. }) => {}
            Err(e) => return Err(e.into()),
        }
    }

    Ok(())
}

async fn handle_subscription_deleted(
    state: &AppState,
    event: &WebhookEvent,
) -> Result<(), ApiError> {
    let subscription: Subscription = parse_object(event)?;

    let Some(mut account) = state
        .store
        .find_account_by_stripe_customer(&subscription.customer)
        .await?
    else {
        tracing::warn!(customer = %subscription.customer, "Deleted subscription for unknown customer");
        return Ok(());
    };

    account.plan = Plan::Free;
    account.subscription_status = Some(SubscriptionStatus::Canceled);
    account.subscription_period_end = None;
    account.stripe_subscription_id = None;
    state.store.update_subscription(&account).await?;

    tracing::info!(
        user_id = %account.user_id,
        subscription_id = %subscription.id,
        "Subscription cancelled"
    );

    Ok(())
}

async fn handle_payment_failed(state: &AppState, event: &WebhookEvent) -> Result<(), ApiError> {
    let invoice: Invoice = parse_object(event)?;

    let account = match invoice.customer.as_deref() {
        Some(customer) => state.store.find_account_by_stripe_customer(customer).await?,
        None => None,
    };
    let Some(mut account) = account else {
        tracing::warn!(invoice_id = %invoice.id, "Failed invoice for unknown customer");
        return Ok(());
    };

    account.subscription_status = Some(SubscriptionStatus::PastDue);
    state.store.update_subscription(&account).await?;

    tracing::warn!(
        user_id = %account.user_id,
        invoice_id = %invoice.id,
        subscription_id = ?invoice.subscription,
        "Payment failed, subscription past due"
    );

    Ok(())
}
