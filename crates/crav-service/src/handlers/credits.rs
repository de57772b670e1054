//! Credit balance, spending and refund handlers.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use crav_core::{CreditAccount, CreditTransaction, TransactionId, TransactionKind, UserId};

use super::{default_limit, MAX_PAGE_SIZE};
use crate::auth::{AuthUser, InternalAuth};
use crate::error::ApiError;
use crate::state::AppState;

/// Balance response.
#[derive(Debug, Serialize)]
pub struct BalanceResponse {
    /// Spendable credits.
    pub balance: i64,
    /// Current plan.
    pub plan: String,
    /// Stripe subscription status, if any.
    pub subscription_status: Option<String>,
    /// End of the current billing period (RFC 3339).
    pub period_end: Option<String>,
    /// Credits bought.
    pub lifetime_purchased: i64,
    /// Credits granted by plans and bonuses.
    pub lifetime_granted: i64,
    /// Credits spent.
    pub lifetime_spent: i64,
}

impl From<&CreditAccount> for BalanceResponse {
    fn from(account: &CreditAccount) -> Self {
        Self {
            balance: account.balance,
            plan: account.plan.as_str().to_string(),
            subscription_status: account
                .subscription_status
                .map(|s| s.as_str().to_string()),
            period_end: account.subscription_period_end.map(|t| t.to_rfc3339()),
            lifetime_purchased: account.lifetime_purchased,
            lifetime_granted: account.lifetime_granted,
            lifetime_spent: account.lifetime_spent,
        }
    }
}

/// Get current credit balance, creating the account on first access.
pub async fn get_balance(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
) -> Result<Json<BalanceResponse>, ApiError> {
    let account = state.store.get_or_create_account(&auth.user_id).await?;
    Ok(Json(BalanceResponse::from(&account)))
}

/// Transaction list query parameters.
#[derive(Debug, Deserialize)]
pub struct ListTransactionsQuery {
    /// Maximum number of transactions to return (default: 50, max 100).
    #[serde(default = "default_limit")]
    pub limit: usize,
    /// Offset for pagination (default: 0).
    #[serde(default)]
    pub offset: usize,
}

/// Transaction response.
#[derive(Debug, Serialize)]
pub struct TransactionResponse {
    /// Transaction ID.
    pub id: String,
    /// Signed amount (negative = debit).
    pub amount: i64,
    /// Transaction kind.
    pub kind: TransactionKind,
    /// Balance after this transaction.
    pub balance_after: i64,
    /// Feature, for spends and their refunds.
    pub feature: Option<String>,
    /// Description.
    pub description: String,
    /// Refunded spend, for refunds.
    pub refund_of: Option<String>,
    /// Timestamp.
    pub created_at: String,
}

impl From<&CreditTransaction> for TransactionResponse {
    fn from(tx: &CreditTransaction) -> Self {
        Self {
            id: tx.id.to_string(),
            amount: tx.amount,
            kind: tx.kind,
            balance_after: tx.balance_after,
            feature: tx.feature.clone(),
            description: tx.description.clone(),
            refund_of: tx.refund_of.map(|id| id.to_string()),
            created_at: tx.created_at.to_rfc3339(),
        }
    }
}

/// List transactions response.
#[derive(Debug, Serialize)]
pub struct ListTransactionsResponse {
    /// Transactions (newest first).
    pub transactions: Vec<TransactionResponse>,
    /// Whether there are more transactions.
    pub has_more: bool,
}

/// List transaction history.
pub async fn list_transactions(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Query(query): Query<ListTransactionsQuery>,
) -> Result<Json<ListTransactionsResponse>, ApiError> {
    state.store.get_or_create_account(&auth.user_id).await?;

    // Fetch one more than requested to determine has_more
    let limit = query.limit.clamp(1, MAX_PAGE_SIZE);
    let transactions = state
        .store
        .list_transactions(&auth.user_id, limit + 1, query.offset)
        .await?;

    let has_more = transactions.len() > limit;
    let transactions = transactions
        .iter()
        .take(limit)
        .map(TransactionResponse::from)
        .collect();

    Ok(Json(ListTransactionsResponse {
        transactions,
        has_more,
    }))
}

/// Spend request.
#[derive(Debug, Deserialize)]
pub struct SpendRequest {
    /// Priced feature (e.g. `image_generation`).
    pub feature: String,
    /// Units used (default: 1).
    #[serde(default = "default_quantity")]
    pub quantity: u32,
}

const fn default_quantity() -> u32 {
    1
}

/// Spend response.
#[derive(Debug, Serialize)]
pub struct SpendResponse {
    /// Ledger row, needed to request a refund.
    pub transaction_id: String,
    /// Credits taken.
    pub credits_spent: i64,
    /// Balance afterwards.
    pub balance: i64,
}

/// Spend credits for a feature.
pub async fn spend(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Json(body): Json<SpendRequest>,
) -> Result<Json<SpendResponse>, ApiError> {
    spend_for(&state, auth.user_id, &body.feature, body.quantity)
        .await
        .map(Json)
}

/// Internal spend request (service-to-service).
#[derive(Debug, Deserialize)]
pub struct InternalSpendRequest {
    /// User to charge.
    pub user_id: UserId,
    /// Priced feature.
    pub feature: String,
    /// Units used (default: 1).
    #[serde(default = "default_quantity")]
    pub quantity: u32,
}

/// Spend credits on behalf of a user from another service.
pub async fn internal_spend(
    State(state): State<Arc<AppState>>,
    service: InternalAuth,
    Json(body): Json<InternalSpendRequest>,
) -> Result<Json<SpendResponse>, ApiError> {
    tracing::debug!(service = %service.service_name, user_id = %body.user_id, "Internal spend");
    spend_for(&state, body.user_id, &body.feature, body.quantity)
        .await
        .map(Json)
}

async fn spend_for(
    state: &AppState,
    user_id: UserId,
    feature: &str,
    quantity: u32,
) -> Result<SpendResponse, ApiError> {
    let cost = state.config.pricing.cost_of(feature, quantity)?;
    state.store.get_or_create_account(&user_id).await?;

    let tx = CreditTransaction::spend(user_id, cost, feature, quantity);
    let balance = state.store.spend(&tx).await.map_err(|e| {
        tracing::info!(user_id = %user_id, feature, cost, error = %e, "Spend rejected");
        ApiError::from(e)
    })?;

    tracing::info!(
        user_id = %user_id,
        feature,
        quantity,
        cost,
        balance,
        transaction_id = %tx.id,
        "Credits spent"
    );

    Ok(SpendResponse {
        transaction_id: tx.id.to_string(),
        credits_spent: cost,
        balance,
    })
}

/// Refund request.
#[derive(Debug, Deserialize)]
pub struct RefundRequest {
    /// The spend to reverse.
    pub transaction_id: String,
    /// Why (e.g. generation failed).
    #[serde(default)]
    pub reason: Option<String>,
}

/// Refund response.
#[derive(Debug, Serialize)]
pub struct RefundResponse {
    /// The refund's ledger row.
    pub transaction_id: String,
    /// Credits returned.
    pub credits_refunded: i64,
    /// Balance afterwards.
    pub balance: i64,
}

/// Refund one of the caller's own spends. Each spend refunds at most once.
pub async fn refund(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Json(body): Json<RefundRequest>,
) -> Result<Json<RefundResponse>, ApiError> {
    let id: TransactionId = body
        .transaction_id
        .parse()
        .map_err(|_| ApiError::BadRequest("Invalid transaction_id".into()))?;

    // Someone else's transaction looks the same as a missing one.
    let original = state
        .store
        .get_transaction(&id)
        .await?
        .filter(|tx| tx.user_id == auth.user_id)
        .ok_or_else(|| ApiError::NotFound("Transaction not found".into()))?;

    if original.kind != TransactionKind::Spend {
        return Err(ApiError::BadRequest("Only spends can be refunded".into()));
    }

    let reason = body.reason.as_deref().unwrap_or("requested by user");
    let tx = CreditTransaction::refund(&original, reason);
    let balance = state.store.credit(&tx).await?;

    tracing::info!(
        user_id = %auth.user_id,
        refund_of = %original.id,
        credits = tx.amount,
        balance,
        "Spend refunded"
    );

    Ok(Json(RefundResponse {
        transaction_id: tx.id.to_string(),
        credits_refunded: tx.amount,
        balance,
    }))
}
