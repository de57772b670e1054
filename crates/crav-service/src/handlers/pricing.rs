//! Pricing data for the Pricing page.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crav_core::pricing::PlanSummary;
use crav_core::{CreditPack, SIGNUP_BONUS_CREDITS};

use crate::state::AppState;

/// Pricing response.
#[derive(Debug, Serialize)]
pub struct PricingResponse {
    /// Subscription plans.
    pub plans: Vec<PlanSummary>,
    /// One-off credit packs.
    pub packs: Vec<CreditPack>,
    /// Credits per unit of each feature.
    pub feature_costs: BTreeMap<String, i64>,
    /// Credits granted on first sign-in.
    pub signup_bonus: i64,
}

/// Plans, packs and feature costs.
pub async fn get_pricing(State(state): State<Arc<AppState>>) -> Json<PricingResponse> {
    let pricing = &state.config.pricing;
    Json(PricingResponse {
        plans: pricing.plans(),
        packs: pricing.packs.clone(),
        feature_costs: pricing.feature_costs.clone(),
        signup_bonus: SIGNUP_BONUS_CREDITS,
    })
}
