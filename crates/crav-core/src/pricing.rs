//! Feature prices and credit packs.
//!
//! These tables back the Pricing page and every spend: a feature's cost is
//! looked up here, never supplied by the caller.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::CoreError;
use crate::Plan;

/// Largest quantity accepted for a single spend.
pub const MAX_SPEND_QUANTITY: u32 = 100;

/// A credit pack sold through Stripe or PayPal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditPack {
    /// Pack id used in checkout requests.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Credits delivered on payment.
    pub credits: i64,
    /// Price in US cents.
    pub price_cents: i64,
}

/// Plan summary for the Pricing page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanSummary {
    /// Plan.
    pub plan: Plan,
    /// Monthly price in US cents.
    pub monthly_price_cents: i64,
    /// Credits granted per period.
    pub monthly_credits: i64,
}

/// Credit costs per feature and the packs on sale.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricingConfig {
    /// Cost of one use of each feature.
    pub feature_costs: BTreeMap<String, i64>,

    /// Packs on sale, cheapest first.
    pub packs: Vec<CreditPack>,
}

impl Default for PricingConfig {
    fn default() -> Self {
        let feature_costs = [
            ("chat_message", 1),
            ("image_generation", 5),
            ("logo_generation", 10),
            ("audio_visualization", 15),
            ("voice_clone", 20),
            ("video_render", 25),
        ]
        .into_iter()
        .map(|(name, cost)| (name.to_string(), cost))
        .collect();

        let pack = |id: &str, name: &str, credits, price_cents| CreditPack {
            id: id.to_string(),
            name: name.to_string(),
            credits,
            price_cents,
        };

        Self {
            feature_costs,
            packs: vec![
                pack("starter", "Starter Pack", 100, 999),
                pack("creator", "Creator Pack", 500, 3999),
                pack("pro", "Pro Pack", 1200, 7999),
                pack("studio", "Studio Pack", 3000, 17999),
            ],
        }
    }
}

impl PricingConfig {
    /// Total credits for `quantity` uses of `feature`.
    ///
    /// # Errors
    ///
    /// `UnknownFeature` if the feature is not priced, `InvalidInput` if the
    /// quantity is zero or above [`MAX_SPEND_QUANTITY`].
    pub fn cost_of(&self, feature: &str, quantity: u32) -> Result<i64, CoreError> {
        if quantity == 0 || quantity > MAX_SPEND_QUANTITY {
            return Err(CoreError::InvalidInput(format!(
                "quantity must be between 1 and {MAX_SPEND_QUANTITY}"
            )));
        }
        let unit = self
            .feature_costs
            .get(feature)
            .ok_or_else(|| CoreError::UnknownFeature(feature.to_string()))?;
        Ok(unit * i64::from(quantity))
    }

    /// Look up a pack by id.
    ///
    /// # Errors
    ///
    /// `UnknownPack` if no pack has that id.
    pub fn pack(&self, id: &str) -> Result<&CreditPack, CoreError> {
        self.packs
            .iter()
            .find(|p| p.id == id)
            .ok_or_else(|| CoreError::UnknownPack(id.to_string()))
    }

    /// Plan rows for the Pricing page.
    #[must_use]
    pub fn plans(&self) -> Vec<PlanSummary> {
        Plan::ALL
            .iter()
            .map(|&plan| PlanSummary {
                plan,
                monthly_price_cents: plan.monthly_price_cents(),
                monthly_credits: plan.monthly_credits(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cost_scales_with_quantity() {
        let pricing = PricingConfig::default();
        assert_eq!(pricing.cost_of("image_generation", 1).unwrap(), 5);
        assert_eq!(pricing.cost_of("image_generation", 4).unwrap(), 20);
    }

    #[test]
    fn unknown_feature_is_rejected() {
        let pricing = PricingConfig::default();
        assert_eq!(
            pricing.cost_of("time_travel", 1),
            Err(CoreError::UnknownFeature("time_travel".into()))
        );
    }

    #[test]
    fn quantity_bounds_are_enforced() {
        let pricing = PricingConfig::default();
        assert!(pricing.cost_of("chat_message", 0).is_err());
        assert!(pricing.cost_of("chat_message", MAX_SPEND_QUANTITY).is_ok());
        assert!(pricing.cost_of("chat_message", MAX_SPEND_QUANTITY + 1).is_err());
    }

    #[test]
    fn packs_lookup() {
        let pricing = PricingConfig::default();
        assert_eq!(pricing.pack("creator").unwrap().credits, 500);
        assert!(pricing.pack("mega").is_err());
    }

    #[test]
    fn plans_cover_every_tier() {
        let plans = PricingConfig::default().plans();
        assert_eq!(plans.len(), 4);
        assert_eq!(plans[2].plan, Plan::Pro);
        assert_eq!(plans[2].monthly_credits, 2000);
    }
}
