//! Stripe integration: Checkout sessions for credit packs and webhook
//! signature verification.

pub mod client;
pub mod types;

pub use client::{verify_webhook, StripeClient, StripeError, WEBHOOK_TOLERANCE_SECONDS};
pub use types::*;
