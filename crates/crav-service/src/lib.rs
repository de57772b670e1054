//! CR AudioViz AI back-office HTTP service.
//!
//! This crate provides the HTTP API behind the CR AudioViz AI site:
//!
//! - Credit balance, spending, refunds and the transaction ledger
//! - Credit-pack checkout through Stripe and PayPal, plus Stripe webhooks
//! - Feature flags, the chat widget and the active avatar
//! - Newsletter, moderation reports, marketplace and collectibles
//! - Admin tooling and cron jobs
//!
//! # Authentication
//!
//! 1. **Supabase JWTs** - end-user requests (`Authorization: Bearer`)
//! 2. **Shared secrets** - admin (`x-admin-secret`), cron (`CRON_SECRET`)
//!    and internal services (`x-internal-secret`)

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
// Allow some pedantic lints that are noisy for Axum handler functions
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::unused_async)]

pub mod auth;
pub mod avatar;
pub mod config;
pub mod cron;
pub mod crypto;
pub mod error;
pub mod flags;
pub mod handlers;
pub mod paypal;
pub mod routes;
pub mod state;
pub mod stripe;

pub use config::ServiceConfig;
pub use error::ApiError;
pub use paypal::{PayPalClient, PayPalError};
pub use routes::create_router;
pub use state::AppState;
pub use stripe::{StripeClient, StripeError};
