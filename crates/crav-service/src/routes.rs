//! Router configuration.
//!
//! This module sets up the Axum router with all routes and middleware.

use std::sync::Arc;
use std::time::Duration;

use axum::routing::{delete, get, patch, post, put};
use axum::Router;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::handlers::{
    admin, avatar, chat, checkout, collectibles, credits, cron, flags, health, marketplace,
    newsletter, pricing, reports, webhooks,
};
use crate::state::AppState;

/// Maximum concurrent requests for public and user API endpoints.
const API_MAX_CONCURRENT_REQUESTS: usize = 100;

/// Maximum concurrent requests for admin and cron endpoints.
const ADMIN_MAX_CONCURRENT_REQUESTS: usize = 10;

/// Create the service router with all routes and middleware.
///
/// # Routes
///
/// ## Public
/// - `GET /health` - Liveness
/// - `GET /api/pricing` - Plans, packs and feature costs
/// - `POST /api/chat` - Chat widget reply
/// - `GET /api/avatar/glow`, `GET /api/avatar/active` - Avatar state
/// - `POST /api/newsletter/subscribe|unsubscribe`
/// - `GET /api/marketplace/categories|vendors`, `GET /api/collectibles`
/// - `GET /api/flags/{key}` - Flag check (user optional)
///
/// ## User (Supabase JWT)
/// - `GET /api/credits/balance|transactions`
/// - `POST /api/credits/spend|refund`
/// - `POST /api/checkout/stripe|paypal|paypal/capture`
/// - `PUT|DELETE /api/avatar/active`
/// - `POST /api/reports`, `POST /api/collectibles`, `DELETE /api/collectibles/{id}`
///
/// ## Internal / cron / admin (shared secrets)
/// - `POST /api/internal/credits/spend`
/// - `POST /api/cron/{job}`
/// - `/api/admin/...`
///
/// ## Webhooks (signature verification)
/// - `POST /webhooks/stripe`
pub fn create_router(state: AppState) -> Router {
    let cors_origins = state.config.cors_origins.clone();
    let max_body_bytes = state.config.max_body_bytes;
    let request_timeout_seconds = state.config.request_timeout_seconds;

    let cors = build_cors_layer(&cors_origins);

    let state = Arc::new(state);

    let admin_routes = Router::new()
        .route("/health", get(admin::health::system_health))
        .route("/compliance", get(admin::compliance::run_checks))
        .route("/flags", get(admin::list_flags))
        .route(
            "/flags/:key",
            put(admin::upsert_flag).delete(admin::delete_flag),
        )
        .route("/reports", get(admin::list_reports))
        .route("/reports/:id/resolve", post(admin::resolve_report))
        .route("/grants", get(admin::list_grants).post(admin::create_grant))
        .route("/grants/:id", patch(admin::update_grant))
        .route("/vendors", post(admin::create_vendor))
        .route("/credits/grant", post(admin::grant_credits));

    let ops_routes = Router::new()
        .route("/cron/:job", post(cron::run_job))
        .nest("/admin", admin_routes)
        .layer(ConcurrencyLimitLayer::new(ADMIN_MAX_CONCURRENT_REQUESTS));

    let api_routes = Router::new()
        .route("/pricing", get(pricing::get_pricing))
        // Credits
        .route("/credits/balance", get(credits::get_balance))
        .route("/credits/transactions", get(credits::list_transactions))
        .route("/credits/spend", post(credits::spend))
        .route("/credits/refund", post(credits::refund))
        .route("/internal/credits/spend", post(credits::internal_spend))
        // Checkout
        .route("/checkout/stripe", post(checkout::stripe_checkout))
        .route("/checkout/paypal", post(checkout::paypal_checkout))
        .route("/checkout/paypal/capture", post(checkout::paypal_capture))
        // Widget
        .route("/flags/:key", get(flags::get_flag))
        .route("/chat", post(chat::chat))
        .route("/avatar/glow", get(avatar::glow_table))
        .route(
            "/avatar/active",
            get(avatar::get_active)
                .put(avatar::set_active)
                .delete(avatar::clear_active),
        )
        // Content
        .route("/newsletter/subscribe", post(newsletter::subscribe))
        .route("/newsletter/unsubscribe", post(newsletter::unsubscribe))
        .route("/reports", post(reports::create_report))
        .route("/marketplace/categories", get(marketplace::list_categories))
        .route("/marketplace/vendors", get(marketplace::list_vendors))
        .route(
            "/collectibles",
            get(collectibles::list_collectibles).post(collectibles::add_collectible),
        )
        .route(
            "/collectibles/:id",
            delete(collectibles::delete_collectible),
        )
        .layer(ConcurrencyLimitLayer::new(API_MAX_CONCURRENT_REQUESTS))
        // Operations (own limit)
        .merge(ops_routes);

    Router::new()
        // Health (public, no rate limit)
        .route("/health", get(health::health))
        .nest("/api", api_routes)
        // Webhooks (no rate limit - controlled by external services)
        .route("/webhooks/stripe", post(webhooks::stripe_webhook))
        // Global middleware
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .layer(TimeoutLayer::new(Duration::from_secs(
            request_timeout_seconds,
        )))
        .with_state(state)
}

/// Build the CORS layer from configured origins.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|o| o == "*") {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    }
}
