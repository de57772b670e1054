//! Common test utilities for crav-service integration tests.

#![allow(dead_code)] // Some utilities are used by different test files

use std::sync::Arc;

use axum::http::header::AUTHORIZATION;
use axum::http::{HeaderName, HeaderValue};
use axum::Router;
use axum_test::{TestRequest, TestServer};
use chrono::Utc;
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::json;

use crav_core::UserId;
use crav_service::crypto::stripe_signature_header;
use crav_service::{create_router, AppState, ServiceConfig};
use crav_store::MemoryStore;

pub const JWT_SECRET: &str = "test-jwt-secret-with-at-least-32-bytes!!";
pub const ADMIN_SECRET: &str = "test-admin-secret";
pub const CRON_SECRET: &str = "test-cron-secret";
pub const INTERNAL_SECRET: &str = "test-internal-secret";
pub const WEBHOOK_SECRET: &str = "whsec_test_secret";

/// Test harness containing everything needed for integration tests.
pub struct TestHarness {
    /// The test server for making HTTP requests.
    pub server: TestServer,
    /// Direct handle on the store for setup and assertions.
    pub store: Arc<MemoryStore>,
    /// A test user ID for authenticated requests.
    pub test_user_id: UserId,
}

/// Configuration with every shared secret set and no payment providers.
pub fn test_config() -> ServiceConfig {
    ServiceConfig {
        listen_addr: "127.0.0.1:0".into(),
        supabase_jwt_secret: Some(JWT_SECRET.into()),
        admin_secret: Some(ADMIN_SECRET.into()),
        cron_secret: Some(CRON_SECRET.into()),
        internal_api_secret: Some(INTERNAL_SECRET.into()),
        stripe_webhook_secret: Some(WEBHOOK_SECRET.into()),
        ..ServiceConfig::default()
    }
}

impl TestHarness {
    /// Create a new test harness with a fresh in-memory store.
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    /// Create a harness with a custom configuration.
    pub fn with_config(config: ServiceConfig) -> Self {
        let store = Arc::new(MemoryStore::new());
        let state = AppState::new(store.clone(), config);
        let router: Router = create_router(state);

        let server = TestServer::new(router).expect("Failed to create test server");

        Self {
            server,
            store,
            test_user_id: UserId::generate(),
        }
    }

    /// Authorization header for the test user.
    pub fn user_auth(&self) -> (HeaderName, HeaderValue) {
        user_auth_for(&self.test_user_id)
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

/// Attach a `(name, value)` header pair to a request.
pub trait WithHeader {
    fn with(self, header: (HeaderName, HeaderValue)) -> Self;
}

impl WithHeader for TestRequest {
    fn with(self, (name, value): (HeaderName, HeaderValue)) -> Self {
        self.add_header(name, value)
    }
}

/// Sign a Supabase-style access token.
pub fn mint_token(user_id: &UserId, secret: &str, audience: &str) -> String {
    let claims = json!({
        "sub": user_id.to_string(),
        "aud": audience,
        "role": "authenticated",
        "email": "tester@example.com",
        "exp": Utc::now().timestamp() + 3600,
    });
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .expect("Failed to sign token")
}

fn header(name: HeaderName, value: &str) -> (HeaderName, HeaderValue) {
    (name, HeaderValue::from_str(value).expect("Invalid header value"))
}

/// Authorization header for any user.
pub fn user_auth_for(user_id: &UserId) -> (HeaderName, HeaderValue) {
    let token = mint_token(user_id, JWT_SECRET, "authenticated");
    header(AUTHORIZATION, &format!("Bearer {token}"))
}

/// Authorization header carrying an arbitrary bearer value.
pub fn bearer(value: &str) -> (HeaderName, HeaderValue) {
    header(AUTHORIZATION, &format!("Bearer {value}"))
}

pub fn admin_auth() -> (HeaderName, HeaderValue) {
    header(HeaderName::from_static("x-admin-secret"), ADMIN_SECRET)
}

pub fn cron_auth() -> (HeaderName, HeaderValue) {
    bearer(CRON_SECRET)
}

pub fn internal_auth() -> (HeaderName, HeaderValue) {
    header(HeaderName::from_static("x-internal-secret"), INTERNAL_SECRET)
}

/// `Stripe-Signature` header for `payload` signed now.
pub fn stripe_signature(payload: &str) -> (HeaderName, HeaderValue) {
    let value = stripe_signature_header(WEBHOOK_SECRET, Utc::now().timestamp(), payload);
    header(HeaderName::from_static("stripe-signature"), &value)
}
