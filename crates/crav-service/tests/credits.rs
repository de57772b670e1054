//! Credit balance, spend and refund integration tests.

mod common;

use std::time::Duration;

use axum::http::StatusCode;
use common::{bearer, internal_auth, mint_token, user_auth_for, TestHarness, WithHeader, JWT_SECRET};
use crav_core::UserId;
use serde_json::json;

async fn spend(harness: &TestHarness, feature: &str, quantity: u32) -> serde_json::Value {
    let response = harness
        .server
        .post("/api/credits/spend")
        .with(harness.user_auth())
        .json(&json!({ "feature": feature, "quantity": quantity }))
        .await;
    response.assert_status_ok();
    response.json()
}

async fn balance(harness: &TestHarness) -> i64 {
    let response = harness
        .server
        .get("/api/credits/balance")
        .with(harness.user_auth())
        .await;
    response.assert_status_ok();
    response.json::<serde_json::Value>()["balance"]
        .as_i64()
        .unwrap()
}

// ============================================================================
// Pricing
// ============================================================================

#[tokio::test]
async fn pricing_is_public() {
    let harness = TestHarness::new();

    let response = harness.server.get("/api/pricing").await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();

    assert_eq!(body["signup_bonus"], 50);
    assert_eq!(body["feature_costs"]["image_generation"], 5);
    assert_eq!(body["packs"].as_array().unwrap().len(), 4);
    assert_eq!(body["packs"][0]["id"], "starter");
    let plans = body["plans"].as_array().unwrap();
    assert_eq!(plans.len(), 4);
    assert_eq!(plans[0]["plan"], "free");
}

// ============================================================================
// Balance
// ============================================================================

#[tokio::test]
async fn first_balance_includes_signup_bonus() {
    let harness = TestHarness::new();

    let response = harness
        .server
        .get("/api/credits/balance")
        .with(harness.user_auth())
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["balance"], 50);
    assert_eq!(body["plan"], "free");
    assert_eq!(body["lifetime_granted"], 50);
    assert_eq!(body["lifetime_spent"], 0);

    // A second read does not grant the bonus again.
    assert_eq!(balance(&harness).await, 50);
}

#[tokio::test]
async fn balance_requires_a_valid_token() {
    let harness = TestHarness::new();

    harness
        .server
        .get("/api/credits/balance")
        .await
        .assert_status(StatusCode::UNAUTHORIZED);

    harness
        .server
        .get("/api/credits/balance")
        .with(bearer("not-a-jwt"))
        .await
        .assert_status(StatusCode::UNAUTHORIZED);

    let wrong_audience = mint_token(&harness.test_user_id, JWT_SECRET, "anon");
    harness
        .server
        .get("/api/credits/balance")
        .with(bearer(&wrong_audience))
        .await
        .assert_status(StatusCode::UNAUTHORIZED);

    let wrong_secret = mint_token(
        &harness.test_user_id,
        "another-secret-that-is-also-long-enough",
        "authenticated",
    );
    harness
        .server
        .get("/api/credits/balance")
        .with(bearer(&wrong_secret))
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
}

// ============================================================================
// Spend
// ============================================================================

#[tokio::test]
async fn spend_deducts_feature_cost() {
    let harness = TestHarness::new();

    let body = spend(&harness, "image_generation", 1).await;
    assert_eq!(body["credits_spent"], 5);
    assert_eq!(body["balance"], 45);
    assert!(body["transaction_id"].is_string());

    let body = spend(&harness, "chat_message", 3).await;
    assert_eq!(body["credits_spent"], 3);
    assert_eq!(body["balance"], 42);

    assert_eq!(balance(&harness).await, 42);
}

#[tokio::test]
async fn spend_with_insufficient_credits_is_rejected() {
    let harness = TestHarness::new();

    // 3 video renders cost 75, the bonus is 50.
    let response = harness
        .server
        .post("/api/credits/spend")
        .with(harness.user_auth())
        .json(&json!({ "feature": "video_render", "quantity": 3 }))
        .await;

    response.assert_status(StatusCode::PAYMENT_REQUIRED);
    let body: serde_json::Value = response.json();
    assert_eq!(body["error"]["code"], "insufficient_credits");
    assert_eq!(body["error"]["details"]["balance"], 50);
    assert_eq!(body["error"]["details"]["required"], 75);

    assert_eq!(balance(&harness).await, 50);
}

#[tokio::test]
async fn spend_rejects_unknown_feature_and_zero_quantity() {
    let harness = TestHarness::new();

    let response = harness
        .server
        .post("/api/credits/spend")
        .with(harness.user_auth())
        .json(&json!({ "feature": "teleport" }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    let body: serde_json::Value = response.json();
    assert_eq!(body["error"]["code"], "bad_request");

    harness
        .server
        .post("/api/credits/spend")
        .with(harness.user_auth())
        .json(&json!({ "feature": "chat_message", "quantity": 0 }))
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    assert_eq!(balance(&harness).await, 50);
}

#[tokio::test]
async fn spending_the_exact_balance_is_allowed() {
    let harness = TestHarness::new();

    let body = spend(&harness, "video_render", 2).await;
    assert_eq!(body["balance"], 0);

    harness
        .server
        .post("/api/credits/spend")
        .with(harness.user_auth())
        .json(&json!({ "feature": "chat_message" }))
        .await
        .assert_status(StatusCode::PAYMENT_REQUIRED);
}

// ============================================================================
// Refund
// ============================================================================

#[tokio::test]
async fn refund_restores_credits_once() {
    let harness = TestHarness::new();

    let spent = spend(&harness, "logo_generation", 1).await;
    assert_eq!(spent["balance"], 40);

    let response = harness
        .server
        .post("/api/credits/refund")
        .with(harness.user_auth())
        .json(&json!({
            "transaction_id": spent["transaction_id"],
            "reason": "generation failed"
        }))
        .await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["credits_refunded"], 10);
    assert_eq!(body["balance"], 50);

    let response = harness
        .server
        .post("/api/credits/refund")
        .with(harness.user_auth())
        .json(&json!({ "transaction_id": spent["transaction_id"] }))
        .await;
    response.assert_status(StatusCode::CONFLICT);

    assert_eq!(balance(&harness).await, 50);
}

#[tokio::test]
async fn refund_of_another_users_spend_is_not_found() {
    let harness = TestHarness::new();
    let spent = spend(&harness, "image_generation", 1).await;

    let stranger = UserId::generate();
    harness
        .server
        .post("/api/credits/refund")
        .with(user_auth_for(&stranger))
        .json(&json!({ "transaction_id": spent["transaction_id"] }))
        .await
        .assert_status(StatusCode::NOT_FOUND);

    assert_eq!(balance(&harness).await, 45);
}

#[tokio::test]
async fn refund_rejects_bad_ids_and_non_spends() {
    let harness = TestHarness::new();

    harness
        .server
        .post("/api/credits/refund")
        .with(harness.user_auth())
        .json(&json!({ "transaction_id": "definitely-not-an-id" }))
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    // The signup bonus is the only ledger row so far.
    let response = harness
        .server
        .get("/api/credits/transactions")
        .with(harness.user_auth())
        .await;
    let body: serde_json::Value = response.json();
    let bonus_id = body["transactions"][0]["id"].clone();
    assert_eq!(body["transactions"][0]["kind"], "signup_bonus");

    harness
        .server
        .post("/api/credits/refund")
        .with(harness.user_auth())
        .json(&json!({ "transaction_id": bonus_id }))
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}

// ============================================================================
// Ledger
// ============================================================================

#[tokio::test]
async fn transactions_are_newest_first_and_paged() {
    let harness = TestHarness::new();

    // Ledger ids order by millisecond, so keep the rows apart.
    balance(&harness).await;
    tokio::time::sleep(Duration::from_millis(5)).await;
    spend(&harness, "chat_message", 1).await;
    tokio::time::sleep(Duration::from_millis(5)).await;
    spend(&harness, "image_generation", 1).await;

    let response = harness
        .server
        .get("/api/credits/transactions?limit=2")
        .with(harness.user_auth())
        .await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();

    let rows = body["transactions"].as_array().unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["feature"], "image_generation");
    assert_eq!(rows[0]["amount"], -5);
    assert_eq!(rows[0]["balance_after"], 44);
    assert_eq!(rows[1]["feature"], "chat_message");
    assert_eq!(body["has_more"], true);

    let response = harness
        .server
        .get("/api/credits/transactions?limit=2&offset=2")
        .with(harness.user_auth())
        .await;
    let body: serde_json::Value = response.json();
    assert_eq!(body["transactions"].as_array().unwrap().len(), 1);
    assert_eq!(body["has_more"], false);
}

// ============================================================================
// Internal spend
// ============================================================================

#[tokio::test]
async fn internal_spend_requires_service_secret() {
    let harness = TestHarness::new();
    let payload = json!({
        "user_id": harness.test_user_id.to_string(),
        "feature": "voice_clone"
    });

    harness
        .server
        .post("/api/internal/credits/spend")
        .json(&payload)
        .await
        .assert_status(StatusCode::UNAUTHORIZED);

    // A user token is not a service credential.
    harness
        .server
        .post("/api/internal/credits/spend")
        .with(harness.user_auth())
        .json(&payload)
        .await
        .assert_status(StatusCode::UNAUTHORIZED);

    let response = harness
        .server
        .post("/api/internal/credits/spend")
        .with(internal_auth())
        .json(&payload)
        .await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["credits_spent"], 20);
    assert_eq!(body["balance"], 30);
}
