//! Stripe Checkout and PayPal integration tests against mocked provider APIs.

mod common;

use axum::http::StatusCode;
use common::{test_config, user_auth_for, TestHarness, WithHeader};
use crav_core::UserId;
use crav_service::ServiceConfig;
use crav_store::Store;
use serde_json::json;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn stripe_config(mock: &MockServer) -> ServiceConfig {
    ServiceConfig {
        stripe_secret_key: Some("sk_test_123".into()),
        stripe_api_base: mock.uri(),
        site_url: "https://craudiovizai.com".into(),
        ..test_config()
    }
}

fn paypal_config(mock: &MockServer) -> ServiceConfig {
    ServiceConfig {
        paypal_client_id: Some("client-id".into()),
        paypal_client_secret: Some("client-secret".into()),
        paypal_api_base: Some(mock.uri()),
        site_url: "https://craudiovizai.com".into(),
        ..test_config()
    }
}

async fn mount_paypal_token(mock: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/v1/oauth2/token"))
        .and(body_string_contains("grant_type=client_credentials"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "A21-test-token",
            "token_type": "Bearer",
            "expires_in": 32400
        })))
        .expect(1)
        .mount(mock)
        .await;
}

fn paypal_order(order_id: &str, status: &str, pack: &str, buyer: &UserId) -> serde_json::Value {
    json!({
        "id": order_id,
        "status": status,
        "purchase_units": [{
            "reference_id": pack,
            "custom_id": buyer.to_string()
        }]
    })
}

fn captured_order(order_id: &str, status: &str, pack: &str, buyer: &UserId) -> serde_json::Value {
    json!({
        "id": order_id,
        "status": status,
        "purchase_units": [{
            "reference_id": pack,
            "payments": {
                "captures": [{
                    "id": "CAP-1",
                    "status": status,
                    "custom_id": buyer.to_string()
                }]
            }
        }]
    })
}

/// Serve `body` for GET on the order, `times` times or forever.
async fn mount_order(mock: &MockServer, body: serde_json::Value, times: Option<u64>) {
    let order_id = body["id"].as_str().unwrap_or_default().to_string();
    let builder = Mock::given(method("GET"))
        .and(path(format!("/v2/checkout/orders/{order_id}")))
        .and(header("authorization", "Bearer A21-test-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body));
    match times {
        Some(n) => builder.up_to_n_times(n).mount(mock).await,
        None => builder.mount(mock).await,
    }
}

async fn capture(harness: &TestHarness, order_id: &str) -> axum_test::TestResponse {
    harness
        .server
        .post("/api/checkout/paypal/capture")
        .with(harness.user_auth())
        .json(&json!({ "order_id": order_id }))
        .await
}

// ============================================================================
// Not configured
// ============================================================================

#[tokio::test]
async fn checkout_without_providers_is_unavailable() {
    let harness = TestHarness::new();

    for path in ["/api/checkout/stripe", "/api/checkout/paypal"] {
        let response = harness
            .server
            .post(path)
            .with(harness.user_auth())
            .json(&json!({ "pack": "starter" }))
            .await;
        response.assert_status(StatusCode::BAD_GATEWAY);
        let body: serde_json::Value = response.json();
        assert_eq!(body["error"]["code"], "external_service_error");
    }
}

#[tokio::test]
async fn checkout_requires_sign_in_and_known_pack() {
    let harness = TestHarness::new();

    harness
        .server
        .post("/api/checkout/stripe")
        .json(&json!({ "pack": "starter" }))
        .await
        .assert_status(StatusCode::UNAUTHORIZED);

    harness
        .server
        .post("/api/checkout/stripe")
        .with(harness.user_auth())
        .json(&json!({ "pack": "mega" }))
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}

// ============================================================================
// Stripe
// ============================================================================

#[tokio::test]
async fn stripe_checkout_creates_session_for_pack() {
    let mock = MockServer::start().await;
    let harness = TestHarness::with_config(stripe_config(&mock));

    Mock::given(method("POST"))
        .and(path("/checkout/sessions"))
        .and(header("authorization", "Basic c2tfdGVzdF8xMjM6"))
        .and(body_string_contains("mode=payment"))
        .and(body_string_contains("metadata%5Bpack%5D=creator"))
        .and(body_string_contains("line_items%5B0%5D%5Bprice_data%5D%5Bunit_amount%5D=3999"))
        .and(body_string_contains(&format!(
            "client_reference_id={}",
            harness.test_user_id
        )))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "cs_test_123",
            "object": "checkout.session",
            "url": "https://checkout.stripe.com/c/pay/cs_test_123"
        })))
        .expect(1)
        .mount(&mock)
        .await;

    let response = harness
        .server
        .post("/api/checkout/stripe")
        .with(harness.user_auth())
        .json(&json!({ "pack": "creator" }))
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["session_id"], "cs_test_123");
    assert_eq!(body["checkout_url"], "https://checkout.stripe.com/c/pay/cs_test_123");
}

#[tokio::test]
async fn stripe_api_errors_surface_as_bad_gateway() {
    let mock = MockServer::start().await;
    let harness = TestHarness::with_config(stripe_config(&mock));

    Mock::given(method("POST"))
        .and(path("/checkout/sessions"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": {
                "type": "invalid_request_error",
                "message": "Invalid API Key provided"
            }
        })))
        .mount(&mock)
        .await;

    let response = harness
        .server
        .post("/api/checkout/stripe")
        .with(harness.user_auth())
        .json(&json!({ "pack": "starter" }))
        .await;

    response.assert_status(StatusCode::BAD_GATEWAY);
    let body: serde_json::Value = response.json();
    assert!(body["error"]["message"]
        .as_str()
        .unwrap()
        .contains("Invalid API Key provided"));
}

// ============================================================================
// PayPal
// ============================================================================

#[tokio::test]
async fn paypal_order_returns_approval_link() {
    let mock = MockServer::start().await;
    let harness = TestHarness::with_config(paypal_config(&mock));
    mount_paypal_token(&mock).await;

    Mock::given(method("POST"))
        .and(path("/v2/checkout/orders"))
        .and(header("authorization", "Bearer A21-test-token"))
        .and(body_string_contains("\"reference_id\":\"pro\""))
        .and(body_string_contains("\"value\":\"79.99\""))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": "ORDER-1",
            "status": "CREATED",
            "links": [
                { "href": "https://api-m.sandbox.paypal.com/v2/checkout/orders/ORDER-1", "rel": "self" },
                { "href": "https://www.sandbox.paypal.com/checkoutnow?token=ORDER-1", "rel": "approve" }
            ]
        })))
        .expect(1)
        .mount(&mock)
        .await;

    let response = harness
        .server
        .post("/api/checkout/paypal")
        .with(harness.user_auth())
        .json(&json!({ "pack": "pro" }))
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["order_id"], "ORDER-1");
    assert_eq!(
        body["approve_url"],
        "https://www.sandbox.paypal.com/checkoutnow?token=ORDER-1"
    );
}

#[tokio::test]
async fn paypal_capture_credits_pack_once() {
    let mock = MockServer::start().await;
    let harness = TestHarness::with_config(paypal_config(&mock));
    // Every call shares one cached token.
    mount_paypal_token(&mock).await;

    let buyer = harness.test_user_id;
    mount_order(&mock, paypal_order("ORDER-2", "APPROVED", "creator", &buyer), Some(1)).await;
    mount_order(&mock, paypal_order("ORDER-2", "COMPLETED", "creator", &buyer), None).await;
    Mock::given(method("POST"))
        .and(path("/v2/checkout/orders/ORDER-2/capture"))
        .respond_with(ResponseTemplate::new(201).set_body_json(captured_order(
            "ORDER-2",
            "COMPLETED",
            "creator",
            &buyer,
        )))
        .expect(1)
        .mount(&mock)
        .await;

    let response = capture(&harness, "ORDER-2").await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["credited"], true);
    assert_eq!(body["credits"], 500);
    assert_eq!(body["balance"], 550);

    // The order is already captured, so PayPal is not asked again.
    let response = capture(&harness, "ORDER-2").await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["status"], "COMPLETED");
    assert_eq!(body["credited"], false);
    assert_eq!(body["balance"], 550);
}

#[tokio::test]
async fn paypal_capture_of_another_users_order_is_forbidden() {
    let mock = MockServer::start().await;
    let harness = TestHarness::with_config(paypal_config(&mock));
    mount_paypal_token(&mock).await;

    let buyer = UserId::generate();
    mount_order(&mock, paypal_order("ORDER-3", "APPROVED", "starter", &buyer), None).await;
    // Only the buyer's own request reaches the capture endpoint.
    Mock::given(method("POST"))
        .and(path("/v2/checkout/orders/ORDER-3/capture"))
        .respond_with(ResponseTemplate::new(201).set_body_json(captured_order(
            "ORDER-3",
            "COMPLETED",
            "starter",
            &buyer,
        )))
        .expect(1)
        .mount(&mock)
        .await;

    capture(&harness, "ORDER-3")
        .await
        .assert_status(StatusCode::FORBIDDEN);
    assert_eq!(
        harness
            .store
            .get_or_create_account(&harness.test_user_id)
            .await
            .unwrap()
            .balance,
        50
    );

    // The buyer can still claim it.
    let response = harness
        .server
        .post("/api/checkout/paypal/capture")
        .with(user_auth_for(&buyer))
        .json(&json!({ "order_id": "ORDER-3" }))
        .await;
    response.assert_status_ok();
    assert_eq!(response.json::<serde_json::Value>()["balance"], 150);
}

#[tokio::test]
async fn paypal_order_not_yet_approved_is_not_captured() {
    let mock = MockServer::start().await;
    let harness = TestHarness::with_config(paypal_config(&mock));
    mount_paypal_token(&mock).await;

    mount_order(
        &mock,
        paypal_order("ORDER-6", "CREATED", "pro", &harness.test_user_id),
        None,
    )
    .await;
    Mock::given(method("POST"))
        .and(path("/v2/checkout/orders/ORDER-6/capture"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&mock)
        .await;

    capture(&harness, "ORDER-6")
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn paypal_capture_that_is_not_completed_grants_nothing() {
    let mock = MockServer::start().await;
    let harness = TestHarness::with_config(paypal_config(&mock));
    mount_paypal_token(&mock).await;

    mount_order(
        &mock,
        paypal_order("ORDER-4", "APPROVED", "studio", &harness.test_user_id),
        None,
    )
    .await;
    Mock::given(method("POST"))
        .and(path("/v2/checkout/orders/ORDER-4/capture"))
        .respond_with(ResponseTemplate::new(201).set_body_json(captured_order(
            "ORDER-4",
            "PENDING",
            "studio",
            &harness.test_user_id,
        )))
        .mount(&mock)
        .await;

    capture(&harness, "ORDER-4")
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn paypal_capture_lost_to_a_concurrent_request_still_credits() {
    let mock = MockServer::start().await;
    let harness = TestHarness::with_config(paypal_config(&mock));
    mount_paypal_token(&mock).await;

    let buyer = harness.test_user_id;
    mount_order(&mock, paypal_order("ORDER-7", "APPROVED", "creator", &buyer), Some(1)).await;
    mount_order(&mock, paypal_order("ORDER-7", "COMPLETED", "creator", &buyer), None).await;
    Mock::given(method("POST"))
        .and(path("/v2/checkout/orders/ORDER-7/capture"))
        .respond_with(ResponseTemplate::new(422).set_body_json(json!({
            "name": "UNPROCESSABLE_ENTITY",
            "message": "ORDER_ALREADY_CAPTURED"
        })))
        .mount(&mock)
        .await;

    let response = capture(&harness, "ORDER-7").await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["credited"], true);
    assert_eq!(body["balance"], 550);
}

#[tokio::test]
async fn paypal_rejected_capture_is_bad_gateway() {
    let mock = MockServer::start().await;
    let harness = TestHarness::with_config(paypal_config(&mock));
    mount_paypal_token(&mock).await;

    mount_order(
        &mock,
        paypal_order("ORDER-5", "APPROVED", "starter", &harness.test_user_id),
        None,
    )
    .await;
    Mock::given(method("POST"))
        .and(path("/v2/checkout/orders/ORDER-5/capture"))
        .respond_with(ResponseTemplate::new(422).set_body_json(json!({
            "name": "UNPROCESSABLE_ENTITY",
            "message": "INSTRUMENT_DECLINED"
        })))
        .mount(&mock)
        .await;

    capture(&harness, "ORDER-5")
        .await
        .assert_status(StatusCode::BAD_GATEWAY);
}
