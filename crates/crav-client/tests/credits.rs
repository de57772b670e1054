//! Credits client tests against a mocked credits API.

use serde_json::json;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crav_client::{ClientError, ClientOptions, CreditsClient, WithCreditsError};

const JWT: &str = "user-token";

fn client(server: &MockServer) -> CreditsClient {
    CreditsClient::new(server.uri()).unwrap()
}

fn spend_ok(transaction_id: &str, spent: i64, balance: i64) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "transaction_id": transaction_id,
        "credits_spent": spent,
        "balance": balance,
    }))
}

#[tokio::test]
async fn balance_sends_bearer_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/credits/balance"))
        .and(header("authorization", "Bearer user-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "balance": 550,
            "plan": "starter",
            "subscription_status": "active",
            "period_end": "2026-11-19T00:00:00+00:00",
            "lifetime_purchased": 0,
            "lifetime_granted": 550,
            "lifetime_spent": 0,
        })))
        .expect(1)
        .mount(&server)
        .await;

    let balance = client(&server).balance(JWT).await.unwrap();
    assert_eq!(balance.balance, 550);
    assert_eq!(balance.plan, "starter");
    assert!(balance.period_end.is_some());
}

#[tokio::test]
async fn transactions_pass_paging() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/credits/transactions"))
        .and(query_param("limit", "10"))
        .and(query_param("offset", "20"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "transactions": [{
                "id": "01JB0000000000000000000000",
                "amount": -5,
                "kind": "spend",
                "balance_after": 45,
                "feature": "image_generation",
                "description": "image_generation x1",
                "refund_of": null,
                "created_at": "2026-10-19T12:00:00+00:00",
            }],
            "has_more": false,
        })))
        .mount(&server)
        .await;

    let page = client(&server).transactions(JWT, 10, 20).await.unwrap();
    assert_eq!(page.transactions.len(), 1);
    assert_eq!(page.transactions[0].amount, -5);
    assert!(!page.has_more);
}

#[tokio::test]
async fn spend_posts_feature_and_quantity() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/credits/spend"))
        .and(body_json(json!({ "feature": "chat_message", "quantity": 3 })))
        .respond_with(spend_ok("tx-1", 3, 47))
        .expect(1)
        .mount(&server)
        .await;

    let receipt = client(&server).spend(JWT, "chat_message", 3).await.unwrap();
    assert_eq!(receipt.transaction_id, "tx-1");
    assert_eq!(receipt.credits_spent, 3);
    assert_eq!(receipt.balance, 47);
}

#[tokio::test]
async fn insufficient_credits_is_typed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/credits/spend"))
        .respond_with(ResponseTemplate::new(402).set_body_json(json!({
            "error": {
                "code": "insufficient_credits",
                "message": "Insufficient credits",
                "details": { "balance": 10, "required": 25 },
            }
        })))
        .mount(&server)
        .await;

    let err = client(&server)
        .spend(JWT, "video_render", 1)
        .await
        .unwrap_err();
    assert!(err.is_insufficient_credits());
    assert!(matches!(
        err,
        ClientError::InsufficientCredits {
            balance: 10,
            required: 25
        }
    ));
}

#[tokio::test]
async fn unauthorized_and_generic_errors() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/credits/balance"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": { "code": "unauthorized", "message": "Unauthorized" }
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/pricing"))
        .respond_with(ResponseTemplate::new(503).set_body_string("upstream down"))
        .mount(&server)
        .await;

    let client = client(&server);
    assert!(matches!(
        client.balance(JWT).await.unwrap_err(),
        ClientError::Unauthorized
    ));
    match client.pricing().await.unwrap_err() {
        ClientError::Api { status, .. } => assert_eq!(status, 503),
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn second_refund_is_already_refunded() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/credits/refund"))
        .respond_with(ResponseTemplate::new(409).set_body_json(json!({
            "error": { "code": "conflict", "message": "transaction tx-1 was already refunded" }
        })))
        .mount(&server)
        .await;

    let err = client(&server)
        .refund(JWT, "tx-1", None)
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::AlreadyRefunded { .. }));
}

#[tokio::test]
async fn with_credits_keeps_the_spend_on_success() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/credits/spend"))
        .respond_with(spend_ok("tx-ok", 5, 45))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/credits/refund"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;

    let out: Result<String, WithCreditsError<String>> = client(&server)
        .with_credits(JWT, "image_generation", 1, |receipt| async move {
            Ok(format!("rendered after {}", receipt.transaction_id))
        })
        .await;
    assert_eq!(out.unwrap(), "rendered after tx-ok");
}

#[tokio::test]
async fn with_credits_refunds_failed_operation() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/credits/spend"))
        .respond_with(spend_ok("tx-fail", 10, 40))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/credits/refund"))
        .and(body_json(json!({
            "transaction_id": "tx-fail",
            "reason": "operation failed",
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "transaction_id": "tx-refund",
            "credits_refunded": 10,
            "balance": 50,
        })))
        .expect(1)
        .mount(&server)
        .await;

    let err = client(&server)
        .with_credits(JWT, "logo_generation", 1, |_receipt| async {
            Err::<(), _>("model timed out")
        })
        .await
        .unwrap_err();

    match err {
        WithCreditsError::Operation { error, refund } => {
            assert_eq!(error, "model timed out");
            let refund = refund.unwrap();
            assert_eq!(refund.credits_refunded, 10);
            assert_eq!(refund.balance, 50);
        }
        WithCreditsError::Spend(e) => panic!("unexpected spend error: {e}"),
    }
}

#[tokio::test]
async fn with_credits_skips_operation_when_spend_fails() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/credits/spend"))
        .respond_with(ResponseTemplate::new(402).set_body_json(json!({
            "error": {
                "code": "insufficient_credits",
                "message": "Insufficient credits",
                "details": { "balance": 0, "required": 20 },
            }
        })))
        .mount(&server)
        .await;

    let mut ran = false;
    let err = client(&server)
        .with_credits(JWT, "voice_clone", 1, |_receipt| {
            ran = true;
            async { Ok::<(), String>(()) }
        })
        .await
        .unwrap_err();

    assert!(!ran);
    assert!(matches!(
        err,
        WithCreditsError::Spend(ClientError::InsufficientCredits { .. })
    ));
}

#[tokio::test]
async fn service_spend_sends_internal_headers() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/internal/credits/spend"))
        .and(header("x-internal-secret", "s3cret"))
        .and(header("x-service-name", "render-worker"))
        .and(body_json(json!({
            "user_id": "6f1c2d4e-0000-4000-8000-000000000001",
            "feature": "video_render",
            "quantity": 2,
        })))
        .respond_with(spend_ok("tx-svc", 50, 100))
        .expect(1)
        .mount(&server)
        .await;

    let client = CreditsClient::with_options(
        server.uri(),
        ClientOptions::for_service("render-worker", "s3cret"),
    )
    .unwrap();
    let receipt = client
        .spend_for_user("6f1c2d4e-0000-4000-8000-000000000001", "video_render", 2)
        .await
        .unwrap();
    assert_eq!(receipt.credits_spent, 50);
}

#[tokio::test]
async fn pricing_cost_lookup() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/pricing"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "plans": [],
            "packs": [],
            "feature_costs": { "image_generation": 5, "video_render": 25 },
            "signup_bonus": 50,
        })))
        .mount(&server)
        .await;

    let pricing = client(&server).pricing().await.unwrap();
    assert_eq!(pricing.signup_bonus, 50);
    assert_eq!(pricing.cost_of("video_render", 2), Some(50));
    assert_eq!(pricing.cost_of("unknown", 1), None);
}
