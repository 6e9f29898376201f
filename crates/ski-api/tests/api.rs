//! HTTP-level tests over the fake processor and the in-memory store.

use axum::body::Bytes;
use axum::http::{header, HeaderName, HeaderValue, StatusCode};
use axum_test::TestServer;
use chrono::NaiveDate;
use serde_json::{json, Value};
use ski_api::{create_router, AppConfig, AppState};
use ski_core::testing::FakeProcessor;
use ski_core::{Coupon, MemoryStore, Money, Package, PackageCatalog, PromotionCode};
use std::sync::Arc;

const OPERATOR_KEY: &str = "op_test_key";

struct Harness {
    server: TestServer,
    processor: Arc<FakeProcessor>,
    store: Arc<MemoryStore>,
}

fn due_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 12, 1).unwrap()
}

fn harness() -> Harness {
    let config = AppConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        base_url: "https://powderpay.eu".to_string(),
        environment: "test".to_string(),
        operator_api_key: OPERATOR_KEY.to_string(),
        packages_path: None,
        balance_due_date: None,
    };
    let catalog = PackageCatalog::new()
        .with_package(
            Package::new(
                "val-thorens-week",
                "Val Thorens Week",
                Money::from_euros(185),
                "12-19 Jan 2027",
            )
            .with_balance_due_date(due_date()),
        )
        .with_package(Package::new(
            "weekend",
            "Weekend Escape",
            Money::from_euros(245),
            "5-7 Feb 2027",
        ));

    let processor = Arc::new(FakeProcessor::new());
    let store = Arc::new(MemoryStore::new());
    let state = AppState::new(config, processor.clone(), store.clone(), catalog);
    let server = TestServer::new(create_router(state)).unwrap();

    Harness {
        server,
        processor,
        store,
    }
}

fn draft(package_id: &str, euros: i64, guests: u32) -> Value {
    let guest_list: Vec<Value> = (0..guests)
        .map(|i| json!({ "name": format!("Guest {}", i + 1) }))
        .collect();
    json!({
        "email": "anna@example.com",
        "name": "Anna Berg",
        "package_id": package_id,
        "package_name": "Package",
        "package_price": euros * 100,
        "dates": "Jan 2027",
        "number_of_guests": guests,
        "total_amount": euros * 100 * i64::from(guests),
        "guests": guest_list
    })
}

fn bearer(key: &str) -> (HeaderName, HeaderValue) {
    (
        header::AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {}", key)).unwrap(),
    )
}

fn signature_header() -> (HeaderName, HeaderValue) {
    (
        HeaderName::from_static("stripe-signature"),
        HeaderValue::from_str(&FakeProcessor::sign(b"")).unwrap(),
    )
}

fn group_code() -> PromotionCode {
    PromotionCode {
        id: "promo_group".to_string(),
        code: "4ORMORE".to_string(),
        active: true,
        coupon: Coupon {
            id: "coupon_group".to_string(),
            name: Some("Group discount".to_string()),
            valid: true,
            percent_off: Some(10.0),
            amount_off: None,
            max_redemptions: None,
            times_redeemed: 0,
        },
        max_redemptions: None,
        times_redeemed: 0,
        expires_at: None,
    }
}

#[tokio::test]
async fn test_health_and_packages() {
    let h = harness();

    let response = h.server.get("/health").await;
    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["status"], "healthy");

    let response = h.server.get("/api/v1/packages").await;
    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["count"], 2);
}

#[tokio::test]
async fn test_checkout_opens_session_without_writing_booking() {
    let h = harness();

    let response = h
        .server
        .post("/api/v1/checkout")
        .json(&json!({ "booking": draft("weekend", 245, 1), "payment_mode": "full" }))
        .await;

    response.assert_status_ok();
    let body = response.json::<Value>();
    assert_eq!(body["charge_amount"], 24500);
    assert_eq!(body["payment_mode"], "full");
    assert!(body["redirect_url"].as_str().unwrap().starts_with("https://pay.example/"));
    assert_eq!(h.store.booking_count().await, 0);
}

#[tokio::test]
async fn test_checkout_errors() {
    let h = harness();

    let response = h
        .server
        .post("/api/v1/checkout")
        .json(&json!({ "booking": draft("nowhere", 185, 1), "payment_mode": "full" }))
        .await;
    response.assert_status(StatusCode::NOT_FOUND);

    // weekend has no balance due date and no fallback is configured
    let response = h
        .server
        .post("/api/v1/checkout")
        .json(&json!({ "booking": draft("weekend", 245, 1), "payment_mode": "installment" }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);

    h.processor.fail_checkout(true);
    let response = h
        .server
        .post("/api/v1/checkout")
        .json(&json!({ "booking": draft("weekend", 245, 1), "payment_mode": "full" }))
        .await;
    response.assert_status(StatusCode::BAD_GATEWAY);
    let body = response.json::<Value>();
    assert!(!body["error"].as_str().unwrap().contains("checkout unavailable"));
}

#[tokio::test]
async fn test_coupon_validation() {
    let h = harness();
    h.processor.add_promotion_code(group_code());

    let response = h
        .server
        .post("/api/v1/coupons/validate")
        .json(&json!({ "code": "4ORMORE", "group_size": 3 }))
        .await;
    response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(
        response.json::<Value>()["details"],
        "Add 1 more person to your group to use this discount"
    );
    assert_eq!(h.processor.promotion_lookups(), 0);

    let response = h
        .server
        .post("/api/v1/coupons/validate")
        .json(&json!({ "code": "4ormore", "group_size": 4 }))
        .await;
    response.assert_status_ok();
    let body = response.json::<Value>();
    assert_eq!(body["promotion_code_id"], "promo_group");
    assert_eq!(body["percent_off"], 10.0);

    let response = h
        .server
        .post("/api/v1/coupons/validate")
        .json(&json!({ "code": "SNOW", "group_size": 2 }))
        .await;
    response.assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_webhook_rejects_bad_or_missing_signature() {
    let h = harness();
    let payload = FakeProcessor::completed_payload("cs_x", Money::from_euros(245), Default::default());

    let response = h.server.post("/webhook/stripe").bytes(Bytes::from(payload.clone())).await;
    response.assert_status(StatusCode::BAD_REQUEST);

    let response = h
        .server
        .post("/webhook/stripe")
        .add_header(
            HeaderName::from_static("stripe-signature"),
            HeaderValue::from_static("forged"),
        )
        .bytes(Bytes::from(payload))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(h.store.booking_count().await, 0);
}

#[tokio::test]
async fn test_admin_endpoints_require_operator_key() {
    let h = harness();
    let id = uuid::Uuid::new_v4();

    h.server
        .post("/api/v1/admin/balances/process")
        .await
        .assert_status(StatusCode::UNAUTHORIZED);

    let (name, value) = bearer("wrong");
    h.server
        .get(&format!("/api/v1/admin/bookings/{}", id))
        .add_header(name, value)
        .await
        .assert_status(StatusCode::UNAUTHORIZED);

    let (name, value) = bearer(OPERATOR_KEY);
    h.server
        .get(&format!("/api/v1/admin/bookings/{}", id))
        .add_header(name, value)
        .await
        .assert_status(StatusCode::NOT_FOUND);

    let (name, value) = bearer(OPERATOR_KEY);
    h.server
        .post(&format!("/api/v1/admin/bookings/{}/balance-link", id))
        .add_header(name, value)
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_installment_lifecycle_over_http() {
    let h = harness();

    // 1. checkout: deposit of 30% on €185
    let response = h
        .server
        .post("/api/v1/checkout")
        .json(&json!({ "booking": draft("val-thorens-week", 185, 1), "payment_mode": "installment" }))
        .await;
    response.assert_status_ok();
    let redirect = response.json::<Value>();
    assert_eq!(redirect["charge_amount"], 5550);
    let session_id = redirect["session_id"].as_str().unwrap().to_string();

    // 2. processor reports the paid session
    let metadata = h.processor.checkout_requests()[0].metadata.clone();
    let payload = FakeProcessor::completed_payload(&session_id, Money::from_cents(5550), metadata);
    let (name, value) = signature_header();
    let response = h
        .server
        .post("/webhook/stripe")
        .add_header(name, value)
        .bytes(Bytes::from(payload.clone()))
        .await;
    response.assert_status_ok();
    let ack = response.json::<Value>();
    assert_eq!(ack["status"], "created");
    let booking_id = ack["booking_id"].as_str().unwrap().to_string();

    // redelivery
    let (name, value) = signature_header();
    let response = h
        .server
        .post("/webhook/stripe")
        .add_header(name, value)
        .bytes(Bytes::from(payload))
        .await;
    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["status"], "duplicate");
    assert_eq!(h.store.booking_count().await, 1);

    let (name, value) = bearer(OPERATOR_KEY);
    let detail = h
        .server
        .get(&format!("/api/v1/admin/bookings/{}", booking_id))
        .add_header(name, value)
        .await
        .json::<Value>();
    assert_eq!(detail["booking"]["payment_status"], "partial");
    assert_eq!(detail["booking"]["remaining_amount"], 12950);
    assert_eq!(detail["transactions"].as_array().unwrap().len(), 1);
    assert_eq!(detail["transactions"][0]["payment_type"], "deposit");
    assert_eq!(detail["guests"].as_array().unwrap().len(), 1);
    assert_eq!(detail["collected"], 5550);

    // 3. daily run on the due date
    let (name, value) = bearer(OPERATOR_KEY);
    let response = h
        .server
        .post("/api/v1/admin/balances/process")
        .add_header(name, value)
        .json(&json!({ "date": "2026-12-01" }))
        .await;
    response.assert_status_ok();
    let report = response.json::<Value>();
    assert_eq!(report["processed"], 1);
    assert_eq!(report["succeeded"], 1);
    assert_eq!(report["failed"], 0);

    let (name, value) = bearer(OPERATOR_KEY);
    let detail = h
        .server
        .get(&format!("/api/v1/admin/bookings/{}", booking_id))
        .add_header(name, value)
        .await
        .json::<Value>();
    assert_eq!(detail["booking"]["payment_status"], "paid");
    assert_eq!(detail["collected"], 18500);
    assert_eq!(detail["transactions"][1]["payment_type"], "balance");

    // paid bookings cannot get another link
    let (name, value) = bearer(OPERATOR_KEY);
    h.server
        .post(&format!("/api/v1/admin/bookings/{}/balance-link", booking_id))
        .add_header(name, value)
        .await
        .assert_status(StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_declined_balance_reports_fallback_link() {
    let h = harness();

    let redirect = h
        .server
        .post("/api/v1/checkout")
        .json(&json!({ "booking": draft("val-thorens-week", 185, 2), "payment_mode": "installment" }))
        .await
        .json::<Value>();
    let session_id = redirect["session_id"].as_str().unwrap().to_string();
    let metadata = h.processor.checkout_requests()[0].metadata.clone();
    let (name, value) = signature_header();
    h.server
        .post("/webhook/stripe")
        .add_header(name, value)
        .bytes(Bytes::from(FakeProcessor::completed_payload(
            &session_id,
            Money::from_cents(11100),
            metadata,
        )))
        .await
        .assert_status_ok();

    h.processor.decline_customer(&format!("cus_{}", session_id));

    let (name, value) = bearer(OPERATOR_KEY);
    let report = h
        .server
        .post("/api/v1/admin/balances/process")
        .add_header(name, value)
        .json(&json!({ "date": "2026-12-05" }))
        .await
        .json::<Value>();

    assert_eq!(report["failed"], 1);
    assert_eq!(report["errors"][0]["amount"], 25900);
    assert!(report["errors"][0]["payment_link"]
        .as_str()
        .unwrap()
        .starts_with("https://pay.example/link/"));
}
