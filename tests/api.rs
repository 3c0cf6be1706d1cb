//! End-to-end handler tests over the real router, backed by the in-memory
//! store and the mock payment gateway.

mod common;

use std::sync::Arc;

use axum::http::StatusCode;
use chrono::{Duration, NaiveDate, Utc};
use serde_json::json;
use uuid::Uuid;

use moments_server::models::{GuestSession, OrderStatus};
use moments_server::payments::stripe::sign_webhook_payload;
use moments_server::payments::MockPaymentGateway;
use moments_server::store::{MemoryStore, Store};
use moments_server::utils::token::verify_exchange_token;

use common::*;

fn event_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 6, 1).unwrap()
}

// --- order creation ---

#[tokio::test]
async fn create_order_prices_server_side_and_persists_pending() {
    let store = Arc::new(MemoryStore::new());
    let gateway = Arc::new(MockPaymentGateway::new());
    let ev = event(event_date(), 50);
    let event_id = ev.id;
    store.insert_event(ev);

    let book = product("Photo Book", 8900);
    let prints = product("Print Set", 2900);
    let (book_id, prints_id) = (book.id, prints.id);
    store.insert_product(book);
    store.insert_product(prints);

    let app = test_app(store.clone(), gateway.clone());
    let (status, body) = post_json(
        &app,
        "/orders",
        json!({
            "eventId": event_id.to_string(),
            "items": [
                {"productId": book_id.to_string(), "quantity": 2},
                {"productId": prints_id.to_string(), "quantity": 1}
            ],
            "shippingInfo": shipping_info()
        }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], json!(true));
    assert!(body["clientSecret"].as_str().unwrap().contains("secret"));

    let order_id: Uuid = body["orderId"].as_str().unwrap().parse().unwrap();
    let order = store.get_order(order_id).await.unwrap().unwrap();

    // 8900 x2 + 2900 = 20700; tax 2070; free shipping over 10000.
    assert_eq!(order.amounts.subtotal, 20_700);
    assert_eq!(order.amounts.tax, 2_070);
    assert_eq!(order.amounts.shipping, 0);
    assert_eq!(order.amounts.total, 22_770);
    assert_eq!(
        order.amounts.total,
        order.amounts.subtotal + order.amounts.tax + order.amounts.shipping
    );
    assert_eq!(order.status, OrderStatus::Pending);
    assert_eq!(order.payment.method, "stripe");
    assert!(order.payment.charge_id.is_none());
    assert!(order.payment.paid_at.is_none());
    assert!(order.order_number.starts_with("WM"));

    // The gateway was asked for exactly the computed total.
    assert_eq!(gateway.created_amounts(), vec![22_770]);
}

#[tokio::test]
async fn create_order_applies_option_modifiers_and_shipping_fee() {
    let store = Arc::new(MemoryStore::new());
    let gateway = Arc::new(MockPaymentGateway::new());
    let ev = event(event_date(), 50);
    let event_id = ev.id;
    store.insert_event(ev);

    let album = product_with_option("Album", 5000, "size", "A4", 1500);
    let album_id = album.id;
    store.insert_product(album);

    let app = test_app(store.clone(), gateway.clone());
    let (status, body) = post_json(
        &app,
        "/orders",
        json!({
            "eventId": event_id.to_string(),
            "items": [{
                "productId": album_id.to_string(),
                "quantity": 1,
                "selectedOptions": [{"optionId": "size", "value": "A4"}]
            }],
            "shippingInfo": shipping_info()
        }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let order_id: Uuid = body["orderId"].as_str().unwrap().parse().unwrap();
    let order = store.get_order(order_id).await.unwrap().unwrap();

    // 6500 subtotal is under the free-shipping threshold.
    assert_eq!(order.items[0].unit_price, 6_500);
    assert_eq!(order.amounts.subtotal, 6_500);
    assert_eq!(order.amounts.tax, 650);
    assert_eq!(order.amounts.shipping, 800);
    assert_eq!(order.amounts.total, 7_950);
}

#[tokio::test]
async fn create_order_rejects_invalid_input() {
    let store = Arc::new(MemoryStore::new());
    let gateway = Arc::new(MockPaymentGateway::new());
    let ev = event(event_date(), 50);
    let event_id = ev.id;
    store.insert_event(ev);
    let item = product("Print Set", 2900);
    let product_id = item.id;
    store.insert_product(item);

    let app = test_app(store.clone(), gateway.clone());

    // Empty items.
    let (status, body) = post_json(
        &app,
        "/orders",
        json!({"eventId": event_id.to_string(), "items": [], "shippingInfo": shipping_info()}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_code(&body), "invalid-argument");

    // Bad email.
    let mut bad_email = shipping_info();
    bad_email["email"] = json!("not-an-email");
    let (status, body) = post_json(
        &app,
        "/orders",
        json!({
            "eventId": event_id.to_string(),
            "items": [{"productId": product_id.to_string(), "quantity": 1}],
            "shippingInfo": bad_email
        }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_code(&body), "invalid-argument");

    // Foreign phone format.
    let mut bad_phone = shipping_info();
    bad_phone["phone"] = json!("+1-555-0100");
    let (status, body) = post_json(
        &app,
        "/orders",
        json!({
            "eventId": event_id.to_string(),
            "items": [{"productId": product_id.to_string(), "quantity": 1}],
            "shippingInfo": bad_phone
        }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_code(&body), "invalid-argument");

    // No order was written, no intent created.
    assert!(gateway.created_amounts().is_empty());
}

#[tokio::test]
async fn create_order_404s_on_unknown_event_or_product() {
    let store = Arc::new(MemoryStore::new());
    let gateway = Arc::new(MockPaymentGateway::new());
    let ev = event(event_date(), 50);
    let event_id = ev.id;
    store.insert_event(ev);

    let app = test_app(store.clone(), gateway.clone());

    let (status, body) = post_json(
        &app,
        "/orders",
        json!({
            "eventId": Uuid::new_v4().to_string(),
            "items": [{"productId": Uuid::new_v4().to_string(), "quantity": 1}],
            "shippingInfo": shipping_info()
        }),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(error_code(&body), "not-found");

    let (status, body) = post_json(
        &app,
        "/orders",
        json!({
            "eventId": event_id.to_string(),
            "items": [{"productId": Uuid::new_v4().to_string(), "quantity": 1}],
            "shippingInfo": shipping_info()
        }),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(error_code(&body), "not-found");
}

// --- webhook reconciliation ---

async fn place_order(
    store: &Arc<MemoryStore>,
    gateway: &Arc<MockPaymentGateway>,
) -> (axum::Router, Uuid, String) {
    let ev = event(event_date(), 50);
    let event_id = ev.id;
    store.insert_event(ev);
    let item = product("Photo Book", 12_000);
    let product_id = item.id;
    store.insert_product(item);

    let app = test_app(store.clone(), gateway.clone());
    let (status, body) = post_json(
        &app,
        "/orders",
        json!({
            "eventId": event_id.to_string(),
            "items": [{"productId": product_id.to_string(), "quantity": 1}],
            "shippingInfo": shipping_info()
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let order_id: Uuid = body["orderId"].as_str().unwrap().parse().unwrap();
    let order = store.get_order(order_id).await.unwrap().unwrap();
    (app, order_id, order.payment.payment_intent_id)
}

fn succeeded_event(intent_id: &str) -> String {
    json!({
        "id": "evt_1",
        "type": "payment_intent.succeeded",
        "data": {"object": {"id": intent_id, "latest_charge": "ch_test_1"}}
    })
    .to_string()
}

#[tokio::test]
async fn webhook_succeeded_marks_order_paid_idempotently() {
    let store = Arc::new(MemoryStore::new());
    let gateway = Arc::new(MockPaymentGateway::new());
    let (app, order_id, intent_id) = place_order(&store, &gateway).await;

    let body = succeeded_event(&intent_id);
    let signature = sign_webhook_payload(body.as_bytes(), WEBHOOK_SECRET, Utc::now().timestamp());

    let (status, response) = post_webhook(&app, &body, &signature).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(response["received"], json!(true));

    let order = store.get_order(order_id).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::Paid);
    assert_eq!(order.payment.charge_id.as_deref(), Some("ch_test_1"));
    let paid_at = order.payment.paid_at.unwrap();

    // Redelivery: same ack, no state movement.
    let (status, _) = post_webhook(&app, &body, &signature).await;
    assert_eq!(status, StatusCode::OK);
    let order = store.get_order(order_id).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::Paid);
    assert_eq!(order.payment.paid_at, Some(paid_at));
}

#[tokio::test]
async fn webhook_failure_cancels_but_keeps_the_order() {
    let store = Arc::new(MemoryStore::new());
    let gateway = Arc::new(MockPaymentGateway::new());
    let (app, order_id, intent_id) = place_order(&store, &gateway).await;

    let body = json!({
        "id": "evt_2",
        "type": "payment_intent.payment_failed",
        "data": {"object": {"id": intent_id}}
    })
    .to_string();
    let signature = sign_webhook_payload(body.as_bytes(), WEBHOOK_SECRET, Utc::now().timestamp());

    let (status, _) = post_webhook(&app, &body, &signature).await;
    assert_eq!(status, StatusCode::OK);

    let order = store.get_order(order_id).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::Cancelled);
    assert_eq!(order.notes.as_deref(), Some("Payment failed"));
}

#[tokio::test]
async fn webhook_rejects_bad_signatures_without_processing() {
    let store = Arc::new(MemoryStore::new());
    let gateway = Arc::new(MockPaymentGateway::new());
    let (app, order_id, intent_id) = place_order(&store, &gateway).await;

    let body = succeeded_event(&intent_id);
    let signature =
        sign_webhook_payload(body.as_bytes(), "whsec_wrong_secret", Utc::now().timestamp());

    let (status, _) = post_webhook(&app, &body, &signature).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let order = store.get_order(order_id).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::Pending);
}

#[tokio::test]
async fn webhook_acks_unknown_intents_without_mutation() {
    let store = Arc::new(MemoryStore::new());
    let gateway = Arc::new(MockPaymentGateway::new());
    let (app, order_id, _) = place_order(&store, &gateway).await;

    let body = succeeded_event("pi_unknown");
    let signature = sign_webhook_payload(body.as_bytes(), WEBHOOK_SECRET, Utc::now().timestamp());

    let (status, response) = post_webhook(&app, &body, &signature).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(response["received"], json!(true));

    let order = store.get_order(order_id).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::Pending);
}

#[tokio::test]
async fn webhook_acks_and_ignores_other_event_types() {
    let store = Arc::new(MemoryStore::new());
    let gateway = Arc::new(MockPaymentGateway::new());
    let (app, _, intent_id) = place_order(&store, &gateway).await;

    let body = json!({
        "id": "evt_3",
        "type": "charge.refunded",
        "data": {"object": {"id": intent_id}}
    })
    .to_string();
    let signature = sign_webhook_payload(body.as_bytes(), WEBHOOK_SECRET, Utc::now().timestamp());

    let (status, response) = post_webhook(&app, &body, &signature).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(response["received"], json!(true));
}

// --- guest sessions ---

#[tokio::test]
async fn guest_sessions_enforce_the_capacity_limit() {
    let store = Arc::new(MemoryStore::new());
    let gateway = Arc::new(MockPaymentGateway::new());
    let ev = event(event_date(), 2);
    let event_id = ev.id;
    store.insert_event(ev);

    let app = test_app(store.clone(), gateway);
    let join = json!({"eventId": event_id.to_string(), "qrToken": "qr-token-secret"});

    let (status, first) = post_json(&app, "/guest-sessions", join.clone()).await;
    assert_eq!(status, StatusCode::OK);
    let (status, second) = post_json(&app, "/guest-sessions", join.clone()).await;
    assert_eq!(status, StatusCode::OK);

    // Session tokens are per-session, not per-event.
    assert_ne!(first["guestToken"], second["guestToken"]);

    let event = store.get_event(event_id).await.unwrap().unwrap();
    assert_eq!(event.current_guest_count, 2);

    let (status, body) = post_json(&app, "/guest-sessions", join).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(error_code(&body), "resource-exhausted");

    // The failed join neither created a session nor moved the counter.
    assert_eq!(store.session_count(), 2);
    let event = store.get_event(event_id).await.unwrap().unwrap();
    assert_eq!(event.current_guest_count, 2);
}

#[tokio::test]
async fn guest_session_rejections_by_token_status_and_existence() {
    let store = Arc::new(MemoryStore::new());
    let gateway = Arc::new(MockPaymentGateway::new());

    let ev = event(event_date(), 10);
    let event_id = ev.id;
    store.insert_event(ev);

    let mut archived = event(event_date(), 10);
    archived.status = moments_server::models::EventStatus::Archived;
    let archived_id = archived.id;
    store.insert_event(archived);

    let app = test_app(store.clone(), gateway);

    let (status, body) = post_json(
        &app,
        "/guest-sessions",
        json!({"eventId": Uuid::new_v4().to_string(), "qrToken": "qr-token-secret"}),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(error_code(&body), "not-found");

    let (status, body) = post_json(
        &app,
        "/guest-sessions",
        json!({"eventId": event_id.to_string(), "qrToken": "wrong-token"}),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(error_code(&body), "permission-denied");

    let (status, body) = post_json(
        &app,
        "/guest-sessions",
        json!({"eventId": archived_id.to_string(), "qrToken": "qr-token-secret"}),
    )
    .await;
    assert_eq!(status, StatusCode::PRECONDITION_FAILED);
    assert_eq!(error_code(&body), "failed-precondition");
}

#[tokio::test]
async fn issued_custom_tokens_verify_with_guest_claims() {
    let store = Arc::new(MemoryStore::new());
    let gateway = Arc::new(MockPaymentGateway::new());
    let ev = event(event_date(), 10);
    let event_id = ev.id;
    store.insert_event(ev);

    let app = test_app(store.clone(), gateway);
    let (status, body) = post_json(
        &app,
        "/guest-sessions",
        json!({"eventId": event_id.to_string(), "qrToken": "qr-token-secret", "deviceInfo": "iPhone 15"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let claims =
        verify_exchange_token(body["customToken"].as_str().unwrap(), SIGNING_SECRET).unwrap();
    assert_eq!(claims.event_id, event_id);
    assert_eq!(claims.role, "guest");
    assert_eq!(claims.guest_token, body["guestToken"].as_str().unwrap());

    // Expiry is event date + 7 days.
    let expires_at = body["expiresAt"].as_str().unwrap();
    assert!(expires_at.starts_with("2025-06-08"), "got {expires_at}");
}

#[tokio::test]
async fn validation_checks_token_then_expiry_and_touches_last_access() {
    let store = Arc::new(MemoryStore::new());
    let gateway = Arc::new(MockPaymentGateway::new());
    let ev = event(event_date(), 10);
    let event_id = ev.id;
    store.insert_event(ev);

    let app = test_app(store.clone(), gateway);
    let (_, created) = post_json(
        &app,
        "/guest-sessions",
        json!({"eventId": event_id.to_string(), "qrToken": "qr-token-secret"}),
    )
    .await;
    let session_id: Uuid = created["sessionId"].as_str().unwrap().parse().unwrap();
    let guest_token = created["guestToken"].as_str().unwrap().to_string();

    let before = store
        .get_guest_session(session_id)
        .await
        .unwrap()
        .unwrap()
        .last_access_at;

    let (status, body) = post_json(
        &app,
        "/guest-sessions/validate",
        json!({"sessionId": session_id.to_string(), "guestToken": guest_token}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["valid"], json!(true));
    assert_eq!(body["eventId"].as_str().unwrap(), event_id.to_string());

    let after = store
        .get_guest_session(session_id)
        .await
        .unwrap()
        .unwrap()
        .last_access_at;
    assert!(after >= before);

    let (status, body) = post_json(
        &app,
        "/guest-sessions/validate",
        json!({"sessionId": session_id.to_string(), "guestToken": "stolen"}),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(error_code(&body), "permission-denied");

    let (status, body) = post_json(
        &app,
        "/guest-sessions/validate",
        json!({"sessionId": Uuid::new_v4().to_string(), "guestToken": "anything"}),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(error_code(&body), "not-found");
}

#[tokio::test]
async fn expired_sessions_fail_validation_regardless_of_token() {
    let store = Arc::new(MemoryStore::new());
    let gateway = Arc::new(MockPaymentGateway::new());
    let ev = event(event_date(), 10);
    let event_id = ev.id;
    store.insert_event(ev);

    let session = GuestSession {
        id: Uuid::new_v4(),
        event_id,
        guest_token: "still-correct-token".to_string(),
        device_info: "unknown".to_string(),
        ip_address: "unknown".to_string(),
        expires_at: Utc::now() - Duration::days(1),
        last_access_at: Utc::now() - Duration::days(8),
        created_at: Utc::now() - Duration::days(8),
    };
    let session_id = session.id;
    store.insert_guest_session(&session).await.unwrap();

    let app = test_app(store.clone(), gateway);
    let (status, body) = post_json(
        &app,
        "/guest-sessions/validate",
        json!({"sessionId": session_id.to_string(), "guestToken": "still-correct-token"}),
    )
    .await;
    assert_eq!(status, StatusCode::PRECONDITION_FAILED);
    assert_eq!(error_code(&body), "failed-precondition");
}
