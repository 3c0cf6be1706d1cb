//! Shared fixtures for the integration suites.
#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use chrono::{NaiveDate, Utc};
use http_body_util::BodyExt;
use tower::ServiceExt;
use uuid::Uuid;

use moments_server::config::Config;
use moments_server::models::{
    Event, EventStatus, Photo, Product, ProductOption, ProductOptionValue,
};
use moments_server::payments::MockPaymentGateway;
use moments_server::routes::create_routes;
use moments_server::state::AppState;
use moments_server::storage::MemoryArchiveStorage;
use moments_server::store::MemoryStore;

pub const SIGNING_SECRET: &str = "test-signing-secret";
pub const WEBHOOK_SECRET: &str = "whsec_test_secret";

pub fn test_config() -> Config {
    Config {
        database_url: String::new(),
        port: 0,
        stripe_secret_key: "sk_test".to_string(),
        stripe_webhook_secret: WEBHOOK_SECRET.to_string(),
        token_signing_secret: SIGNING_SECRET.to_string(),
        web_base_url: "http://localhost:3000".to_string(),
        archive_root: PathBuf::from("./archives"),
    }
}

pub fn test_state(store: Arc<MemoryStore>, gateway: Arc<MockPaymentGateway>) -> AppState {
    AppState {
        store,
        gateway,
        archives: Arc::new(MemoryArchiveStorage::new()),
        config: Arc::new(test_config()),
    }
}

pub fn test_app(store: Arc<MemoryStore>, gateway: Arc<MockPaymentGateway>) -> Router {
    create_routes(test_state(store, gateway))
}

pub fn event(event_date: NaiveDate, guest_limit: i32) -> Event {
    Event {
        id: Uuid::new_v4(),
        host_user_id: Uuid::new_v4(),
        event_name: "Sato Wedding".to_string(),
        event_date,
        event_location: Some("Tokyo".to_string()),
        qr_token: "qr-token-secret".to_string(),
        guest_limit,
        current_guest_count: 0,
        status: EventStatus::Active,
        auto_publish: true,
        publish_time: "09:00".to_string(),
        photos_published_at: None,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

pub fn product(name: &str, base_price: i64) -> Product {
    Product {
        id: Uuid::new_v4(),
        name: name.to_string(),
        category: "prints".to_string(),
        base_price,
        options: Vec::new(),
        stock_quantity: None,
        is_active: true,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

pub fn product_with_option(name: &str, base_price: i64, option_id: &str, value: &str, modifier: i64) -> Product {
    let mut product = product(name, base_price);
    product.options.push(ProductOption {
        option_id: option_id.to_string(),
        name: option_id.to_string(),
        values: vec![ProductOptionValue {
            value: value.to_string(),
            price_modifier: modifier,
        }],
    });
    product
}

pub fn unpublished_photo(event_id: Uuid) -> Photo {
    Photo {
        id: Uuid::new_v4(),
        event_id,
        uploader_type: "guest".to_string(),
        is_published: false,
        published_at: None,
        created_at: Utc::now(),
    }
}

pub fn shipping_info() -> serde_json::Value {
    serde_json::json!({
        "name": "Hanako Sato",
        "email": "hanako@example.com",
        "phone": "090-1234-5678",
        "postalCode": "150-0001",
        "prefecture": "Tokyo",
        "city": "Shibuya",
        "address1": "1-2-3 Jingumae"
    })
}

pub async fn post_json(
    app: &Router,
    uri: &str,
    body: serde_json::Value,
) -> (StatusCode, serde_json::Value) {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null)
    };
    (status, json)
}

/// POST a raw webhook body with a `Stripe-Signature` header.
pub async fn post_webhook(
    app: &Router,
    body: &str,
    signature: &str,
) -> (StatusCode, serde_json::Value) {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/webhooks/stripe")
                .header("stripe-signature", signature)
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
    (status, json)
}

pub fn error_code(body: &serde_json::Value) -> &str {
    body["error"]["code"].as_str().unwrap_or("")
}
