use axum::response::{IntoResponse, Response};
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

pub mod guests;
pub mod orders;
pub mod webhook;

pub use guests::{create_guest_session, validate_guest_session};
pub use orders::create_order;
pub use webhook::stripe_webhook;

#[derive(Serialize)]
struct HealthPayload {
    status: &'static str,
    service: &'static str,
}

pub async fn health_check() -> Response {
    let payload = HealthPayload {
        status: "ok",
        service: "moments-api",
    };
    (StatusCode::OK, Json(payload)).into_response()
}
