use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::config::{create_cors_layer, create_security_headers_layer};
use crate::handlers::{
    create_guest_session, create_order, health_check, stripe_webhook, validate_guest_session,
};
use crate::state::AppState;

pub fn create_routes(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/orders", post(create_order))
        .route("/webhooks/stripe", post(stripe_webhook))
        .route("/guest-sessions", post(create_guest_session))
        .route("/guest-sessions/validate", post(validate_guest_session))
        .layer(TraceLayer::new_for_http())
        .layer(create_security_headers_layer())
        .layer(create_cors_layer())
        .with_state(state)
}
