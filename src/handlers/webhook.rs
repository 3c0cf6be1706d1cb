//! Payment-gateway webhook endpoint.
//!
//! Contract with the gateway: `400` on signature or schema failure, `500`
//! on store failure (the gateway will redeliver), `200 {"received":true}`
//! otherwise — including lookups that match no order, so redelivery storms
//! never build up on unrecoverable mismatches. Redelivery of an already
//! applied event is a no-op.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use serde_json::json;

use crate::payments::stripe::PaymentIntentObject;
use crate::payments::{verify_webhook_signature, WebhookEvent};
use crate::state::AppState;
use crate::store::{Store, StoreError};

pub async fn stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let Some(signature) = headers
        .get("stripe-signature")
        .and_then(|value| value.to_str().ok())
    else {
        return (StatusCode::BAD_REQUEST, "Missing stripe-signature header").into_response();
    };

    if let Err(error) = verify_webhook_signature(
        &body,
        signature,
        &state.config.stripe_webhook_secret,
        Utc::now().timestamp(),
    ) {
        tracing::warn!(error = %error, "webhook signature verification failed");
        return (StatusCode::BAD_REQUEST, "Webhook signature verification failed")
            .into_response();
    }

    // Only now is the payload trusted enough to parse.
    let event: WebhookEvent = match serde_json::from_slice(&body) {
        Ok(event) => event,
        Err(error) => {
            tracing::warn!(error = %error, "malformed webhook payload");
            return (StatusCode::BAD_REQUEST, "Malformed webhook payload").into_response();
        }
    };

    let result = match event.event_type.as_str() {
        "payment_intent.succeeded" => {
            handle_payment_success(state.store.as_ref(), &event.data.object).await
        }
        "payment_intent.payment_failed" => {
            handle_payment_failure(state.store.as_ref(), &event.data.object).await
        }
        other => {
            tracing::debug!(event_type = other, "ignoring webhook event type");
            Ok(())
        }
    };

    match result {
        Ok(()) => (StatusCode::OK, Json(json!({ "received": true }))).into_response(),
        Err(error) => {
            tracing::error!(event_id = %event.id, error = ?error, "webhook processing failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "Webhook processing failed").into_response()
        }
    }
}

async fn handle_payment_success(
    store: &dyn Store,
    intent: &PaymentIntentObject,
) -> Result<(), StoreError> {
    let Some(order) = store.find_order_by_payment_intent(&intent.id).await? else {
        // Already-processed or foreign intent; ack without touching state.
        tracing::warn!(intent_id = %intent.id, "no order for succeeded payment intent");
        return Ok(());
    };

    store
        .mark_order_paid(order.id, intent.latest_charge.as_deref(), Utc::now())
        .await?;

    tracing::info!(order_number = %order.order_number, "payment succeeded");
    Ok(())
}

async fn handle_payment_failure(
    store: &dyn Store,
    intent: &PaymentIntentObject,
) -> Result<(), StoreError> {
    let Some(order) = store.find_order_by_payment_intent(&intent.id).await? else {
        tracing::warn!(intent_id = %intent.id, "no order for failed payment intent");
        return Ok(());
    };

    // The order is kept for the audit trail, only its status moves.
    store
        .mark_order_cancelled(order.id, "Payment failed", Utc::now())
        .await?;

    tracing::info!(order_id = %order.id, "payment failed, order cancelled");
    Ok(())
}
