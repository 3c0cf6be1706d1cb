//! Order creation. Guests order without authenticating; all pricing is
//! re-derived server-side from the current catalog.

use axum::extract::State;
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Order, OrderAmounts, OrderItem, OrderStatus, PaymentRecord, SelectedOption, ShippingInfo};
use crate::payments::IntentMetadata;
use crate::pricing;
use crate::state::AppState;
use crate::utils::validate::{is_valid_email, is_valid_phone};
use crate::utils::AppError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    pub event_id: String,
    pub items: Vec<OrderItemRequest>,
    pub shipping_info: ShippingInfo,
}

/// A requested line. Deliberately carries no price fields: the request
/// schema itself makes client-side prices impossible to submit.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItemRequest {
    pub product_id: Uuid,
    pub quantity: u32,
    #[serde(default)]
    pub selected_options: Vec<SelectedOption>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderResponse {
    pub success: bool,
    pub order_id: Uuid,
    pub client_secret: String,
}

fn validate(req: &CreateOrderRequest) -> Result<Uuid, AppError> {
    if req.event_id.is_empty() || req.items.is_empty() {
        return Err(AppError::InvalidArgument(
            "Event ID and items are required".to_string(),
        ));
    }
    let event_id: Uuid = req
        .event_id
        .parse()
        .map_err(|_| AppError::InvalidArgument("Invalid event ID".to_string()))?;

    if req.items.iter().any(|item| item.quantity == 0) {
        return Err(AppError::InvalidArgument(
            "Item quantity must be at least 1".to_string(),
        ));
    }

    let shipping = &req.shipping_info;
    let required = [
        &shipping.name,
        &shipping.email,
        &shipping.phone,
        &shipping.postal_code,
        &shipping.prefecture,
        &shipping.city,
        &shipping.address1,
    ];
    if required.iter().any(|field| field.is_empty()) {
        return Err(AppError::InvalidArgument(
            "All shipping information fields are required".to_string(),
        ));
    }
    if !is_valid_email(&shipping.email) {
        return Err(AppError::InvalidArgument("Invalid email address".to_string()));
    }
    if !is_valid_phone(&shipping.phone) {
        return Err(AppError::InvalidArgument("Invalid phone number".to_string()));
    }
    Ok(event_id)
}

pub async fn create_order(
    State(state): State<AppState>,
    Json(req): Json<CreateOrderRequest>,
) -> Result<Json<CreateOrderResponse>, AppError> {
    let event_id = validate(&req)?;

    state
        .store
        .get_event(event_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Event not found".to_string()))?;

    // Re-price every line from the current catalog; accumulate the subtotal.
    let mut subtotal: i64 = 0;
    let mut items = Vec::with_capacity(req.items.len());
    for item in &req.items {
        let product = state
            .store
            .get_product(item.product_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("Product {} not found", item.product_id))
            })?;

        let unit_price = pricing::unit_price(&product, &item.selected_options);
        let line_subtotal = unit_price * i64::from(item.quantity);
        subtotal += line_subtotal;

        items.push(OrderItem {
            product_id: product.id,
            product_name: product.name,
            quantity: item.quantity,
            unit_price,
            selected_options: item.selected_options.clone(),
            subtotal: line_subtotal,
        });
    }

    let tax = pricing::tax(subtotal);
    let shipping = pricing::shipping(subtotal);
    let total = subtotal + tax + shipping;

    let intent = state
        .gateway
        .create_payment_intent(
            total,
            "jpy",
            IntentMetadata {
                event_id: event_id.to_string(),
                customer_email: req.shipping_info.email.clone(),
            },
        )
        .await?;

    let now = Utc::now();
    let order = Order {
        id: Uuid::new_v4(),
        event_id,
        order_number: pricing::order_number(now.date_naive()),
        items,
        shipping_info: req.shipping_info,
        amounts: OrderAmounts {
            subtotal,
            tax,
            shipping,
            total,
        },
        payment: PaymentRecord {
            method: "stripe".to_string(),
            payment_intent_id: intent.id.clone(),
            charge_id: None,
            paid_at: None,
        },
        status: OrderStatus::Pending,
        tracking_number: None,
        shipped_at: None,
        delivered_at: None,
        notes: None,
        created_at: now,
        updated_at: now,
    };

    if let Err(error) = state.store.insert_order(&order).await {
        // The intent exists but the order does not; cancel it so no
        // orphaned chargeable intent is left behind.
        if let Err(cancel_error) = state.gateway.cancel_payment_intent(&intent.id).await {
            tracing::error!(
                intent_id = %intent.id,
                error = ?cancel_error,
                "failed to cancel payment intent after order write failure"
            );
        }
        return Err(error.into());
    }

    tracing::info!(order_id = %order.id, order_number = %order.order_number, total, "order created");

    Ok(Json(CreateOrderResponse {
        success: true,
        order_id: order.id,
        client_secret: intent.client_secret,
    }))
}
