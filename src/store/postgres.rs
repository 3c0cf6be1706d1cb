//! Production store over Postgres.
//!
//! The guest-slot claim is a single conditional `UPDATE` so two simultaneous
//! joins near the limit can never both pass the capacity check.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::models::{Event, GuestSession, Order, OrderAmounts, PaymentRecord, Product};

use super::{Store, StoreError};

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn event_from_row(row: &PgRow) -> Result<Event, StoreError> {
    let status: String = row.try_get("status")?;
    Ok(Event {
        id: row.try_get("id")?,
        host_user_id: row.try_get("host_user_id")?,
        event_name: row.try_get("event_name")?,
        event_date: row.try_get::<NaiveDate, _>("event_date")?,
        event_location: row.try_get("event_location")?,
        qr_token: row.try_get("qr_token")?,
        guest_limit: row.try_get("guest_limit")?,
        current_guest_count: row.try_get("current_guest_count")?,
        status: status.parse().map_err(StoreError::Corrupt)?,
        auto_publish: row.try_get("auto_publish")?,
        publish_time: row.try_get("publish_time")?,
        photos_published_at: row.try_get("photos_published_at")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn session_from_row(row: &PgRow) -> Result<GuestSession, StoreError> {
    Ok(GuestSession {
        id: row.try_get("id")?,
        event_id: row.try_get("event_id")?,
        guest_token: row.try_get("guest_token")?,
        device_info: row.try_get("device_info")?,
        ip_address: row.try_get("ip_address")?,
        expires_at: row.try_get("expires_at")?,
        last_access_at: row.try_get("last_access_at")?,
        created_at: row.try_get("created_at")?,
    })
}

fn product_from_row(row: &PgRow) -> Result<Product, StoreError> {
    let options: serde_json::Value = row.try_get("options")?;
    Ok(Product {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        category: row.try_get("category")?,
        base_price: row.try_get("base_price")?,
        options: serde_json::from_value(options)?,
        stock_quantity: row.try_get("stock_quantity")?,
        is_active: row.try_get("is_active")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn order_from_row(row: &PgRow) -> Result<Order, StoreError> {
    let status: String = row.try_get("status")?;
    let items: serde_json::Value = row.try_get("items")?;
    let shipping_info: serde_json::Value = row.try_get("shipping_info")?;
    Ok(Order {
        id: row.try_get("id")?,
        event_id: row.try_get("event_id")?,
        order_number: row.try_get("order_number")?,
        items: serde_json::from_value(items)?,
        shipping_info: serde_json::from_value(shipping_info)?,
        amounts: OrderAmounts {
            subtotal: row.try_get("subtotal")?,
            tax: row.try_get("tax")?,
            shipping: row.try_get("shipping")?,
            total: row.try_get("total")?,
        },
        payment: PaymentRecord {
            method: row.try_get("payment_method")?,
            payment_intent_id: row.try_get("payment_intent_id")?,
            charge_id: row.try_get("charge_id")?,
            paid_at: row.try_get("paid_at")?,
        },
        status: status.parse().map_err(StoreError::Corrupt)?,
        tracking_number: row.try_get("tracking_number")?,
        shipped_at: row.try_get("shipped_at")?,
        delivered_at: row.try_get("delivered_at")?,
        notes: row.try_get("notes")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[async_trait]
impl Store for PgStore {
    async fn get_event(&self, id: Uuid) -> Result<Option<Event>, StoreError> {
        let row = sqlx::query("SELECT * FROM events WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(event_from_row).transpose()
    }

    async fn try_claim_guest_slot(&self, event_id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "UPDATE events \
             SET current_guest_count = current_guest_count + 1, updated_at = NOW() \
             WHERE id = $1 AND current_guest_count < guest_limit",
        )
        .bind(event_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn release_guest_slot(&self, event_id: Uuid) -> Result<(), StoreError> {
        sqlx::query(
            "UPDATE events \
             SET current_guest_count = current_guest_count - 1, updated_at = NOW() \
             WHERE id = $1 AND current_guest_count > 0",
        )
        .bind(event_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn insert_guest_session(&self, session: &GuestSession) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO guest_sessions \
             (id, event_id, guest_token, device_info, ip_address, expires_at, last_access_at, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(session.id)
        .bind(session.event_id)
        .bind(&session.guest_token)
        .bind(&session.device_info)
        .bind(&session.ip_address)
        .bind(session.expires_at)
        .bind(session.last_access_at)
        .bind(session.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_guest_session(&self, id: Uuid) -> Result<Option<GuestSession>, StoreError> {
        let row = sqlx::query("SELECT * FROM guest_sessions WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(session_from_row).transpose()
    }

    async fn touch_guest_session(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), StoreError> {
        sqlx::query("UPDATE guest_sessions SET last_access_at = $2 WHERE id = $1")
            .bind(id)
            .bind(at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn expired_guest_sessions(
        &self,
        cutoff: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<Uuid>, StoreError> {
        let rows = sqlx::query(
            "SELECT id FROM guest_sessions WHERE expires_at < $1 ORDER BY expires_at LIMIT $2",
        )
        .bind(cutoff)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        rows.iter()
            .map(|row| row.try_get("id").map_err(StoreError::from))
            .collect()
    }

    async fn delete_guest_sessions(&self, ids: &[Uuid]) -> Result<u64, StoreError> {
        if ids.is_empty() {
            return Ok(0);
        }
        let result = sqlx::query("DELETE FROM guest_sessions WHERE id = ANY($1)")
            .bind(ids)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn get_product(&self, id: Uuid) -> Result<Option<Product>, StoreError> {
        let row = sqlx::query("SELECT * FROM products WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(product_from_row).transpose()
    }

    async fn insert_order(&self, order: &Order) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO orders \
             (id, event_id, order_number, items, shipping_info, \
              subtotal, tax, shipping, total, \
              payment_method, payment_intent_id, charge_id, paid_at, \
              status, tracking_number, shipped_at, delivered_at, notes, \
              created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, \
                     $11, $12, $13, $14, $15, $16, $17, $18, $19, $20)",
        )
        .bind(order.id)
        .bind(order.event_id)
        .bind(&order.order_number)
        .bind(serde_json::to_value(&order.items)?)
        .bind(serde_json::to_value(&order.shipping_info)?)
        .bind(order.amounts.subtotal)
        .bind(order.amounts.tax)
        .bind(order.amounts.shipping)
        .bind(order.amounts.total)
        .bind(&order.payment.method)
        .bind(&order.payment.payment_intent_id)
        .bind(&order.payment.charge_id)
        .bind(order.payment.paid_at)
        .bind(order.status.as_str())
        .bind(&order.tracking_number)
        .bind(order.shipped_at)
        .bind(order.delivered_at)
        .bind(&order.notes)
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_order(&self, id: Uuid) -> Result<Option<Order>, StoreError> {
        let row = sqlx::query("SELECT * FROM orders WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(order_from_row).transpose()
    }

    async fn find_order_by_payment_intent(
        &self,
        payment_intent_id: &str,
    ) -> Result<Option<Order>, StoreError> {
        let row = sqlx::query("SELECT * FROM orders WHERE payment_intent_id = $1 LIMIT 1")
            .bind(payment_intent_id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(order_from_row).transpose()
    }

    async fn mark_order_paid(
        &self,
        id: Uuid,
        charge_id: Option<&str>,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "UPDATE orders \
             SET status = 'paid', charge_id = $2, paid_at = $3, updated_at = $3 \
             WHERE id = $1 AND status <> 'paid'",
        )
        .bind(id)
        .bind(charge_id)
        .bind(at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn mark_order_cancelled(
        &self,
        id: Uuid,
        note: &str,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "UPDATE orders \
             SET status = 'cancelled', notes = $2, updated_at = $3 \
             WHERE id = $1 AND status <> 'cancelled'",
        )
        .bind(id)
        .bind(note)
        .bind(at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn auto_publish_candidates(&self) -> Result<Vec<Event>, StoreError> {
        let rows = sqlx::query(
            "SELECT * FROM events \
             WHERE auto_publish AND photos_published_at IS NULL AND status = 'active'",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(event_from_row).collect()
    }

    async fn publish_event_photos(
        &self,
        event_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<u64, StoreError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("UPDATE events SET photos_published_at = $2, updated_at = $2 WHERE id = $1")
            .bind(event_id)
            .bind(at)
            .execute(&mut *tx)
            .await?;

        let result = sqlx::query(
            "UPDATE photos SET is_published = TRUE, published_at = $2 \
             WHERE event_id = $1 AND is_published = FALSE",
        )
        .bind(event_id)
        .bind(at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(result.rows_affected())
    }
}
