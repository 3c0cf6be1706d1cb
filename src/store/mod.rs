//! Data-store seam. All shared state lives behind this trait; request
//! handlers and jobs are stateless against it.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::models::{Event, GuestSession, Order, Product};

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error")]
    Database(#[from] sqlx::Error),

    #[error("serialization error")]
    Serialization(#[from] serde_json::Error),

    #[error("corrupt record: {0}")]
    Corrupt(String),
}

#[async_trait]
pub trait Store: Send + Sync {
    async fn get_event(&self, id: Uuid) -> Result<Option<Event>, StoreError>;

    /// Conditional atomic increment of the event's guest counter: succeeds
    /// (and increments) only while `current_guest_count < guest_limit`.
    /// Returns `false` when the event is at capacity or absent.
    async fn try_claim_guest_slot(&self, event_id: Uuid) -> Result<bool, StoreError>;

    /// Compensation for a claim whose session insert failed.
    async fn release_guest_slot(&self, event_id: Uuid) -> Result<(), StoreError>;

    async fn insert_guest_session(&self, session: &GuestSession) -> Result<(), StoreError>;

    async fn get_guest_session(&self, id: Uuid) -> Result<Option<GuestSession>, StoreError>;

    async fn touch_guest_session(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), StoreError>;

    /// Ids of sessions with `expires_at < cutoff`, oldest first, capped at
    /// `limit` to respect batch-write limits.
    async fn expired_guest_sessions(
        &self,
        cutoff: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<Uuid>, StoreError>;

    /// Batch delete; absent ids are skipped. Returns the number deleted.
    async fn delete_guest_sessions(&self, ids: &[Uuid]) -> Result<u64, StoreError>;

    async fn get_product(&self, id: Uuid) -> Result<Option<Product>, StoreError>;

    async fn insert_order(&self, order: &Order) -> Result<(), StoreError>;

    async fn get_order(&self, id: Uuid) -> Result<Option<Order>, StoreError>;

    async fn find_order_by_payment_intent(
        &self,
        payment_intent_id: &str,
    ) -> Result<Option<Order>, StoreError>;

    /// Transition an order to `paid`, recording the charge id and paid-at
    /// timestamp. A no-op when the order is already paid, so webhook
    /// redelivery cannot move `paid_at`.
    async fn mark_order_paid(
        &self,
        id: Uuid,
        charge_id: Option<&str>,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    /// Transition an order to `cancelled` with a note. A no-op when already
    /// cancelled; the order itself is never deleted.
    async fn mark_order_cancelled(
        &self,
        id: Uuid,
        note: &str,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    /// Events eligible for auto-publish: `auto_publish` set, photos not yet
    /// published, status `active`. Date filtering happens in the job.
    async fn auto_publish_candidates(&self) -> Result<Vec<Event>, StoreError>;

    /// Set the event's `photos_published_at` and flip every unpublished
    /// photo of the event to published, all stamped with `at`, in one batch.
    /// Returns the number of photos flipped.
    async fn publish_event_photos(&self, event_id: Uuid, at: DateTime<Utc>)
        -> Result<u64, StoreError>;
}
