//! In-memory store for tests and local development.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::{Event, GuestSession, Order, OrderStatus, Photo, Product};

use super::{Store, StoreError};

#[derive(Default)]
struct Inner {
    events: HashMap<Uuid, Event>,
    sessions: HashMap<Uuid, GuestSession>,
    products: HashMap<Uuid, Product>,
    orders: HashMap<Uuid, Order>,
    photos: HashMap<Uuid, Photo>,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_event(&self, event: Event) {
        self.inner.lock().unwrap().events.insert(event.id, event);
    }

    pub fn insert_product(&self, product: Product) {
        self.inner.lock().unwrap().products.insert(product.id, product);
    }

    pub fn insert_photo(&self, photo: Photo) {
        self.inner.lock().unwrap().photos.insert(photo.id, photo);
    }

    pub fn photos_for_event(&self, event_id: Uuid) -> Vec<Photo> {
        let inner = self.inner.lock().unwrap();
        inner
            .photos
            .values()
            .filter(|p| p.event_id == event_id)
            .cloned()
            .collect()
    }

    pub fn session_count(&self) -> usize {
        self.inner.lock().unwrap().sessions.len()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn get_event(&self, id: Uuid) -> Result<Option<Event>, StoreError> {
        Ok(self.inner.lock().unwrap().events.get(&id).cloned())
    }

    async fn try_claim_guest_slot(&self, event_id: Uuid) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        match inner.events.get_mut(&event_id) {
            Some(event) if event.current_guest_count < event.guest_limit => {
                event.current_guest_count += 1;
                event.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn release_guest_slot(&self, event_id: Uuid) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(event) = inner.events.get_mut(&event_id) {
            if event.current_guest_count > 0 {
                event.current_guest_count -= 1;
                event.updated_at = Utc::now();
            }
        }
        Ok(())
    }

    async fn insert_guest_session(&self, session: &GuestSession) -> Result<(), StoreError> {
        self.inner
            .lock()
            .unwrap()
            .sessions
            .insert(session.id, session.clone());
        Ok(())
    }

    async fn get_guest_session(&self, id: Uuid) -> Result<Option<GuestSession>, StoreError> {
        Ok(self.inner.lock().unwrap().sessions.get(&id).cloned())
    }

    async fn touch_guest_session(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), StoreError> {
        if let Some(session) = self.inner.lock().unwrap().sessions.get_mut(&id) {
            session.last_access_at = at;
        }
        Ok(())
    }

    async fn expired_guest_sessions(
        &self,
        cutoff: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<Uuid>, StoreError> {
        let inner = self.inner.lock().unwrap();
        let mut expired: Vec<&GuestSession> = inner
            .sessions
            .values()
            .filter(|s| s.expires_at < cutoff)
            .collect();
        expired.sort_by_key(|s| s.expires_at);
        Ok(expired
            .into_iter()
            .take(limit.max(0) as usize)
            .map(|s| s.id)
            .collect())
    }

    async fn delete_guest_sessions(&self, ids: &[Uuid]) -> Result<u64, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let mut deleted = 0;
        for id in ids {
            if inner.sessions.remove(id).is_some() {
                deleted += 1;
            }
        }
        Ok(deleted)
    }

    async fn get_product(&self, id: Uuid) -> Result<Option<Product>, StoreError> {
        Ok(self.inner.lock().unwrap().products.get(&id).cloned())
    }

    async fn insert_order(&self, order: &Order) -> Result<(), StoreError> {
        self.inner
            .lock()
            .unwrap()
            .orders
            .insert(order.id, order.clone());
        Ok(())
    }

    async fn get_order(&self, id: Uuid) -> Result<Option<Order>, StoreError> {
        Ok(self.inner.lock().unwrap().orders.get(&id).cloned())
    }

    async fn find_order_by_payment_intent(
        &self,
        payment_intent_id: &str,
    ) -> Result<Option<Order>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .orders
            .values()
            .find(|o| o.payment.payment_intent_id == payment_intent_id)
            .cloned())
    }

    async fn mark_order_paid(
        &self,
        id: Uuid,
        charge_id: Option<&str>,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(order) = inner.orders.get_mut(&id) {
            if order.status == OrderStatus::Paid {
                return Ok(());
            }
            order.status = OrderStatus::Paid;
            order.payment.charge_id = charge_id.map(str::to_string);
            order.payment.paid_at = Some(at);
            order.updated_at = at;
        }
        Ok(())
    }

    async fn mark_order_cancelled(
        &self,
        id: Uuid,
        note: &str,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(order) = inner.orders.get_mut(&id) {
            if order.status == OrderStatus::Cancelled {
                return Ok(());
            }
            order.status = OrderStatus::Cancelled;
            order.notes = Some(note.to_string());
            order.updated_at = at;
        }
        Ok(())
    }

    async fn auto_publish_candidates(&self) -> Result<Vec<Event>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .events
            .values()
            .filter(|e| {
                e.auto_publish
                    && e.photos_published_at.is_none()
                    && e.status == crate::models::EventStatus::Active
            })
            .cloned()
            .collect())
    }

    async fn publish_event_photos(
        &self,
        event_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<u64, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(event) = inner.events.get_mut(&event_id) {
            event.photos_published_at = Some(at);
            event.updated_at = at;
        }
        let mut flipped = 0;
        for photo in inner.photos.values_mut() {
            if photo.event_id == event_id && !photo.is_published {
                photo.is_published = true;
                photo.published_at = Some(at);
                flipped += 1;
            }
        }
        Ok(flipped)
    }
}
