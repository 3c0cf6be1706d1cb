use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A time-boxed anonymous credential scoping a guest's access to one event.
///
/// Created on a successful QR join, validated on each subsequent guest
/// request, and deleted by the scheduled purge once `expires_at` has passed.
/// Expiry is fixed at creation time (event date + 7 days) and never extended;
/// `last_access_at` feeds activity analytics only.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuestSession {
    pub id: Uuid,
    pub event_id: Uuid,
    /// Bearer credential for this session, distinct from the event QR token.
    pub guest_token: String,
    pub device_info: String,
    pub ip_address: String,
    pub expires_at: DateTime<Utc>,
    pub last_access_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl GuestSession {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}
