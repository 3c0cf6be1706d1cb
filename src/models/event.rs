use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle of a wedding event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    Draft,
    Active,
    Ended,
    Archived,
}

impl EventStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventStatus::Draft => "draft",
            EventStatus::Active => "active",
            EventStatus::Ended => "ended",
            EventStatus::Archived => "archived",
        }
    }
}

impl fmt::Display for EventStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(EventStatus::Draft),
            "active" => Ok(EventStatus::Active),
            "ended" => Ok(EventStatus::Ended),
            "archived" => Ok(EventStatus::Archived),
            other => Err(format!("unknown event status '{other}'")),
        }
    }
}

/// A single wedding instance that guests join and upload photos to.
///
/// Invariant: `current_guest_count <= guest_limit`. The counter is only
/// moved by the store's conditional guest-slot claim.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: Uuid,
    pub host_user_id: Uuid,
    pub event_name: String,
    pub event_date: NaiveDate,
    pub event_location: Option<String>,
    /// Long-lived secret embedded in the event's join QR code.
    pub qr_token: String,
    pub guest_limit: i32,
    pub current_guest_count: i32,
    pub status: EventStatus,
    pub auto_publish: bool,
    /// Preferred publish time of day, "HH:MM".
    pub publish_time: String,
    pub photos_published_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_strings() {
        for status in [
            EventStatus::Draft,
            EventStatus::Active,
            EventStatus::Ended,
            EventStatus::Archived,
        ] {
            assert_eq!(status.as_str().parse::<EventStatus>(), Ok(status));
        }
        assert!("gone".parse::<EventStatus>().is_err());
    }
}
