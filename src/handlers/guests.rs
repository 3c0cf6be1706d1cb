//! Guest-session issuance and validation. A session is the bridge between a
//! scanned QR code and a backend auth credential.

use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use chrono::{DateTime, Duration, NaiveTime, Utc};
use constant_time_eq::constant_time_eq;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{EventStatus, GuestSession};
use crate::state::AppState;
use crate::utils::token::{generate_token, sign_exchange_token, ExchangeClaims};
use crate::utils::AppError;

/// Sessions outlive the event by a week, then the purge job removes them.
const SESSION_LIFETIME_DAYS: i64 = 7;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateGuestSessionRequest {
    pub event_id: String,
    pub qr_token: String,
    pub device_info: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateGuestSessionResponse {
    pub success: bool,
    pub session_id: Uuid,
    pub guest_token: String,
    /// Exchange credential for the external auth subsystem.
    pub custom_token: String,
    pub expires_at: DateTime<Utc>,
}

fn client_ip(headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(|ip| ip.trim().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

pub async fn create_guest_session(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<CreateGuestSessionRequest>,
) -> Result<Json<CreateGuestSessionResponse>, AppError> {
    if req.event_id.is_empty() || req.qr_token.is_empty() {
        return Err(AppError::InvalidArgument(
            "Event ID and QR token are required".to_string(),
        ));
    }
    let event_id: Uuid = req
        .event_id
        .parse()
        .map_err(|_| AppError::InvalidArgument("Invalid event ID".to_string()))?;

    let event = state
        .store
        .get_event(event_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Event not found".to_string()))?;

    if !constant_time_eq(event.qr_token.as_bytes(), req.qr_token.as_bytes()) {
        return Err(AppError::PermissionDenied("Invalid QR token".to_string()));
    }

    if event.status == EventStatus::Archived {
        return Err(AppError::FailedPrecondition(
            "This event has ended".to_string(),
        ));
    }

    // Single conditional increment: either we own a slot or we fail, never
    // an over-capacity join under concurrency.
    if !state.store.try_claim_guest_slot(event_id).await? {
        return Err(AppError::ResourceExhausted(
            "Guest limit reached".to_string(),
        ));
    }

    let now = Utc::now();
    let guest_token = generate_token(32);
    let expires_at = event.event_date.and_time(NaiveTime::MIN).and_utc()
        + Duration::days(SESSION_LIFETIME_DAYS);

    let session = GuestSession {
        id: Uuid::new_v4(),
        event_id,
        guest_token: guest_token.clone(),
        device_info: req.device_info.unwrap_or_else(|| "unknown".to_string()),
        ip_address: client_ip(&headers),
        expires_at,
        last_access_at: now,
        created_at: now,
    };

    if let Err(error) = state.store.insert_guest_session(&session).await {
        // Give the claimed slot back before surfacing the failure.
        if let Err(release_error) = state.store.release_guest_slot(event_id).await {
            tracing::error!(
                event_id = %event_id,
                error = ?release_error,
                "failed to release guest slot after session insert failure"
            );
        }
        return Err(error.into());
    }

    let custom_token = sign_exchange_token(
        &ExchangeClaims::guest(event_id, guest_token.clone()),
        &state.config.token_signing_secret,
    );

    tracing::info!(session_id = %session.id, event_id = %event_id, "guest session created");

    Ok(Json(CreateGuestSessionResponse {
        success: true,
        session_id: session.id,
        guest_token,
        custom_token,
        expires_at,
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateGuestSessionRequest {
    pub session_id: Uuid,
    pub guest_token: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateGuestSessionResponse {
    pub success: bool,
    pub event_id: Uuid,
    pub valid: bool,
}

pub async fn validate_guest_session(
    State(state): State<AppState>,
    Json(req): Json<ValidateGuestSessionRequest>,
) -> Result<Json<ValidateGuestSessionResponse>, AppError> {
    if req.guest_token.is_empty() {
        return Err(AppError::InvalidArgument(
            "Session ID and guest token are required".to_string(),
        ));
    }

    let session = state
        .store
        .get_guest_session(req.session_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Session not found".to_string()))?;

    if !constant_time_eq(session.guest_token.as_bytes(), req.guest_token.as_bytes()) {
        return Err(AppError::PermissionDenied("Invalid guest token".to_string()));
    }

    let now = Utc::now();
    if session.is_expired(now) {
        return Err(AppError::FailedPrecondition("Session expired".to_string()));
    }

    // Activity analytics only; expiry stays fixed at creation time.
    state.store.touch_guest_session(session.id, now).await?;

    Ok(Json(ValidateGuestSessionResponse {
        success: true,
        event_id: session.event_id,
        valid: true,
    }))
}
