//! Opaque random tokens and the HMAC-signed exchange credential handed to
//! guests for the external auth subsystem.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use constant_time_eq::constant_time_eq;
use hmac::{Hmac, Mac};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

/// Generate an opaque random token, hex-encoded (`bytes * 2` characters).
pub fn generate_token(bytes: usize) -> String {
    let mut buf = vec![0u8; bytes];
    rand::thread_rng().fill_bytes(&mut buf);
    buf.iter().map(|b| format!("{b:02x}")).collect()
}

/// Claims carried by the exchange credential. The client trades this token
/// for a session with the authentication subsystem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExchangeClaims {
    pub event_id: Uuid,
    pub guest_token: String,
    pub role: String,
}

impl ExchangeClaims {
    pub fn guest(event_id: Uuid, guest_token: String) -> Self {
        Self {
            event_id,
            guest_token,
            role: "guest".to_string(),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("malformed token")]
    Malformed,
    #[error("signature mismatch")]
    BadSignature,
}

/// Sign claims into a compact `payload.signature` credential
/// (base64url JSON payload, base64url HMAC-SHA256 signature).
pub fn sign_exchange_token(claims: &ExchangeClaims, secret: &str) -> String {
    let payload =
        URL_SAFE_NO_PAD.encode(serde_json::to_vec(claims).expect("claims serialize to JSON"));
    let signature = URL_SAFE_NO_PAD.encode(mac_over(payload.as_bytes(), secret));
    format!("{payload}.{signature}")
}

/// Verify a credential and return its claims.
pub fn verify_exchange_token(token: &str, secret: &str) -> Result<ExchangeClaims, TokenError> {
    let (payload, signature) = token.split_once('.').ok_or(TokenError::Malformed)?;

    let expected = URL_SAFE_NO_PAD.encode(mac_over(payload.as_bytes(), secret));
    if !constant_time_eq(expected.as_bytes(), signature.as_bytes()) {
        return Err(TokenError::BadSignature);
    }

    let raw = URL_SAFE_NO_PAD
        .decode(payload)
        .map_err(|_| TokenError::Malformed)?;
    serde_json::from_slice(&raw).map_err(|_| TokenError::Malformed)
}

fn mac_over(data: &[u8], secret: &str) -> Vec<u8> {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}
