//! Stripe REST client and webhook-event plumbing.

use async_trait::async_trait;
use constant_time_eq::constant_time_eq;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use thiserror::Error;

use super::{GatewayError, IntentMetadata, PaymentGateway, PaymentIntent};

type HmacSha256 = Hmac<Sha256>;

const API_BASE: &str = "https://api.stripe.com/v1";

/// Accepted clock skew between the signature timestamp and our clock.
pub const SIGNATURE_TOLERANCE_SECS: i64 = 300;

pub struct StripeGateway {
    http: reqwest::Client,
    secret_key: String,
}

impl StripeGateway {
    pub fn new(secret_key: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            secret_key,
        }
    }
}

#[derive(Deserialize)]
struct IntentResponse {
    id: String,
    client_secret: String,
}

#[derive(Deserialize)]
struct ApiErrorEnvelope {
    error: ApiErrorBody,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    message: Option<String>,
}

async fn rejection(response: reqwest::Response) -> GatewayError {
    let status = response.status();
    let message = match response.json::<ApiErrorEnvelope>().await {
        Ok(envelope) => envelope.error.message.unwrap_or_default(),
        Err(_) => String::new(),
    };
    GatewayError::Rejected(format!("{status}: {message}"))
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    async fn create_payment_intent(
        &self,
        amount: i64,
        currency: &str,
        metadata: IntentMetadata,
    ) -> Result<PaymentIntent, GatewayError> {
        let params = [
            ("amount", amount.to_string()),
            ("currency", currency.to_string()),
            ("metadata[eventId]", metadata.event_id),
            ("metadata[customerEmail]", metadata.customer_email),
            ("automatic_payment_methods[enabled]", "true".to_string()),
        ];

        let response = self
            .http
            .post(format!("{API_BASE}/payment_intents"))
            .bearer_auth(&self.secret_key)
            .form(&params)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(rejection(response).await);
        }

        let intent: IntentResponse = response.json().await?;
        Ok(PaymentIntent {
            id: intent.id,
            client_secret: intent.client_secret,
        })
    }

    async fn cancel_payment_intent(&self, intent_id: &str) -> Result<(), GatewayError> {
        let response = self
            .http
            .post(format!("{API_BASE}/payment_intents/{intent_id}/cancel"))
            .bearer_auth(&self.secret_key)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(rejection(response).await);
        }
        Ok(())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("malformed signature header")]
    Malformed,
    #[error("signature timestamp outside tolerance")]
    StaleTimestamp,
    #[error("no signature matched the payload")]
    Mismatch,
}

/// Verify a `Stripe-Signature` header against the raw request body.
///
/// The header carries a unix timestamp and one or more `v1` signatures; each
/// `v1` is HMAC-SHA256 over `"{t}.{payload}"` keyed by the webhook secret,
/// hex-encoded. Comparison is constant-time. An unverified payload must
/// never be processed.
pub fn verify_webhook_signature(
    payload: &[u8],
    header: &str,
    secret: &str,
    now_unix: i64,
) -> Result<(), SignatureError> {
    let mut timestamp: Option<i64> = None;
    let mut signatures: Vec<&str> = Vec::new();

    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => {
                timestamp = Some(value.parse().map_err(|_| SignatureError::Malformed)?);
            }
            Some(("v1", value)) => signatures.push(value),
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or(SignatureError::Malformed)?;
    if signatures.is_empty() {
        return Err(SignatureError::Malformed);
    }
    if (now_unix - timestamp).abs() > SIGNATURE_TOLERANCE_SECS {
        return Err(SignatureError::StaleTimestamp);
    }

    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    let expected = hex(&mac.finalize().into_bytes());

    if signatures
        .iter()
        .any(|sig| constant_time_eq(expected.as_bytes(), sig.as_bytes()))
    {
        Ok(())
    } else {
        Err(SignatureError::Mismatch)
    }
}

/// Build a `Stripe-Signature` header value for `payload`. Test helper, and
/// the reference for what `verify_webhook_signature` expects.
pub fn sign_webhook_payload(payload: &[u8], secret: &str, timestamp: i64) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    format!("t={timestamp},v1={}", hex(&mac.finalize().into_bytes()))
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Typed webhook payload. Only the fields the reconciliation logic needs are
/// modeled; unknown event types are acknowledged and ignored upstream.
#[derive(Debug, Deserialize)]
pub struct WebhookEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: WebhookEventData,
}

#[derive(Debug, Deserialize)]
pub struct WebhookEventData {
    pub object: PaymentIntentObject,
}

#[derive(Debug, Deserialize)]
pub struct PaymentIntentObject {
    pub id: String,
    #[serde(default)]
    pub latest_charge: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_test_secret";
    const PAYLOAD: &[u8] = br#"{"id":"evt_1","type":"payment_intent.succeeded"}"#;

    #[test]
    fn accepts_a_correctly_signed_payload() {
        let header = sign_webhook_payload(PAYLOAD, SECRET, 1_700_000_000);
        assert_eq!(
            verify_webhook_signature(PAYLOAD, &header, SECRET, 1_700_000_000),
            Ok(())
        );
    }

    #[test]
    fn rejects_a_tampered_payload() {
        let header = sign_webhook_payload(PAYLOAD, SECRET, 1_700_000_000);
        let tampered = br#"{"id":"evt_1","type":"payment_intent.payment_failed"}"#;
        assert_eq!(
            verify_webhook_signature(tampered, &header, SECRET, 1_700_000_000),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn rejects_the_wrong_secret() {
        let header = sign_webhook_payload(PAYLOAD, "whsec_other", 1_700_000_000);
        assert_eq!(
            verify_webhook_signature(PAYLOAD, &header, SECRET, 1_700_000_000),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn rejects_timestamps_outside_tolerance() {
        let header = sign_webhook_payload(PAYLOAD, SECRET, 1_700_000_000);
        assert_eq!(
            verify_webhook_signature(PAYLOAD, &header, SECRET, 1_700_000_000 + 301),
            Err(SignatureError::StaleTimestamp)
        );
    }

    #[test]
    fn rejects_headers_without_signatures() {
        assert_eq!(
            verify_webhook_signature(PAYLOAD, "t=1700000000", SECRET, 1_700_000_000),
            Err(SignatureError::Malformed)
        );
        assert_eq!(
            verify_webhook_signature(PAYLOAD, "v1=abc", SECRET, 1_700_000_000),
            Err(SignatureError::Malformed)
        );
    }

    #[test]
    fn parses_a_payment_intent_event() {
        let body = r#"{
            "id": "evt_42",
            "type": "payment_intent.succeeded",
            "data": {"object": {"id": "pi_123", "latest_charge": "ch_456", "amount": 22770}}
        }"#;
        let event: WebhookEvent = serde_json::from_str(body).unwrap();
        assert_eq!(event.event_type, "payment_intent.succeeded");
        assert_eq!(event.data.object.id, "pi_123");
        assert_eq!(event.data.object.latest_charge.as_deref(), Some("ch_456"));
    }
}
