//! Payment-gateway seam.
//!
//! Abstraction over the hosted payment processor; the production
//! implementation speaks the Stripe REST API, the mock always succeeds and
//! is used in tests and local development.

pub mod stripe;

use std::sync::Mutex;

use async_trait::async_trait;
use thiserror::Error;

pub use stripe::{verify_webhook_signature, SignatureError, StripeGateway, WebhookEvent};

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("gateway request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("gateway rejected request: {0}")]
    Rejected(String),
}

/// A created payment intent: the order-side handle plus the client secret
/// the caller needs to confirm payment on the client side.
#[derive(Debug, Clone)]
pub struct PaymentIntent {
    pub id: String,
    pub client_secret: String,
}

/// Metadata tagged onto every payment intent.
#[derive(Debug, Clone)]
pub struct IntentMetadata {
    pub event_id: String,
    pub customer_email: String,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Create a payment intent for `amount` in the zero-decimal `currency`
    /// (JPY here), with automatic payment-method selection enabled.
    async fn create_payment_intent(
        &self,
        amount: i64,
        currency: &str,
        metadata: IntentMetadata,
    ) -> Result<PaymentIntent, GatewayError>;

    /// Best-effort compensation for an intent whose order write failed.
    async fn cancel_payment_intent(&self, intent_id: &str) -> Result<(), GatewayError>;
}

/// Always-succeeding gateway for development and testing.
#[derive(Default)]
pub struct MockPaymentGateway {
    created: Mutex<Vec<i64>>,
    cancelled: Mutex<Vec<String>>,
}

impl MockPaymentGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Amounts of every intent created so far, in call order.
    pub fn created_amounts(&self) -> Vec<i64> {
        self.created.lock().unwrap().clone()
    }

    pub fn cancelled_intents(&self) -> Vec<String> {
        self.cancelled.lock().unwrap().clone()
    }
}

#[async_trait]
impl PaymentGateway for MockPaymentGateway {
    async fn create_payment_intent(
        &self,
        amount: i64,
        _currency: &str,
        _metadata: IntentMetadata,
    ) -> Result<PaymentIntent, GatewayError> {
        let mut created = self.created.lock().unwrap();
        created.push(amount);
        let n = created.len();
        Ok(PaymentIntent {
            id: format!("pi_mock_{n}"),
            client_secret: format!("pi_mock_{n}_secret_test"),
        })
    }

    async fn cancel_payment_intent(&self, intent_id: &str) -> Result<(), GatewayError> {
        self.cancelled.lock().unwrap().push(intent_id.to_string());
        Ok(())
    }
}
