//! Stripe Webhook Handling
//!
//! Verifies signed deliveries and reacts to completed checkouts.
//!
//! Stripe signs `"{timestamp}.{raw body}"` with HMAC-SHA256 and sends
//! `stripe-signature: t=<unix>,v1=<hex>[,v1=<hex>...]`. Verification must
//! run over the exact bytes received, before any JSON parsing.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;

use crate::catalog::DEFAULT_PRODUCT_ID;
use crate::checkout::{CUSTOMER_EMAIL_METADATA_KEY, PRODUCT_ID_METADATA_KEY};
use crate::error::{CheckoutError, Result};
use crate::notify::Notifier;
use crate::store::{EventLedger, MemoryEventLedger};

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the Stripe signature
pub const SIGNATURE_HEADER: &str = "stripe-signature";

/// Maximum age of a signed delivery, in seconds
pub const DEFAULT_TOLERANCE_SECS: i64 = 300;

pub const CHECKOUT_SESSION_COMPLETED: &str = "checkout.session.completed";
pub const PAYMENT_INTENT_SUCCEEDED: &str = "payment_intent.succeeded";

/// Stripe webhook signature verifier
#[derive(Clone)]
pub struct SignatureVerifier {
    secret: String,
    tolerance_secs: i64,
}

impl std::fmt::Debug for SignatureVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignatureVerifier")
            .field("tolerance_secs", &self.tolerance_secs)
            .finish_non_exhaustive()
    }
}

impl SignatureVerifier {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            tolerance_secs: DEFAULT_TOLERANCE_SECS,
        }
    }

    #[must_use]
    pub fn with_tolerance(mut self, tolerance_secs: i64) -> Self {
        self.tolerance_secs = tolerance_secs;
        self
    }

    fn mac(&self, payload: &[u8], timestamp: i64) -> Result<HmacSha256> {
        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes())
            .map_err(|e| CheckoutError::Config(e.to_string()))?;
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(payload);
        Ok(mac)
    }

    /// Build a `stripe-signature` header value for a payload
    pub fn sign(&self, payload: &[u8], timestamp: i64) -> Result<String> {
        let digest = self.mac(payload, timestamp)?.finalize().into_bytes();
        Ok(format!("t={timestamp},v1={}", hex::encode(digest)))
    }

    /// Verify a header against the current time
    pub fn verify(&self, payload: &[u8], header: &str) -> Result<()> {
        self.verify_at(payload, header, Utc::now().timestamp())
    }

    /// Verify a header against a given unix time
    pub fn verify_at(&self, payload: &[u8], header: &str, now: i64) -> Result<()> {
        let mut timestamp = None;
        let mut signatures = Vec::new();

        for part in header.split(',') {
            match part.trim().split_once('=') {
                Some(("t", value)) => timestamp = value.parse::<i64>().ok(),
                Some(("v1", value)) => signatures.push(value),
                _ => {}
            }
        }

        let timestamp = timestamp.ok_or_else(|| {
            CheckoutError::Signature(
                "Unable to extract timestamp and signatures from header".into(),
            )
        })?;

        if signatures.is_empty() {
            return Err(CheckoutError::Signature(
                "No signatures found with expected scheme".into(),
            ));
        }

        let mac = self.mac(payload, timestamp)?;
        let matched = signatures.iter().any(|sig| {
            hex::decode(sig)
                .map(|bytes| mac.clone().verify_slice(&bytes).is_ok())
                .unwrap_or(false)
        });

        if !matched {
            return Err(CheckoutError::Signature(
                "No signatures found matching the expected signature for payload".into(),
            ));
        }

        if timestamp < now - self.tolerance_secs {
            return Err(CheckoutError::Signature(
                "Timestamp outside the tolerance zone".into(),
            ));
        }

        Ok(())
    }
}

/// Verified Stripe event envelope
#[derive(Clone, Debug, Deserialize)]
pub struct Event {
    pub id: String,

    #[serde(rename = "type")]
    pub event_type: String,

    pub data: EventData,
}

#[derive(Clone, Debug, Deserialize)]
pub struct EventData {
    pub object: serde_json::Value,
}

#[derive(Deserialize)]
struct CustomerDetails {
    email: Option<String>,
}

#[derive(Deserialize)]
struct SessionObject {
    id: String,
    customer_email: Option<String>,
    customer_details: Option<CustomerDetails>,
    amount_total: Option<i64>,
    currency: Option<String>,
    payment_intent: Option<serde_json::Value>,
    metadata: Option<HashMap<String, String>>,
}

#[derive(Deserialize)]
struct ObjectId {
    id: String,
}

/// A paid checkout session, as attributed from its metadata
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompletedCheckout {
    pub session_id: String,
    pub customer_email: Option<String>,
    /// Amount charged in cents
    pub amount_total: i64,
    pub currency: Option<String>,
    pub payment_intent: Option<String>,
    pub product_id: String,
}

impl CompletedCheckout {
    /// Extract from a `checkout.session` object
    pub fn from_object(object: &serde_json::Value) -> Result<Self> {
        let session: SessionObject = serde_json::from_value(object.clone())
            .map_err(|e| CheckoutError::Payload(e.to_string()))?;

        let metadata = session.metadata.unwrap_or_default();
        let filled = |v: Option<String>| v.filter(|s| !s.trim().is_empty());

        let customer_email = filled(session.customer_email)
            .or_else(|| filled(session.customer_details.and_then(|d| d.email)))
            .or_else(|| filled(metadata.get(CUSTOMER_EMAIL_METADATA_KEY).cloned()));

        let product_id = filled(metadata.get(PRODUCT_ID_METADATA_KEY).cloned())
            .unwrap_or_else(|| DEFAULT_PRODUCT_ID.to_string());

        let payment_intent = session.payment_intent.and_then(|pi| match pi {
            serde_json::Value::String(id) => Some(id),
            other => serde_json::from_value::<ObjectId>(other).ok().map(|o| o.id),
        });

        Ok(Self {
            session_id: session.id,
            customer_email,
            amount_total: session.amount_total.unwrap_or(0),
            currency: session.currency,
            payment_intent,
            product_id,
        })
    }
}

/// Parsed webhook event
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WebhookEvent {
    /// Checkout completed - notify customer and admin
    CheckoutCompleted(CompletedCheckout),

    /// Payment intent succeeded - logged only
    PaymentSucceeded { payment_intent_id: Option<String> },

    /// Unhandled event type
    Other { event_type: String },
}

impl WebhookEvent {
    /// Classify a verified event
    pub fn from_event(event: &Event) -> Result<Self> {
        match event.event_type.as_str() {
            CHECKOUT_SESSION_COMPLETED => {
                CompletedCheckout::from_object(&event.data.object).map(Self::CheckoutCompleted)
            }
            PAYMENT_INTENT_SUCCEEDED => Ok(Self::PaymentSucceeded {
                payment_intent_id: event.data.object["id"].as_str().map(ToString::to_string),
            }),
            other => Ok(Self::Other {
                event_type: other.to_string(),
            }),
        }
    }
}

/// What happened to an acknowledged delivery
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WebhookReceipt {
    pub event_id: String,
    pub event_type: String,
    /// Event id was already handled
    pub duplicate: bool,
    /// Emails accepted by the provider
    pub emails_sent: usize,
}

/// Webhook receiver
pub struct WebhookReceiver {
    verifier: SignatureVerifier,
    notifier: Notifier,
    ledger: Arc<dyn EventLedger>,
}

impl WebhookReceiver {
    pub fn new(verifier: SignatureVerifier, notifier: Notifier) -> Self {
        Self {
            verifier,
            notifier,
            ledger: Arc::new(MemoryEventLedger::new()),
        }
    }

    /// Replace the processed-event ledger
    #[must_use]
    pub fn with_ledger(mut self, ledger: Arc<dyn EventLedger>) -> Self {
        self.ledger = ledger;
        self
    }

    /// Verify webhook signature and parse event
    pub fn verify(&self, payload: &[u8], signature: Option<&str>) -> Result<Event> {
        let signature = signature.filter(|s| !s.is_empty()).ok_or_else(|| {
            CheckoutError::Signature("No stripe-signature header value was provided.".into())
        })?;

        self.verifier.verify(payload, signature)?;

        serde_json::from_slice(payload).map_err(|e| CheckoutError::Payload(e.to_string()))
    }

    /// Verify and process a delivery.
    ///
    /// Only verification can fail. Once the signature checks out the
    /// delivery is acknowledged whatever happens downstream.
    pub async fn receive(&self, payload: &[u8], signature: Option<&str>) -> Result<WebhookReceipt> {
        let event = self.verify(payload, signature)?;
        Ok(self.handle(&event).await)
    }

    /// Process a verified event
    pub async fn handle(&self, event: &Event) -> WebhookReceipt {
        tracing::info!(event_id = %event.id, event_type = %event.event_type, "Processing Stripe webhook");

        let mut receipt = WebhookReceipt {
            event_id: event.id.clone(),
            event_type: event.event_type.clone(),
            duplicate: false,
            emails_sent: 0,
        };

        let parsed = match WebhookEvent::from_event(event) {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::error!(event_id = %event.id, error = %e, "Could not read event object");
                return receipt;
            }
        };

        match parsed {
            WebhookEvent::CheckoutCompleted(checkout) => {
                match self.ledger.record(&event.id) {
                    Ok(true) => {}
                    Ok(false) => {
                        tracing::info!(
                            event_id = %event.id,
                            session_id = %checkout.session_id,
                            "Duplicate delivery, notifications already sent"
                        );
                        receipt.duplicate = true;
                        return receipt;
                    }
                    Err(e) => {
                        tracing::warn!(event_id = %event.id, error = %e, "Event ledger unavailable");
                    }
                }

                match self.notifier.notify(&checkout).await {
                    Ok(sent) => {
                        receipt.emails_sent = sent;
                        tracing::info!(
                            session_id = %checkout.session_id,
                            product_id = %checkout.product_id,
                            "Payment successful"
                        );
                    }
                    Err(e) => {
                        // Acknowledge anyway so Stripe does not retry
                        tracing::error!(
                            session_id = %checkout.session_id,
                            error = %e,
                            "Email sending failed"
                        );
                    }
                }
            }

            WebhookEvent::PaymentSucceeded { payment_intent_id } => {
                tracing::info!(payment_intent = ?payment_intent_id, "PaymentIntent was successful");
            }

            WebhookEvent::Other { event_type } => {
                tracing::debug!(event_type = %event_type, "Unhandled webhook event");
            }
        }

        receipt
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::email::{EmailMessage, Mailer, MemoryMailer};
    use async_trait::async_trait;
    use serde_json::json;

    const SECRET: &str = "whsec_test123secret456";

    struct FailingMailer;

    #[async_trait]
    impl Mailer for FailingMailer {
        async fn send(&self, _message: &EmailMessage) -> Result<Option<String>> {
            Err(CheckoutError::Email("connection reset".into()))
        }
    }

    fn receiver(mailer: Arc<dyn Mailer>) -> WebhookReceiver {
        WebhookReceiver::new(
            SignatureVerifier::new(SECRET),
            Notifier::new(mailer, "service@yourwebsite.com", "admin@example.com", "https://tally.so/r/x"),
        )
    }

    fn completed_event(id: &str, email: Option<&str>) -> Vec<u8> {
        json!({
            "id": id,
            "type": "checkout.session.completed",
            "data": { "object": {
                "id": "cs_test_123",
                "object": "checkout.session",
                "customer_email": email,
                "amount_total": 29600,
                "currency": "usd",
                "payment_intent": "pi_123",
                "metadata": { "productId": "with_upsell" }
            }}
        })
        .to_string()
        .into_bytes()
    }

    fn signed(payload: &[u8]) -> String {
        SignatureVerifier::new(SECRET)
            .sign(payload, Utc::now().timestamp())
            .unwrap()
    }

    #[test]
    fn test_valid_signature() {
        let payload = br#"{"id":"evt_1"}"#;
        let verifier = SignatureVerifier::new(SECRET);
        let header = verifier.sign(payload, 1_700_000_000).unwrap();

        assert!(verifier.verify_at(payload, &header, 1_700_000_010).is_ok());
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let payload = br#"{"id":"evt_1"}"#;
        let header = SignatureVerifier::new("wrong_secret").sign(payload, 1_700_000_000).unwrap();

        let err = SignatureVerifier::new(SECRET)
            .verify_at(payload, &header, 1_700_000_000)
            .unwrap_err();
        assert!(matches!(err, CheckoutError::Signature(_)));
    }

    #[test]
    fn test_tampered_payload_rejected() {
        let verifier = SignatureVerifier::new(SECRET);
        let header = verifier.sign(br#"{"amount":100}"#, 1_700_000_000).unwrap();

        assert!(verifier.verify_at(br#"{"amount":999}"#, &header, 1_700_000_000).is_err());
    }

    #[test]
    fn test_expired_timestamp_rejected() {
        let payload = b"{}";
        let verifier = SignatureVerifier::new(SECRET);
        let header = verifier.sign(payload, 1_700_000_000).unwrap();

        let err = verifier
            .verify_at(payload, &header, 1_700_000_000 + DEFAULT_TOLERANCE_SECS + 1)
            .unwrap_err();
        assert!(matches!(err, CheckoutError::Signature(ref m) if m.contains("tolerance")));
    }

    #[test]
    fn test_custom_tolerance() {
        let payload = b"{}";
        let verifier = SignatureVerifier::new(SECRET).with_tolerance(10);
        let header = verifier.sign(payload, 1_700_000_000).unwrap();

        assert!(verifier.verify_at(payload, &header, 1_700_000_010).is_ok());
        assert!(verifier.verify_at(payload, &header, 1_700_000_011).is_err());
    }

    #[test]
    fn test_malformed_headers_rejected() {
        let verifier = SignatureVerifier::new(SECRET);
        for header in ["", "garbage", "v1=abcdef", "t=1700000000", "t=1700000000,v1=not-hex"] {
            assert!(verifier.verify_at(b"{}", header, 1_700_000_000).is_err(), "{header}");
        }
    }

    #[test]
    fn test_any_matching_v1_accepted() {
        let payload = b"{}";
        let verifier = SignatureVerifier::new(SECRET);
        let good = verifier.sign(payload, 1_700_000_000).unwrap();
        let header = format!("t=1700000000,v1={},{}", "00".repeat(32), &good[13..]);

        assert!(verifier.verify_at(payload, &header, 1_700_000_000).is_ok());
    }

    #[test]
    fn test_completed_checkout_extraction() {
        let object = json!({
            "id": "cs_test_9",
            "customer_email": null,
            "customer_details": { "email": "details@example.com" },
            "amount_total": 24700,
            "payment_intent": { "id": "pi_expanded" },
            "metadata": {}
        });

        let checkout = CompletedCheckout::from_object(&object).unwrap();
        assert_eq!(checkout.customer_email.as_deref(), Some("details@example.com"));
        assert_eq!(checkout.product_id, "basic_service");
        assert_eq!(checkout.payment_intent.as_deref(), Some("pi_expanded"));
        assert_eq!(checkout.amount_total, 24700);
    }

    #[test]
    fn test_event_classification() {
        let event: Event = serde_json::from_value(json!({
            "id": "evt_2",
            "type": "payment_intent.succeeded",
            "data": { "object": { "id": "pi_1" } }
        }))
        .unwrap();
        assert_eq!(
            WebhookEvent::from_event(&event).unwrap(),
            WebhookEvent::PaymentSucceeded { payment_intent_id: Some("pi_1".into()) }
        );

        let event: Event = serde_json::from_value(json!({
            "id": "evt_3",
            "type": "customer.created",
            "data": { "object": {} }
        }))
        .unwrap();
        assert!(matches!(WebhookEvent::from_event(&event).unwrap(), WebhookEvent::Other { .. }));
    }

    #[tokio::test]
    async fn test_completed_with_email_sends_two() {
        let mailer = Arc::new(MemoryMailer::new());
        let payload = completed_event("evt_1", Some("buyer@example.com"));

        let receipt = receiver(mailer.clone())
            .receive(&payload, Some(&signed(&payload)))
            .await
            .unwrap();

        assert_eq!(receipt.emails_sent, 2);
        assert_eq!(mailer.sent().len(), 2);
    }

    #[tokio::test]
    async fn test_completed_without_email_sends_admin_only() {
        let mailer = Arc::new(MemoryMailer::new());
        let payload = completed_event("evt_1", None);

        receiver(mailer.clone())
            .receive(&payload, Some(&signed(&payload)))
            .await
            .unwrap();

        let sent = mailer.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "admin@example.com");
        assert!(sent[0].html.contains("296.00"));
        assert!(sent[0].html.contains("with_upsell"));
    }

    #[tokio::test]
    async fn test_bad_signature_sends_nothing() {
        let mailer = Arc::new(MemoryMailer::new());
        let payload = completed_event("evt_1", Some("buyer@example.com"));
        let header = SignatureVerifier::new("whsec_other")
            .sign(&payload, Utc::now().timestamp())
            .unwrap();

        let receiver = receiver(mailer.clone());
        assert!(matches!(
            receiver.receive(&payload, Some(&header)).await,
            Err(CheckoutError::Signature(_))
        ));
        assert!(matches!(
            receiver.receive(&payload, None).await,
            Err(CheckoutError::Signature(_))
        ));
        assert!(mailer.sent().is_empty());
    }

    #[tokio::test]
    async fn test_email_failure_still_acknowledged() {
        let payload = completed_event("evt_1", Some("buyer@example.com"));

        let receipt = receiver(Arc::new(FailingMailer))
            .receive(&payload, Some(&signed(&payload)))
            .await
            .unwrap();

        assert_eq!(receipt.emails_sent, 0);
        assert!(!receipt.duplicate);
    }

    #[tokio::test]
    async fn test_duplicate_delivery_notifies_once() {
        let mailer = Arc::new(MemoryMailer::new());
        let receiver = receiver(mailer.clone());
        let payload = completed_event("evt_dup", Some("buyer@example.com"));

        let first = receiver.receive(&payload, Some(&signed(&payload))).await.unwrap();
        let second = receiver.receive(&payload, Some(&signed(&payload))).await.unwrap();

        assert!(!first.duplicate);
        assert!(second.duplicate);
        assert_eq!(mailer.sent().len(), 2);
    }

    #[tokio::test]
    async fn test_shared_ledger_dedups_across_receivers() {
        let mailer = Arc::new(MemoryMailer::new());
        let ledger = Arc::new(MemoryEventLedger::new());
        let server = receiver(mailer.clone()).with_ledger(ledger.clone());
        let function = receiver(mailer.clone()).with_ledger(ledger.clone());
        let payload = completed_event("evt_shared", None);

        let first = server.receive(&payload, Some(&signed(&payload))).await.unwrap();
        let second = function.receive(&payload, Some(&signed(&payload))).await.unwrap();

        assert_eq!(first.emails_sent, 1);
        assert!(second.duplicate);
        assert_eq!(mailer.sent().len(), 1);
        assert!(ledger.contains("evt_shared").unwrap());
    }

    #[tokio::test]
    async fn test_signed_garbage_is_payload_error() {
        let payload = b"not json";
        let err = receiver(Arc::new(MemoryMailer::new()))
            .receive(payload, Some(&signed(payload)))
            .await
            .unwrap_err();

        assert!(matches!(err, CheckoutError::Payload(_)));
    }
}
