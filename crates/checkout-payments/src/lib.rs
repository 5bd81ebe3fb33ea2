//! # checkout-payments
//!
//! Checkout sessions, webhook handling and purchase notifications for the
//! assessment shop.
//!
//! ## Flow
//!
//! ```text
//! ┌─────────────┐     ┌─────────────────┐     ┌─────────────┐
//! │   Browser   │────▶│  Stripe Hosted  │────▶│   Browser   │
//! │  (payment)  │     │  Checkout Page  │     │  (success)  │
//! └──────┬──────┘     └────────┬────────┘     └─────────────┘
//!        │                     │ checkout.session.completed
//!        ▼                     ▼
//! ┌─────────────┐     ┌─────────────────┐     ┌─────────────┐
//! │  Session    │     │    Webhook      │────▶│  Notifier   │──▶ Resend
//! │  Creator    │     │    Receiver     │     │             │
//! └─────────────┘     └─────────────────┘     └─────────────┘
//! ```
//!
//! Nothing is stored locally except idempotency records. The product id
//! travels in session metadata, which is how a completed payment is
//! attributed.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use checkout_payments::{CheckoutRequest, SessionCreator, Settings, StripeGateway};
//!
//! let settings = Settings::from_env()?;
//! let creator = SessionCreator::from_settings(
//!     Arc::new(StripeGateway::from_settings(&settings)),
//!     &settings,
//! );
//!
//! let session = creator.create(&CheckoutRequest {
//!     product_id: "with_upsell".into(),
//!     ..Default::default()
//! }).await?;
//!
//! // Redirect user to: session.checkout_url
//! ```

mod catalog;
mod checkout;
mod config;
mod email;
mod error;
mod notify;
mod store;
mod webhook;

pub use catalog::{format_amount, Product, DEFAULT_PRODUCT_ID};
pub use checkout::{
    CheckoutRequest, CheckoutSession, CreatedSession, LineItem, PaymentGateway, SessionCreator,
    SessionParams, StripeGateway, SESSION_ID_PLACEHOLDER,
};
pub use config::Settings;
pub use email::{EmailMessage, Mailer, MemoryMailer, ResendMailer};
pub use error::{CheckoutError, Result};
pub use notify::Notifier;
pub use store::{
    CachedSession, EventLedger, MemoryEventLedger, MemorySessionCache, SessionCache,
};
pub use webhook::{
    CompletedCheckout, Event, SignatureVerifier, WebhookEvent, WebhookReceipt, WebhookReceiver,
    SIGNATURE_HEADER,
};
