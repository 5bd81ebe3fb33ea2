//! Application State

use std::sync::Arc;

use checkout_payments::{
    Notifier, ResendMailer, SessionCreator, Settings, SignatureVerifier, StripeGateway,
    WebhookReceiver,
};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Creates hosted checkout sessions
    pub creator: Arc<SessionCreator>,

    /// Verifies and processes Stripe deliveries
    pub receiver: Arc<WebhookReceiver>,
}

impl AppState {
    pub fn new(creator: SessionCreator, receiver: WebhookReceiver) -> Self {
        Self {
            creator: Arc::new(creator),
            receiver: Arc::new(receiver),
        }
    }

    /// Wire the production Stripe and Resend clients
    pub fn from_settings(settings: &Settings) -> Self {
        let gateway = Arc::new(StripeGateway::from_settings(settings));
        let mailer = Arc::new(ResendMailer::from_settings(settings));

        Self::new(
            SessionCreator::from_settings(gateway, settings),
            WebhookReceiver::new(
                SignatureVerifier::new(settings.webhook_secret.clone()),
                Notifier::from_settings(mailer, settings),
            ),
        )
    }
}
