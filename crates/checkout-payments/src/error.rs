//! Checkout Error Types

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, CheckoutError>;

/// Checkout-related errors
#[derive(Error, Debug)]
pub enum CheckoutError {
    /// Method not accepted
    #[error("Validation error: {0}")]
    Validation(String),

    /// Session-creation body unreadable, or an idempotency key reused with other parameters
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Webhook signature verification failed
    #[error("Webhook signature invalid: {0}")]
    Signature(String),

    /// Webhook body could not be decoded
    #[error("Webhook payload invalid: {0}")]
    Payload(String),

    /// Stripe rejected the request
    #[error("Stripe error: {0}")]
    Provider(String),

    /// Email provider rejected the request
    #[error("Email error: {0}")]
    Email(String),

    /// Missing or malformed configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// In-memory store unavailable
    #[error("Storage error: {0}")]
    Storage(String),
}

impl CheckoutError {
    /// HTTP status the hosting adapters answer with
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::Validation(_) => 405,
            Self::InvalidRequest(_) | Self::Signature(_) | Self::Payload(_) => 400,
            Self::Provider(_) | Self::Email(_) | Self::Config(_) | Self::Storage(_) => 500,
        }
    }

    /// Get user-friendly message
    pub const fn user_message(&self) -> &str {
        match self {
            Self::Validation(_) => "Method not allowed",
            Self::InvalidRequest(_) => "Invalid checkout request",
            Self::Signature(_) | Self::Payload(_) => "Webhook could not be verified.",
            Self::Provider(_) => "Failed to create checkout session",
            Self::Email(_) => "Notification delivery failed.",
            Self::Config(_) => "Service configuration error.",
            Self::Storage(_) => "An error occurred processing your request.",
        }
    }
}
