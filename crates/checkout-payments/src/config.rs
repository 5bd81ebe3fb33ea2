//! Runtime Configuration
//!
//! All provider credentials and URLs are read once at startup. Missing
//! required values are a startup failure, not a per-request 500.

use crate::error::{CheckoutError, Result};

const DEFAULT_FOLLOWUP_FORM_URL: &str = "https://tally.so/your-form";
const DEFAULT_EMAIL_FROM: &str = "service@yourwebsite.com";

/// Checkout settings
#[derive(Clone, Debug)]
pub struct Settings {
    /// Stripe secret API key
    pub stripe_secret_key: String,

    /// Stripe webhook signing secret (`whsec_...`)
    pub webhook_secret: String,

    /// Resend API key
    pub resend_api_key: String,

    /// Public site origin, used for default redirect URLs
    pub frontend_url: String,

    /// Recipient of purchase alerts
    pub admin_email: String,

    /// Intake form linked from the customer confirmation
    pub followup_form_url: String,

    /// Sender address for all outbound mail
    pub email_from: String,
}

impl Settings {
    /// Load from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let require = |key: &str| {
            get(key).ok_or_else(|| CheckoutError::Config(format!("{key} not set")))
        };

        let frontend_url = require("FRONTEND_URL")?;

        Ok(Self {
            stripe_secret_key: require("STRIPE_SECRET_KEY")?,
            webhook_secret: require("STRIPE_WEBHOOK_SECRET")?,
            resend_api_key: require("RESEND_API_KEY")?,
            frontend_url: frontend_url.trim_end_matches('/').to_string(),
            admin_email: require("ADMIN_EMAIL")?,
            followup_form_url: get("FOLLOWUP_FORM_URL")
                .or_else(|| get("TALLY_FORM_URL"))
                .unwrap_or_else(|| DEFAULT_FOLLOWUP_FORM_URL.into()),
            email_from: get("EMAIL_FROM").unwrap_or_else(|| DEFAULT_EMAIL_FROM.into()),
        })
    }

    /// Redirect target after a successful payment
    pub fn default_success_url(&self) -> String {
        format!(
            "{}/success.html?session_id={}",
            self.frontend_url,
            crate::checkout::SESSION_ID_PLACEHOLDER
        )
    }

    /// Redirect target when the customer abandons checkout
    pub fn default_cancel_url(&self) -> String {
        format!("{}/cancel.html", self.frontend_url)
    }
}
