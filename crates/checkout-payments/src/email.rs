//! Email Delivery
//!
//! `Mailer` abstracts the email provider. `ResendMailer` talks to the
//! Resend HTTP API; `MemoryMailer` keeps messages in memory.

use std::sync::RwLock;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::Settings;
use crate::error::{CheckoutError, Result};

const RESEND_API_URL: &str = "https://api.resend.com/emails";

/// An outbound HTML email
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailMessage {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub html: String,
}

/// Email provider seam
#[async_trait]
pub trait Mailer: Send + Sync {
    /// Send one message. Returns the provider's message id when it gives one.
    async fn send(&self, message: &EmailMessage) -> Result<Option<String>>;
}

#[derive(Deserialize)]
struct ResendResponse {
    id: Option<String>,
}

/// Resend API mailer
pub struct ResendMailer {
    http: reqwest::Client,
    api_key: String,
    endpoint: String,
}

impl ResendMailer {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key: api_key.into(),
            endpoint: RESEND_API_URL.into(),
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(settings.resend_api_key.clone())
    }

    /// Send to a different endpoint than the public Resend API
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

#[async_trait]
impl Mailer for ResendMailer {
    async fn send(&self, message: &EmailMessage) -> Result<Option<String>> {
        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(message)
            .send()
            .await
            .map_err(|e| CheckoutError::Email(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CheckoutError::Email(format!("{status}: {body}")));
        }

        let parsed: ResendResponse = response
            .json()
            .await
            .map_err(|e| CheckoutError::Email(e.to_string()))?;

        tracing::debug!(to = %message.to, id = ?parsed.id, "Email accepted");
        Ok(parsed.id)
    }
}

/// In-memory mailer that records every message
#[derive(Default)]
pub struct MemoryMailer {
    sent: RwLock<Vec<EmailMessage>>,
}

impl MemoryMailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages sent so far
    pub fn sent(&self) -> Vec<EmailMessage> {
        self.sent.read().map(|s| s.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Mailer for MemoryMailer {
    async fn send(&self, message: &EmailMessage) -> Result<Option<String>> {
        let mut sent = self
            .sent
            .write()
            .map_err(|_| CheckoutError::Storage("lock poisoned".into()))?;
        sent.push(message.clone());
        Ok(Some(format!("mem_{}", sent.len())))
    }
}
