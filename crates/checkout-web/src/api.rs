//! API Client

use serde::{Deserialize, Serialize};

/// Session-creation endpoint, relative to the page origin
pub const CHECKOUT_ENDPOINT: &str = "/api/create-checkout-session";

/// Token Stripe replaces with the session id when redirecting back
pub const SESSION_ID_PLACEHOLDER: &str = "{CHECKOUT_SESSION_ID}";

/// Body of a session-creation request
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutBody {
    pub product_id: String,
    pub success_url: String,
    pub cancel_url: String,
    pub idempotency_key: String,
}

impl CheckoutBody {
    pub fn new(origin: &str, product_id: &str, idempotency_key: &str) -> Self {
        Self {
            product_id: product_id.into(),
            success_url: format!("{origin}/success.html?session_id={SESSION_ID_PLACEHOLDER}"),
            cancel_url: format!("{origin}/cancel.html"),
            idempotency_key: idempotency_key.into(),
        }
    }
}

/// Either `{url}` or `{error, details}`
#[derive(Debug, Default, Deserialize)]
pub struct CheckoutReply {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl CheckoutReply {
    /// The redirect target, or why there is none
    pub fn redirect_url(self) -> Result<String, String> {
        match self.url.filter(|u| !u.is_empty()) {
            Some(url) => Ok(url),
            None => Err(self
                .error
                .unwrap_or_else(|| "No checkout URL received".into())),
        }
    }
}

/// Origin of the current page
pub fn origin() -> String {
    web_sys::window()
        .and_then(|w| w.location().origin().ok())
        .unwrap_or_else(|| "http://localhost:3000".into())
}

/// Create a Stripe checkout session and return the hosted page URL
pub async fn create_checkout(product_id: &str, idempotency_key: &str) -> Result<String, String> {
    let origin = origin();
    let body = CheckoutBody::new(&origin, product_id, idempotency_key);

    let response = reqwest::Client::new()
        .post(format!("{origin}{CHECKOUT_ENDPOINT}"))
        .json(&body)
        .send()
        .await
        .map_err(|e| e.to_string())?;

    let reply: CheckoutReply = response.json().await.map_err(|e| e.to_string())?;
    reply.redirect_url()
}
