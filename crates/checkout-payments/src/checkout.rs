//! Stripe Checkout Integration
//!
//! Creates hosted checkout sessions for a single catalog product.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use stripe::{
    CheckoutSession as StripeCheckoutSession, CheckoutSessionMode, Client,
    CreateCheckoutSession, CreateCheckoutSessionLineItems,
    CreateCheckoutSessionLineItemsPriceData,
    CreateCheckoutSessionLineItemsPriceDataProductData,
    CreateCheckoutSessionPaymentMethodTypes, Currency, RequestStrategy,
};

use crate::catalog::Product;
use crate::config::Settings;
use crate::error::{CheckoutError, Result};
use crate::store::{CachedSession, MemorySessionCache, SessionCache};

/// Token Stripe substitutes with the session id on redirect
pub const SESSION_ID_PLACEHOLDER: &str = "{CHECKOUT_SESSION_ID}";

/// Metadata key linking a session back to its product
pub const PRODUCT_ID_METADATA_KEY: &str = "productId";

/// Metadata key carrying the email the customer entered on our page
pub const CUSTOMER_EMAIL_METADATA_KEY: &str = "customerEmail";

/// Request to create a checkout session
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    /// Catalog product id; unknown ids fall back to the default product
    #[serde(default)]
    pub product_id: String,

    #[serde(default)]
    pub customer_email: Option<String>,

    /// Overrides the configured success redirect
    #[serde(default)]
    pub success_url: Option<String>,

    /// Overrides the configured cancel redirect
    #[serde(default)]
    pub cancel_url: Option<String>,

    /// Client token making repeated submissions return the same session
    #[serde(default)]
    pub idempotency_key: Option<String>,
}

/// Result of creating a checkout session
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutSession {
    /// Stripe session ID
    pub id: String,

    /// URL to redirect user to
    pub checkout_url: String,

    /// Product the session was created for
    pub product_id: String,

    pub customer_email: Option<String>,
}

/// One line of a checkout session
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LineItem {
    pub product: &'static Product,
    pub quantity: u64,
}

/// Everything the payment provider needs to open a session
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionParams {
    pub line_items: Vec<LineItem>,
    pub customer_email: Option<String>,
    pub success_url: String,
    pub cancel_url: String,
    pub metadata: HashMap<String, String>,
    pub idempotency_key: Option<String>,
}

/// Session as returned by the provider
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CreatedSession {
    pub id: String,
    pub url: Option<String>,
}

impl SessionParams {
    /// Identity of the session these parameters describe
    ///
    /// Two requests sharing an idempotency key must agree on this value.
    pub fn fingerprint(&self) -> String {
        let products: Vec<&str> = self.line_items.iter().map(|i| i.product.id).collect();
        [
            products.join(","),
            self.customer_email.clone().unwrap_or_default(),
            self.success_url.clone(),
            self.cancel_url.clone(),
        ]
        .join("\n")
    }
}

/// Payment provider seam
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Create a hosted checkout session
    async fn create_session(&self, params: &SessionParams) -> Result<CreatedSession>;
}

/// Stripe-backed payment gateway
pub struct StripeGateway {
    client: Client,
}

impl StripeGateway {
    /// Create a new Stripe gateway
    pub fn new(secret_key: &str) -> Self {
        Self {
            client: Client::new(secret_key),
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(&settings.stripe_secret_key)
    }
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    async fn create_session(&self, params: &SessionParams) -> Result<CreatedSession> {
        let mut create = CreateCheckoutSession::new();
        create.mode = Some(CheckoutSessionMode::Payment);
        create.payment_method_types = Some(vec![CreateCheckoutSessionPaymentMethodTypes::Card]);
        create.success_url = Some(&params.success_url);
        create.cancel_url = Some(&params.cancel_url);
        create.customer_email = params.customer_email.as_deref();
        create.metadata = Some(params.metadata.clone());

        create.line_items = Some(
            params
                .line_items
                .iter()
                .map(|item| CreateCheckoutSessionLineItems {
                    quantity: Some(item.quantity),
                    price_data: Some(CreateCheckoutSessionLineItemsPriceData {
                        currency: Currency::USD,
                        unit_amount: Some(item.product.unit_amount),
                        product_data: Some(CreateCheckoutSessionLineItemsPriceDataProductData {
                            name: item.product.name.to_string(),
                            description: Some(item.product.description.to_string()),
                            images: Some(vec![item.product.image_url.to_string()]),
                            ..Default::default()
                        }),
                        ..Default::default()
                    }),
                    ..Default::default()
                })
                .collect(),
        );

        let client = match &params.idempotency_key {
            Some(key) => self
                .client
                .clone()
                .with_strategy(RequestStrategy::Idempotent(key.clone())),
            None => self.client.clone(),
        };

        let session = StripeCheckoutSession::create(&client, create)
            .await
            .map_err(|e| CheckoutError::Provider(e.to_string()))?;

        Ok(CreatedSession {
            id: session.id.to_string(),
            url: session.url,
        })
    }
}

/// Maps a product selection to a hosted checkout session
pub struct SessionCreator {
    gateway: Arc<dyn PaymentGateway>,
    cache: Arc<dyn SessionCache>,
    success_url: String,
    cancel_url: String,
}

impl SessionCreator {
    pub fn new(
        gateway: Arc<dyn PaymentGateway>,
        success_url: impl Into<String>,
        cancel_url: impl Into<String>,
    ) -> Self {
        Self {
            gateway,
            cache: Arc::new(MemorySessionCache::new()),
            success_url: success_url.into(),
            cancel_url: cancel_url.into(),
        }
    }

    /// Create with redirect defaults taken from settings
    pub fn from_settings(gateway: Arc<dyn PaymentGateway>, settings: &Settings) -> Self {
        Self::new(
            gateway,
            settings.default_success_url(),
            settings.default_cancel_url(),
        )
    }

    /// Replace the idempotency cache
    #[must_use]
    pub fn with_cache(mut self, cache: Arc<dyn SessionCache>) -> Self {
        self.cache = cache;
        self
    }

    /// Build provider parameters for a request
    pub fn session_params(&self, request: &CheckoutRequest) -> SessionParams {
        if !Product::is_known(&request.product_id) {
            tracing::warn!(
                product_id = %request.product_id,
                "Unknown product, using default"
            );
        }
        let product = Product::lookup(&request.product_id);

        let customer_email = non_empty(request.customer_email.as_deref());

        let mut metadata = HashMap::new();
        metadata.insert(PRODUCT_ID_METADATA_KEY.to_string(), product.id.to_string());
        if let Some(ref email) = customer_email {
            metadata.insert(CUSTOMER_EMAIL_METADATA_KEY.to_string(), email.clone());
        }

        let success_url = non_empty(request.success_url.as_deref())
            .unwrap_or_else(|| self.success_url.clone());
        if !success_url.contains(SESSION_ID_PLACEHOLDER) {
            tracing::warn!(%success_url, "Success URL has no session id placeholder");
        }

        SessionParams {
            line_items: vec![LineItem {
                product,
                quantity: 1,
            }],
            customer_email,
            success_url,
            cancel_url: non_empty(request.cancel_url.as_deref())
                .unwrap_or_else(|| self.cancel_url.clone()),
            metadata,
            idempotency_key: non_empty(request.idempotency_key.as_deref()),
        }
    }

    /// Create a Stripe Checkout session
    ///
    /// Returns a URL to redirect the user to Stripe's hosted checkout page.
    ///
    /// A repeated idempotency key returns the session it created first, as
    /// long as the product, email and redirects match. Reusing a key for
    /// anything else is rejected, the same way Stripe rejects it.
    pub async fn create(&self, request: &CheckoutRequest) -> Result<CheckoutSession> {
        let params = self.session_params(request);
        let fingerprint = params.fingerprint();

        if let Some(ref key) = params.idempotency_key {
            if let Some(cached) = self.cache.get(key)? {
                if cached.fingerprint != fingerprint {
                    tracing::warn!(
                        idempotency_key = %key,
                        cached_product = %cached.session.product_id,
                        "Idempotency key reused with different parameters"
                    );
                    return Err(CheckoutError::InvalidRequest(format!(
                        "idempotency key {key} was already used for a different checkout"
                    )));
                }
                tracing::debug!(session_id = %cached.session.id, "Reusing checkout session");
                return Ok(cached.session);
            }
        }

        let created = self.gateway.create_session(&params).await?;

        let checkout_url = created
            .url
            .ok_or_else(|| CheckoutError::Provider("No checkout URL returned".into()))?;

        let session = CheckoutSession {
            id: created.id,
            checkout_url,
            product_id: params.line_items[0].product.id.to_string(),
            customer_email: params.customer_email,
        };

        if let Some(ref key) = params.idempotency_key {
            self.cache.put(
                key,
                &CachedSession {
                    fingerprint,
                    session: session.clone(),
                },
            )?;
        }

        tracing::info!(
            session_id = %session.id,
            product_id = %session.product_id,
            "Created checkout session"
        );

        Ok(session)
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(ToString::to_string)
}
