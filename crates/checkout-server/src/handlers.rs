//! HTTP Handlers

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, Method, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use checkout_payments::{CheckoutError, CheckoutRequest, SIGNATURE_HEADER};

use crate::state::AppState;

// ============================================================================
// Response Types
// ============================================================================

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

#[derive(Debug, Serialize)]
pub struct CheckoutResponse {
    pub url: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct WebhookAck {
    pub received: bool,
}

fn status_of(err: &CheckoutError) -> StatusCode {
    StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

fn error_reply(err: &CheckoutError, details: Option<String>) -> (StatusCode, Json<ErrorResponse>) {
    (
        status_of(err),
        Json(ErrorResponse {
            error: err.user_message().into(),
            details,
        }),
    )
}

/// Decode a session-creation body whatever its content type.
///
/// An empty body is the default request.
fn parse_checkout_request(body: &[u8]) -> Result<CheckoutRequest, CheckoutError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(CheckoutRequest::default());
    }
    serde_json::from_slice(body).map_err(|e| CheckoutError::InvalidRequest(e.to_string()))
}

// ============================================================================
// Handlers
// ============================================================================

/// Health check endpoint
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// CORS preflight
pub async fn preflight() -> StatusCode {
    StatusCode::OK
}

/// Any method a route does not serve
pub async fn method_not_allowed(method: Method) -> (StatusCode, Json<ErrorResponse>) {
    let err = CheckoutError::Validation(format!("{method} is not served here"));
    tracing::warn!(%method, error = %err, "Rejected request method");
    error_reply(&err, None)
}

/// Create Stripe checkout session
///
/// The body is read as JSON regardless of `Content-Type`, so plain
/// `fetch` calls without headers still work.
pub async fn create_checkout_session(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<CheckoutResponse>, (StatusCode, Json<ErrorResponse>)> {
    let payload = parse_checkout_request(&body).map_err(|e| {
        tracing::warn!(error = %e, "Unreadable checkout request body");
        error_reply(&e, Some(e.to_string()))
    })?;

    let session = state.creator.create(&payload).await.map_err(|e| {
        tracing::error!(product_id = %payload.product_id, error = %e, "Stripe session error");
        error_reply(&e, Some(e.to_string()))
    })?;

    Ok(Json(CheckoutResponse {
        url: session.checkout_url,
    }))
}

/// Stripe webhook handler
///
/// Takes the body as raw bytes; the signature covers the exact payload.
pub async fn stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok());

    match state.receiver.receive(&body, signature).await {
        Ok(receipt) => {
            tracing::debug!(
                event_id = %receipt.event_id,
                duplicate = receipt.duplicate,
                emails_sent = receipt.emails_sent,
                "Webhook acknowledged"
            );
            (StatusCode::OK, Json(WebhookAck { received: true })).into_response()
        }
        Err(e) => {
            tracing::warn!(error = %e, "Webhook signature verification failed");
            (status_of(&e), format!("Webhook Error: {e}")).into_response()
        }
    }
}
