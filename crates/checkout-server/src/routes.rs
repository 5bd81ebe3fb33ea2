//! Hosting Adapters
//!
//! The same two endpoints are exposed in two shapes:
//!
//! - **server**: long-running process with static pages, both bare and
//!   `/api`-prefixed endpoint paths, and a CORS layer.
//! - **function**: serverless-style, only `/api/create-checkout-session` and
//!   `/api/webhook`, with the CORS headers written per response.

use std::convert::Infallible;
use std::path::Path;
use std::str::FromStr;

use axum::{
    http::{header, HeaderName, HeaderValue, Method},
    middleware::map_response,
    response::Response,
    routing::{get, post, MethodRouter},
    Router,
};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    services::{ServeDir, ServeFile},
    trace::TraceLayer,
};

use crate::handlers::{
    create_checkout_session, health_check, method_not_allowed, preflight, stripe_webhook,
};
use crate::state::AppState;

const ALLOWED_METHODS: &str = "GET,OPTIONS,PATCH,DELETE,POST,PUT";
const ALLOWED_HEADERS: &str = "X-CSRF-Token, X-Requested-With, Accept, Accept-Version, \
     Content-Length, Content-MD5, Content-Type, Date, X-Api-Version";

/// Logical page name to HTML file
pub const PAGES: [(&str, &str); 8] = [
    ("/", "index.html"),
    ("/services", "services.html"),
    ("/consultation", "consultation.html"),
    ("/assessment", "assessment.html"),
    ("/samples", "samples.html"),
    ("/payment", "payment.html"),
    ("/success", "success.html"),
    ("/cancel", "cancel.html"),
];

/// How the endpoints are hosted
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HostingMode {
    Server,
    Function,
}

/// Anything unrecognised means the long-running server
impl FromStr for HostingMode {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_lowercase().as_str() {
            "function" | "serverless" => Self::Function,
            _ => Self::Server,
        })
    }
}

impl HostingMode {
    pub fn from_env() -> Self {
        std::env::var("HOSTING_MODE")
            .ok()
            .and_then(|m| m.parse().ok())
            .unwrap_or(Self::Server)
    }
}

fn checkout_route() -> MethodRouter<AppState> {
    post(create_checkout_session)
        .options(preflight)
        .fallback(method_not_allowed)
}

fn webhook_route() -> MethodRouter<AppState> {
    post(stripe_webhook).fallback(method_not_allowed)
}

fn cors_layer() -> CorsLayer {
    let methods = ALLOWED_METHODS
        .split(',')
        .filter_map(|m| Method::from_bytes(m.as_bytes()).ok())
        .collect::<Vec<_>>();
    let headers = ALLOWED_HEADERS
        .split(',')
        .filter_map(|h| HeaderName::from_bytes(h.trim().to_lowercase().as_bytes()).ok())
        .collect::<Vec<_>>();

    // Credentials rule out a literal `*`, so the origin is mirrored
    CorsLayer::new()
        .allow_origin(AllowOrigin::mirror_request())
        .allow_credentials(true)
        .allow_methods(methods)
        .allow_headers(headers)
}

async fn function_cors_headers(mut response: Response) -> Response {
    let headers = response.headers_mut();
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_CREDENTIALS,
        HeaderValue::from_static("true"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static(ALLOWED_METHODS),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static(ALLOWED_HEADERS),
    );
    response
}

/// Long-running server: API endpoints plus static pages
pub fn server_router(state: AppState, static_dir: &Path) -> Router {
    let mut router = Router::new()
        .route("/health", get(health_check))
        .route("/create-checkout-session", checkout_route())
        .route("/api/create-checkout-session", checkout_route())
        .route("/webhook", webhook_route())
        .route("/api/webhook", webhook_route());

    for (path, file) in PAGES {
        router = router.route_service(path, ServeFile::new(static_dir.join(file)));
    }

    router
        .fallback_service(ServeDir::new(static_dir))
        .layer(cors_layer())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serverless-style function endpoints
pub fn function_router(state: AppState) -> Router {
    Router::new()
        .route(
            "/api/create-checkout-session",
            checkout_route().layer(map_response(function_cors_headers)),
        )
        .route("/api/webhook", webhook_route())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use std::time::{SystemTime, UNIX_EPOCH};

    use async_trait::async_trait;
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
    };
    use checkout_payments::{
        CheckoutError, CreatedSession, EmailMessage, Mailer, MemoryMailer, Notifier,
        PaymentGateway, Result, SessionCreator, SessionParams, SignatureVerifier,
        WebhookReceiver,
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    const SECRET: &str = "whsec_router_test";

    #[derive(Default)]
    struct FakeGateway {
        calls: Mutex<Vec<SessionParams>>,
        reject: bool,
    }

    #[async_trait]
    impl PaymentGateway for FakeGateway {
        async fn create_session(&self, params: &SessionParams) -> Result<CreatedSession> {
            if self.reject {
                return Err(CheckoutError::Provider("Invalid API Key provided".into()));
            }
            let mut calls = self.calls.lock().unwrap();
            calls.push(params.clone());
            let id = format!("cs_test_{}", calls.len());
            Ok(CreatedSession {
                url: Some(format!("https://checkout.stripe.com/c/pay/{id}")),
                id,
            })
        }
    }

    struct FailingMailer;

    #[async_trait]
    impl Mailer for FailingMailer {
        async fn send(&self, _message: &EmailMessage) -> Result<Option<String>> {
            Err(CheckoutError::Email("resend unavailable".into()))
        }
    }

    fn state(gateway: Arc<FakeGateway>, mailer: Arc<dyn Mailer>) -> AppState {
        AppState::new(
            SessionCreator::new(
                gateway,
                "https://shop.example.com/success.html?session_id={CHECKOUT_SESSION_ID}",
                "https://shop.example.com/cancel.html",
            ),
            WebhookReceiver::new(
                SignatureVerifier::new(SECRET),
                Notifier::new(mailer, "service@yourwebsite.com", "admin@example.com", "https://tally.so/r/x"),
            ),
        )
    }

    fn now() -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| i64::try_from(d.as_secs()).unwrap())
            .unwrap()
    }

    fn checkout_post(path: &str, body: &Value) -> Request<Body> {
        Request::builder()
            .method(Method::POST)
            .uri(path)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn webhook_post(path: &str, payload: &[u8], signature: Option<String>) -> Request<Body> {
        let mut builder = Request::builder().method(Method::POST).uri(path);
        if let Some(sig) = signature {
            builder = builder.header("stripe-signature", sig);
        }
        builder.body(Body::from(payload.to_vec())).unwrap()
    }

    fn completed_event(product_id: &str, amount: i64, email: Option<&str>) -> Vec<u8> {
        json!({
            "id": "evt_test_1",
            "type": "checkout.session.completed",
            "data": { "object": {
                "id": "cs_test_1",
                "customer_email": email,
                "amount_total": amount,
                "payment_intent": "pi_test_1",
                "metadata": { "productId": product_id }
            }}
        })
        .to_string()
        .into_bytes()
    }

    async fn body_json(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn body_text(response: Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_create_session_returns_url() {
        let gateway = Arc::new(FakeGateway::default());
        let app = server_router(state(gateway.clone(), Arc::new(MemoryMailer::new())), Path::new("static"));

        let response = app
            .oneshot(checkout_post("/create-checkout-session", &json!({"productId": "with_upsell"})))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["url"], "https://checkout.stripe.com/c/pay/cs_test_1");

        let calls = gateway.calls.lock().unwrap();
        assert_eq!(calls[0].line_items[0].product.unit_amount, 29600);
    }

    #[tokio::test]
    async fn test_checkout_without_content_type_uses_default_product() {
        let gateway = Arc::new(FakeGateway::default());
        let app = function_router(state(gateway.clone(), Arc::new(MemoryMailer::new())));

        for body in ["{}", ""] {
            let response = app
                .clone()
                .oneshot(
                    Request::builder()
                        .method(Method::POST)
                        .uri("/api/create-checkout-session")
                        .body(Body::from(body))
                        .unwrap(),
                )
                .await
                .unwrap();

            assert_eq!(response.status(), StatusCode::OK, "body {body:?}");
            assert!(body_json(response).await["url"].is_string());
        }

        let calls = gateway.calls.lock().unwrap();
        assert_eq!(calls.len(), 2);
        assert!(calls.iter().all(|c| c.metadata["productId"] == "basic_service"));
    }

    #[tokio::test]
    async fn test_malformed_body_is_json_error() {
        let gateway = Arc::new(FakeGateway::default());
        let app = server_router(state(gateway.clone(), Arc::new(MemoryMailer::new())), Path::new("static"));

        let response = app
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri("/create-checkout-session")
                    .header(header::CONTENT_TYPE, "text/plain")
                    .body(Body::from("{\"productId\": "))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["error"], "Invalid checkout request");
        assert!(body["details"].is_string());
        assert!(gateway.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_reused_key_for_other_product_is_rejected() {
        let gateway = Arc::new(FakeGateway::default());
        let app = function_router(state(gateway.clone(), Arc::new(MemoryMailer::new())));

        let first = app
            .clone()
            .oneshot(checkout_post(
                "/api/create-checkout-session",
                &json!({"productId": "basic_service", "idempotencyKey": "tab-1"}),
            ))
            .await
            .unwrap();
        assert_eq!(first.status(), StatusCode::OK);

        let second = app
            .oneshot(checkout_post(
                "/api/create-checkout-session",
                &json!({"productId": "with_upsell", "idempotencyKey": "tab-1"}),
            ))
            .await
            .unwrap();
        assert_eq!(second.status(), StatusCode::BAD_REQUEST);
        assert!(body_json(second).await["details"].as_str().unwrap().contains("tab-1"));
        assert_eq!(gateway.calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_provider_error_is_500() {
        let gateway = Arc::new(FakeGateway {
            reject: true,
            ..Default::default()
        });
        let app = server_router(state(gateway, Arc::new(MemoryMailer::new())), Path::new("static"));

        let response = app
            .oneshot(checkout_post("/api/create-checkout-session", &json!({"productId": "basic_service"})))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        assert_eq!(body["error"], "Failed to create checkout session");
        assert!(body["details"].as_str().unwrap().contains("Invalid API Key"));
    }

    #[tokio::test]
    async fn test_preflight_and_wrong_method() {
        let app = function_router(state(Arc::default(), Arc::new(MemoryMailer::new())));

        let preflight = app
            .clone()
            .oneshot(
                Request::builder()
                    .method(Method::OPTIONS)
                    .uri("/api/create-checkout-session")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(preflight.status(), StatusCode::OK);
        assert_eq!(
            preflight.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
            "*"
        );
        assert!(body_text(preflight).await.is_empty());

        let get = app
            .oneshot(
                Request::builder()
                    .method(Method::GET)
                    .uri("/api/webhook")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(get.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(body_json(get).await["error"], "Method not allowed");
    }

    #[tokio::test]
    async fn test_server_wrong_method_is_405_json() {
        let app = server_router(state(Arc::default(), Arc::new(MemoryMailer::new())), Path::new("static"));

        for method in [Method::GET, Method::DELETE] {
            let response = app
                .clone()
                .oneshot(
                    Request::builder()
                        .method(method.clone())
                        .uri("/create-checkout-session")
                        .body(Body::empty())
                        .unwrap(),
                )
                .await
                .unwrap();

            assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED, "{method}");
            assert_eq!(body_json(response).await, json!({"error": "Method not allowed"}));
        }
    }

    #[tokio::test]
    async fn test_server_cors_mirrors_origin() {
        let app = server_router(state(Arc::default(), Arc::new(MemoryMailer::new())), Path::new("static"));

        let response = app
            .oneshot(
                Request::builder()
                    .method(Method::OPTIONS)
                    .uri("/create-checkout-session")
                    .header(header::ORIGIN, "https://shop.example.com")
                    .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let headers = response.headers();
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "https://shop.example.com");
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_CREDENTIALS], "true");
    }

    #[tokio::test]
    async fn test_bad_signature_is_400_without_emails() {
        let mailer = Arc::new(MemoryMailer::new());
        let app = server_router(state(Arc::default(), mailer.clone()), Path::new("static"));
        let payload = completed_event("with_upsell", 29600, Some("buyer@example.com"));
        let forged = SignatureVerifier::new("whsec_attacker").sign(&payload, now()).unwrap();

        let response = app
            .clone()
            .oneshot(webhook_post("/webhook", &payload, Some(forged)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(body_text(response).await.starts_with("Webhook Error:"));

        let missing = app
            .oneshot(webhook_post("/webhook", &payload, None))
            .await
            .unwrap();
        assert_eq!(missing.status(), StatusCode::BAD_REQUEST);

        assert!(mailer.sent().is_empty());
    }

    #[tokio::test]
    async fn test_webhook_acknowledges_when_email_fails() {
        let app = server_router(state(Arc::default(), Arc::new(FailingMailer)), Path::new("static"));
        let payload = completed_event("basic_service", 24700, Some("buyer@example.com"));
        let signature = SignatureVerifier::new(SECRET).sign(&payload, now()).unwrap();

        let response = app
            .oneshot(webhook_post("/webhook", &payload, Some(signature)))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, json!({"received": true}));
    }

    #[tokio::test]
    async fn test_checkout_to_admin_notification() {
        let gateway = Arc::new(FakeGateway::default());
        let mailer = Arc::new(MemoryMailer::new());
        let app = function_router(state(gateway.clone(), mailer.clone()));

        let response = app
            .clone()
            .oneshot(checkout_post("/api/create-checkout-session", &json!({"productId": "with_upsell"})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_json(response).await["url"].is_string());

        // Stripe echoes the metadata it was given back in the event
        let product_id = gateway.calls.lock().unwrap()[0].metadata["productId"].clone();
        let payload = completed_event(&product_id, 29600, None);
        let signature = SignatureVerifier::new(SECRET).sign(&payload, now()).unwrap();

        let response = app
            .oneshot(webhook_post("/api/webhook", &payload, Some(signature)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let sent = mailer.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "admin@example.com");
        assert!(sent[0].html.contains("296.00"));
        assert!(sent[0].html.contains("with_upsell"));
    }

    #[tokio::test]
    async fn test_page_routes_serve_html() {
        let dir = std::env::temp_dir().join(format!("checkout-pages-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("services.html"), "<h1>Services</h1>").unwrap();

        let app = server_router(state(Arc::default(), Arc::new(MemoryMailer::new())), &dir);
        let response = app
            .oneshot(Request::builder().uri("/services").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "<h1>Services</h1>");

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_hosting_mode() {
        assert_eq!("function".parse::<HostingMode>(), Ok(HostingMode::Function));
        assert_eq!(" Serverless ".parse::<HostingMode>(), Ok(HostingMode::Function));
        assert_eq!("server".parse::<HostingMode>(), Ok(HostingMode::Server));
        assert_eq!("".parse::<HostingMode>(), Ok(HostingMode::Server));
    }
}
