//! Assessment checkout HTTP server
//!
//! Axum-based host for the checkout-session and Stripe webhook endpoints.
//! `HOSTING_MODE=server` (default) also serves the static site;
//! `HOSTING_MODE=function` exposes only the two `/api` endpoints.

mod handlers;
mod routes;
mod state;

use std::path::PathBuf;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use checkout_payments::Settings;

use crate::routes::{function_router, server_router, HostingMode, PAGES};
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Missing credentials stop startup here, not on the first request
    let settings = Settings::from_env().inspect_err(|e| {
        tracing::error!("{}", e);
        tracing::error!("  Set STRIPE_SECRET_KEY, STRIPE_WEBHOOK_SECRET, RESEND_API_KEY, FRONTEND_URL and ADMIN_EMAIL in .env");
    })?;

    tracing::info!("✓ Stripe configured");
    tracing::info!("✓ Resend configured");
    tracing::info!("  Admin notifications: {}", settings.admin_email);

    let state = AppState::from_settings(&settings);
    let mode = HostingMode::from_env();

    let app = match mode {
        HostingMode::Server => {
            let static_dir =
                PathBuf::from(std::env::var("STATIC_DIR").unwrap_or_else(|_| "static".into()));
            tracing::info!("Serving pages from {}", static_dir.display());
            server_router(state, &static_dir)
        }
        HostingMode::Function => function_router(state),
    };

    // Start server
    let addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("🚀 checkout server running on http://{} ({:?})", addr, mode);
    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("Frontend: {}", settings.frontend_url);
    tracing::info!("");
    tracing::info!("Endpoints:");
    match mode {
        HostingMode::Server => {
            tracing::info!("  GET  /health                  - Health check");
            tracing::info!("  POST /create-checkout-session - Create Stripe checkout");
            tracing::info!("  POST /webhook                 - Stripe webhook");
            for (path, file) in PAGES {
                tracing::info!("  GET  {:<28}- {}", path, file);
            }
        }
        HostingMode::Function => {
            tracing::info!("  POST /api/create-checkout-session - Create Stripe checkout");
            tracing::info!("  POST /api/webhook                 - Stripe webhook");
        }
    }
    tracing::info!("");

    axum::serve(listener, app).await?;

    Ok(())
}
