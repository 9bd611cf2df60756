//! rust-checkout HTTP Server
//!
//! Axum-based server exposing payment intent creation, status lookups and
//! the processor webhook. Card data never reaches this server; the browser
//! confirms payments directly with the processor.

mod catalog;
mod handlers;
mod routes;
mod state;

use std::sync::Arc;

use axum::http::HeaderValue;
use tower_http::cors::{Any, CorsLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use payments_engine::{
    IntentOrchestrator, MemoryIntentStore, MockProcessor, PaymentProcessor, PaymentsConfig,
    SignatureVerifier, StripeProcessor,
};

use crate::state::{AppState, Payments};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load environment
    dotenvy::dotenv().ok();

    let config = PaymentsConfig::from_env()?;
    config.validate()?;

    // Initialize processor
    let processor: Option<Arc<dyn PaymentProcessor>> = match &config.secret_key {
        Some(key) => {
            tracing::info!(test_mode = config.is_test_mode(), "✓ Stripe configured");
            Some(Arc::new(StripeProcessor::new(key)))
        }
        None if std::env::var("PAYMENTS_MOCK_PROCESSOR").is_ok_and(|v| v == "1") => {
            tracing::warn!("⚠ Using in-memory mock processor - no real charges");
            Some(Arc::new(MockProcessor::new()))
        }
        None => {
            tracing::warn!("⚠ Stripe not configured - payments disabled");
            tracing::warn!("  Set STRIPE_SECRET_KEY and STRIPE_WEBHOOK_SECRET in .env");
            None
        }
    };

    if config.webhook_secret.is_none() {
        tracing::warn!("⚠ STRIPE_WEBHOOK_SECRET not set - all webhooks will be rejected");
    }

    let payments = processor.map(|processor| {
        let orchestrator = IntentOrchestrator::new(
            Arc::new(MemoryIntentStore::new()),
            processor,
            &config,
        );
        Arc::new(Payments::new(Arc::new(orchestrator)))
    });

    // Build application state
    let state = AppState {
        payments,
        publishable_key: config.publishable_key.clone(),
        verifier: Arc::new(SignatureVerifier::new(
            config.webhook_secret,
            config.webhook_tolerance,
        )),
    };

    // CORS configuration
    let cors = match std::env::var("FRONTEND_URL") {
        Ok(origin) => CorsLayer::new()
            .allow_origin(origin.parse::<HeaderValue>()?)
            .allow_methods(Any)
            .allow_headers(Any),
        Err(_) => CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any),
    };

    let app = routes::router(state).layer(cors);

    // Start server
    let addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".into());
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("🚀 rust-checkout server running on http://{}", addr);
    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("");
    tracing::info!("Endpoints:");
    tracing::info!("  GET  /health                          - Health check");
    tracing::info!("  GET  /api/config                      - Publishable key");
    tracing::info!("  GET  /api/products                    - Product catalog");
    tracing::info!("  POST /api/create-payment-intent       - Create payment intent");
    tracing::info!("  GET  /api/payment-status/{{id}}         - Payment status");
    tracing::info!("  POST /api/payment-intents/{{id}}/cancel - Cancel payment intent");
    tracing::info!("  POST /api/webhook                     - Stripe webhook");
    tracing::info!("");

    axum::serve(listener, app).await?;

    Ok(())
}
