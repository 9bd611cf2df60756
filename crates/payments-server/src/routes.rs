//! Router

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::handlers::{
    cancel_payment_intent, create_payment_intent, get_config, health_check, list_products,
    payment_status, readiness, webhook,
};
use crate::state::AppState;

/// Build the application router
pub fn router(state: AppState) -> Router {
    Router::new()
        // Health & info
        .route("/health", get(health_check))
        .route("/readiness", get(readiness))
        .route("/api/config", get(get_config))
        .route("/api/products", get(list_products))

        // Payments
        .route("/api/create-payment-intent", post(create_payment_intent))
        .route("/api/payment-status/{id}", get(payment_status))
        .route("/api/payment-intents/{id}/cancel", post(cancel_payment_intent))
        .route("/api/webhook", post(webhook))

        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
