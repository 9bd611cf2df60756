//! HTTP Handlers

use std::collections::HashMap;

use axum::{
    body::Bytes,
    extract::{rejection::JsonRejection, Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use serde::{Deserialize, Serialize};

use payments_engine::{
    Ack, AmountInput, CreateIntentRequest, IntentId, IntentStatus, PaymentError, SIGNATURE_HEADER,
};

use crate::catalog::{Product, PRODUCTS};
use crate::state::{AppState, Payments};

// ============================================================================
// Request / Response Types
// ============================================================================

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub timestamp: String,
    pub version: &'static str,
    pub processor: Option<String>,
}

#[derive(Serialize)]
pub struct ReadinessResponse {
    pub status: &'static str,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigResponse {
    pub publishable_key: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateIntentBody {
    /// Kept loose so a non-numeric amount is an amount error, not a parse error
    #[serde(default)]
    pub amount: Option<serde_json::Value>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub metadata: Option<HashMap<String, String>>,
    #[serde(default)]
    pub idempotency_key: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateIntentResponse {
    pub client_secret: String,
    pub payment_intent_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub id: String,
    pub status: &'static str,
    pub processor_status: Option<String>,
    pub amount: i64,
    pub currency: String,
    pub description: Option<String>,
    pub metadata: HashMap<String, String>,
}

impl From<IntentStatus> for StatusResponse {
    fn from(status: IntentStatus) -> Self {
        Self {
            id: status.id.to_string(),
            status: status.state.as_str(),
            processor_status: status.processor_status,
            amount: status.amount,
            currency: status.currency.to_string(),
            description: status.description,
            metadata: status.metadata,
        }
    }
}

#[derive(Serialize)]
pub struct ProductsResponse {
    pub products: &'static [Product],
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn error_response(err: &PaymentError) -> ApiError {
    let (status, code) = match err {
        PaymentError::InvalidAmount(_) => (StatusCode::BAD_REQUEST, "INVALID_AMOUNT"),
        PaymentError::InvalidCurrency(_) => (StatusCode::BAD_REQUEST, "INVALID_CURRENCY"),
        PaymentError::Processor(_) => (StatusCode::INTERNAL_SERVER_ERROR, "PROCESSOR_ERROR"),
        PaymentError::Verification => (StatusCode::BAD_REQUEST, "INVALID_SIGNATURE"),
        PaymentError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
        PaymentError::Duplicate(_) => (StatusCode::CONFLICT, "DUPLICATE_INTENT"),
        PaymentError::Config(_) => (StatusCode::SERVICE_UNAVAILABLE, "CONFIG_ERROR"),
        PaymentError::Storage(_) => (StatusCode::INTERNAL_SERVER_ERROR, "STORAGE_ERROR"),
    };

    (
        status,
        Json(ErrorResponse {
            error: err.user_message(),
            code: code.into(),
        }),
    )
}

fn payments(state: &AppState) -> Result<&Payments, ApiError> {
    state.payments.as_deref().ok_or_else(|| {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ErrorResponse {
                error: "Payments not configured".into(),
                code: "PAYMENTS_DISABLED".into(),
            }),
        )
    })
}

// ============================================================================
// Handlers
// ============================================================================

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        timestamp: chrono::Utc::now().to_rfc3339(),
        version: env!("CARGO_PKG_VERSION"),
        processor: state
            .payments
            .as_ref()
            .map(|p| p.orchestrator.processor_name().to_string()),
    })
}

/// Readiness probe
pub async fn readiness() -> Json<ReadinessResponse> {
    Json(ReadinessResponse { status: "ready" })
}

/// Public key for the client-side processor SDK
pub async fn get_config(State(state): State<AppState>) -> Json<ConfigResponse> {
    Json(ConfigResponse {
        publishable_key: state.publishable_key.clone(),
    })
}

/// Static product list
pub async fn list_products() -> Json<ProductsResponse> {
    Json(ProductsResponse { products: PRODUCTS })
}

/// Create a payment intent
pub async fn create_payment_intent(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<CreateIntentBody>, JsonRejection>,
) -> Result<Json<CreateIntentResponse>, ApiError> {
    let payments = payments(&state)?;

    let Json(body) = payload.map_err(|e| {
        (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: e.body_text(),
                code: "INVALID_REQUEST".into(),
            }),
        )
    })?;

    let idempotency_key = body.idempotency_key.or_else(|| {
        headers
            .get("idempotency-key")
            .and_then(|v| v.to_str().ok())
            .map(String::from)
    });

    let request = CreateIntentRequest {
        amount: body
            .amount
            .and_then(|v| serde_json::from_value::<AmountInput>(v).ok()),
        currency: body.currency,
        description: body.description,
        metadata: body.metadata,
        idempotency_key,
    };

    let created = payments
        .orchestrator
        .create_intent(request)
        .await
        .map_err(|e| {
            match &e {
                PaymentError::Processor(_) | PaymentError::Storage(_) => {
                    tracing::error!("Payment intent creation error: {}", e);
                }
                _ => tracing::debug!("Rejected payment intent request: {}", e),
            }
            error_response(&e)
        })?;

    Ok(Json(CreateIntentResponse {
        client_secret: created.client_secret.expose().to_string(),
        payment_intent_id: created.id.to_string(),
    }))
}

/// Payment status lookup
pub async fn payment_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<StatusResponse>, ApiError> {
    let payments = payments(&state)?;

    let status = payments
        .orchestrator
        .get_status(&IntentId::new(id))
        .await
        .map_err(|e| {
            if !matches!(e, PaymentError::NotFound(_)) {
                tracing::error!("Payment status retrieval error: {}", e);
            }
            error_response(&e)
        })?;

    Ok(Json(status.into()))
}

/// Cancel a payment intent
pub async fn cancel_payment_intent(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<StatusResponse>, ApiError> {
    let payments = payments(&state)?;

    let status = payments
        .orchestrator
        .cancel_intent(&IntentId::new(id))
        .await
        .map_err(|e| {
            tracing::warn!("Payment cancellation error: {}", e);
            error_response(&e)
        })?;

    Ok(Json(status.into()))
}

/// Processor webhook.
///
/// Takes the body as raw bytes: it must be verified exactly as received.
pub async fn webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Ack>, ApiError> {
    // A missing header fails verification like any other bad signature
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    // Verified before anything else, including the payments check
    let event = state
        .verifier
        .verify(&body, signature)
        .map_err(|e| error_response(&e))?;

    let payments = payments(&state)?;

    let ack = payments.reconciler.reconcile(&event).await.map_err(|e| {
        tracing::error!("Webhook processing error: {}", e);
        error_response(&e)
    })?;

    Ok(Json(ack))
}
