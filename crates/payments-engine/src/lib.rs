//! # payments-engine
//!
//! Payment intent lifecycle and webhook reconciliation for rust-checkout.
//!
//! ## Flow
//!
//! ```text
//! ┌────────┐ create ┌──────────────┐ mint  ┌───────────┐
//! │ Client │───────▶│ Orchestrator │──────▶│ Processor │
//! └────────┘        └──────┬───────┘       └─────┬─────┘
//!     │ confirm (client    │ put                 │ webhook
//!     │ secret, card data) ▼                     ▼
//!     │              ┌─────────────┐      ┌────────────┐
//!     └─────────────▶│ Intent Store│◀─────│ Verifier + │
//!       (processor)  └─────────────┘      │ Reconciler │
//!                                         └────────────┘
//! ```
//!
//! Two independent signals settle an intent: status queries against the
//! processor and signed webhooks. Both go through the same per-id
//! transition, and terminal states absorb everything after them, so the
//! result does not depend on which signal lands first.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use payments_engine::{
//!     CreateIntentRequest, IntentOrchestrator, MemoryIntentStore, PaymentsConfig,
//!     SignatureVerifier, StripeProcessor, WebhookReconciler,
//! };
//!
//! let config = PaymentsConfig::from_env()?;
//! let processor = Arc::new(StripeProcessor::new(config.secret_key.as_ref().unwrap()));
//! let orchestrator = Arc::new(IntentOrchestrator::new(
//!     Arc::new(MemoryIntentStore::new()),
//!     processor,
//!     &config,
//! ));
//!
//! let created = orchestrator.create_intent(CreateIntentRequest::new(2999, "usd")).await?;
//! // Hand created.client_secret to the browser exactly once.
//!
//! let verifier = SignatureVerifier::new(config.webhook_secret, config.webhook_tolerance);
//! let reconciler = WebhookReconciler::new(orchestrator.clone());
//! let event = verifier.verify(&raw_body, &signature_header)?;
//! reconciler.reconcile(&event).await?;
//! ```

mod config;
mod error;
mod fulfillment;
mod intent;
mod orchestrator;
pub mod processor;
pub mod signature;
mod store;
mod webhook;

pub use config::{PaymentsConfig, DEFAULT_MIN_AMOUNT};
pub use error::{PaymentError, Result};
pub use fulfillment::{FulfillmentHook, LogFulfillment};
pub use intent::{
    AmountInput, ClientSecret, Currency, IntentId, IntentState, IntentStatus, PaymentIntent,
    Transition,
};
pub use orchestrator::{CreateIntentRequest, CreatedIntent, IntentOrchestrator};
pub use processor::{MockProcessor, PaymentProcessor, ProcessorStatus, StripeProcessor};
pub use signature::{SignatureVerifier, SIGNATURE_HEADER};
pub use store::{IntentStore, MemoryIntentStore};
pub use webhook::{target_state, Ack, IntentObject, ReconcileOutcome, WebhookEvent, WebhookReconciler};
