//! Application State

use std::sync::Arc;

use payments_engine::{IntentOrchestrator, MemoryIntentStore, SignatureVerifier, WebhookReconciler};

/// Payment services, present only when a processor is configured
pub struct Payments {
    pub orchestrator: Arc<IntentOrchestrator<MemoryIntentStore>>,
    pub reconciler: WebhookReconciler<MemoryIntentStore>,
}

impl Payments {
    pub fn new(orchestrator: Arc<IntentOrchestrator<MemoryIntentStore>>) -> Self {
        Self {
            reconciler: WebhookReconciler::new(orchestrator.clone()),
            orchestrator,
        }
    }
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Payment services (None if no processor is configured)
    pub payments: Option<Arc<Payments>>,

    /// Webhook signature verifier (rejects everything without a secret)
    pub verifier: Arc<SignatureVerifier>,

    /// Public key served to the client
    pub publishable_key: Option<String>,
}
