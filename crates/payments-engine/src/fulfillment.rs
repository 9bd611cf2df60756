//! Fulfillment Hooks
//!
//! Business reactions to an intent settling. A hook fires only for the call
//! that actually moved the intent into `Succeeded` or `Failed`, so retried
//! webhooks and status polls never fulfil an order twice.

use async_trait::async_trait;

use crate::intent::PaymentIntent;

/// Reaction to an intent reaching a terminal outcome
#[async_trait]
pub trait FulfillmentHook: Send + Sync {
    /// Payment captured: fulfil the order, send a receipt, etc.
    async fn on_succeeded(&self, intent: &PaymentIntent);

    /// Payment failed: notify the customer, release held stock, etc.
    async fn on_failed(&self, intent: &PaymentIntent);
}

/// Default hook: records the outcome in the log
#[derive(Clone, Copy, Debug, Default)]
pub struct LogFulfillment;

#[async_trait]
impl FulfillmentHook for LogFulfillment {
    async fn on_succeeded(&self, intent: &PaymentIntent) {
        tracing::info!(
            intent_id = %intent.id,
            amount = intent.amount,
            currency = %intent.currency,
            "PaymentIntent was successful"
        );
    }

    async fn on_failed(&self, intent: &PaymentIntent) {
        tracing::warn!(
            intent_id = %intent.id,
            amount = intent.amount,
            currency = %intent.currency,
            "PaymentIntent failed"
        );
    }
}
