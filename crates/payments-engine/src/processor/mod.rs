//! Payment Processor Integration
//!
//! Abstraction over the third-party processor that mints and confirms
//! intents. Card data never passes through this crate; the client confirms
//! directly against the processor using the client secret.

mod mock;
mod stripe_client;

pub use mock::MockProcessor;
pub use stripe_client::StripeProcessor;

use std::collections::HashMap;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::Result;
use crate::intent::{ClientSecret, Currency, IntentId, IntentState};

/// Processor client trait (Strategy pattern)
///
/// Implementations translate their transport failures into
/// `PaymentError::Processor`; callers never see raw transport errors.
#[async_trait]
pub trait PaymentProcessor: Send + Sync {
    /// Mint a new intent with automatic payment-method selection
    async fn create_intent(&self, request: &NewIntent) -> Result<ProcessorIntent>;

    /// Fetch the authoritative view of an intent
    async fn retrieve_intent(&self, id: &IntentId) -> Result<ProcessorIntent>;

    /// Cancel an intent that has not reached a terminal state
    async fn cancel_intent(&self, id: &IntentId) -> Result<ProcessorIntent>;

    /// Processor name
    fn name(&self) -> &str;
}

/// Validated request to mint an intent
#[derive(Clone, Debug)]
pub struct NewIntent {
    pub amount: i64,
    pub currency: Currency,
    pub description: String,
    pub metadata: HashMap<String, String>,

    /// Forwarded so the processor can deduplicate caller retries
    pub idempotency_key: Option<String>,
}

/// Intent as reported by the processor
#[derive(Clone, Debug)]
pub struct ProcessorIntent {
    pub id: IntentId,
    pub client_secret: Option<ClientSecret>,
    pub amount: i64,
    pub currency: String,
    pub description: Option<String>,
    pub metadata: HashMap<String, String>,
    pub status: ProcessorStatus,
}

/// Processor-side intent status
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessorStatus {
    RequiresPaymentMethod,
    RequiresConfirmation,
    RequiresAction,
    Processing,
    RequiresCapture,
    Canceled,
    Succeeded,
}

impl ProcessorStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ProcessorStatus::RequiresPaymentMethod => "requires_payment_method",
            ProcessorStatus::RequiresConfirmation => "requires_confirmation",
            ProcessorStatus::RequiresAction => "requires_action",
            ProcessorStatus::Processing => "processing",
            ProcessorStatus::RequiresCapture => "requires_capture",
            ProcessorStatus::Canceled => "canceled",
            ProcessorStatus::Succeeded => "succeeded",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "requires_payment_method" => Some(ProcessorStatus::RequiresPaymentMethod),
            "requires_confirmation" => Some(ProcessorStatus::RequiresConfirmation),
            "requires_action" => Some(ProcessorStatus::RequiresAction),
            "processing" => Some(ProcessorStatus::Processing),
            "requires_capture" => Some(ProcessorStatus::RequiresCapture),
            "canceled" => Some(ProcessorStatus::Canceled),
            "succeeded" => Some(ProcessorStatus::Succeeded),
            _ => None,
        }
    }

    /// Local state this status implies, if any.
    ///
    /// The processor has no distinct failed status (a failed attempt drops
    /// back to `requires_payment_method`), so failures only arrive by webhook.
    pub fn implied_state(self) -> Option<IntentState> {
        match self {
            ProcessorStatus::RequiresAction => Some(IntentState::RequiresAction),
            ProcessorStatus::Succeeded => Some(IntentState::Succeeded),
            ProcessorStatus::Canceled => Some(IntentState::Canceled),
            _ => None,
        }
    }
}

impl std::fmt::Display for ProcessorStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trip_and_mapping() {
        assert_eq!(ProcessorStatus::parse("requires_action"), Some(ProcessorStatus::RequiresAction));
        assert_eq!(ProcessorStatus::parse("bogus"), None);
        assert_eq!(ProcessorStatus::Succeeded.implied_state(), Some(IntentState::Succeeded));
        assert_eq!(ProcessorStatus::RequiresPaymentMethod.implied_state(), None);
    }
}
