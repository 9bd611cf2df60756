//! Intent Orchestration
//!
//! Validates purchase requests, mints intents with the processor, answers
//! status lookups, and is the single entry point for state transitions.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Deserialize;

use crate::config::PaymentsConfig;
use crate::error::{PaymentError, Result};
use crate::fulfillment::{FulfillmentHook, LogFulfillment};
use crate::intent::{
    AmountInput, ClientSecret, Currency, IntentId, IntentState, IntentStatus, PaymentIntent,
    Transition,
};
use crate::processor::{NewIntent, PaymentProcessor};
use crate::store::IntentStore;

/// Description sent to the processor when the caller gives none
const DEFAULT_DESCRIPTION: &str = "Payment";

/// Request to create a payment intent
#[derive(Clone, Debug, Default, Deserialize)]
pub struct CreateIntentRequest {
    /// Amount in minor units (validated against the configured minimum)
    pub amount: Option<AmountInput>,

    /// ISO 4217 code; the configured default when omitted
    #[serde(default)]
    pub currency: Option<String>,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub metadata: Option<HashMap<String, String>>,

    /// Caller-chosen key for safe retries
    #[serde(default)]
    pub idempotency_key: Option<String>,
}

impl CreateIntentRequest {
    /// Convenience constructor for a whole-unit amount in `currency`
    pub fn new(amount: i64, currency: impl Into<String>) -> Self {
        Self {
            amount: Some(AmountInput::Integer(amount)),
            currency: Some(currency.into()),
            ..Default::default()
        }
    }
}

/// Result of a successful creation.
///
/// Deliberately not `Clone`: this is the only place the client secret is
/// ever handed out.
#[derive(Debug)]
pub struct CreatedIntent {
    pub id: IntentId,
    pub client_secret: ClientSecret,
}

/// Coordinates the store, the processor, and fulfillment hooks
pub struct IntentOrchestrator<S: IntentStore> {
    store: Arc<S>,
    processor: Arc<dyn PaymentProcessor>,
    hook: Arc<dyn FulfillmentHook>,
    min_amount: i64,
    default_currency: String,
    timeout: Duration,
    refresh_status: bool,
}

impl<S: IntentStore> IntentOrchestrator<S> {
    pub fn new(store: Arc<S>, processor: Arc<dyn PaymentProcessor>, config: &PaymentsConfig) -> Self {
        Self {
            store,
            processor,
            hook: Arc::new(LogFulfillment),
            min_amount: config.min_amount,
            default_currency: config.default_currency.clone(),
            timeout: config.processor_timeout,
            refresh_status: config.refresh_status,
        }
    }

    /// Replace the fulfillment hook
    #[must_use]
    pub fn with_hook(mut self, hook: Arc<dyn FulfillmentHook>) -> Self {
        self.hook = hook;
        self
    }

    /// Underlying store
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Name of the configured processor
    pub fn processor_name(&self) -> &str {
        self.processor.name()
    }

    /// Create a payment intent.
    ///
    /// Validation happens before any network call. Nothing is stored unless
    /// the processor returned both an id and a client secret.
    pub async fn create_intent(&self, request: CreateIntentRequest) -> Result<CreatedIntent> {
        let amount = AmountInput::to_minor_units(request.amount.as_ref(), self.min_amount)?;
        let currency = Currency::parse(request.currency.as_deref(), &self.default_currency)?;
        let description = request.description.filter(|d| !d.trim().is_empty());
        let metadata = request.metadata.unwrap_or_default();

        let new_intent = NewIntent {
            amount,
            currency: currency.clone(),
            description: description.clone().unwrap_or_else(|| DEFAULT_DESCRIPTION.into()),
            metadata: metadata.clone(),
            idempotency_key: request.idempotency_key,
        };

        // No lock is held across the processor round trip
        let minted = self.call(self.processor.create_intent(&new_intent)).await?;

        let client_secret = minted.client_secret.ok_or_else(|| {
            PaymentError::Processor("Processor returned no client secret".into())
        })?;

        let state = match minted.status.implied_state() {
            Some(IntentState::RequiresAction) => IntentState::RequiresAction,
            _ => IntentState::Created,
        };

        let now = Utc::now();
        let existing = self.store.put(PaymentIntent {
            id: minted.id.clone(),
            amount,
            currency: currency.clone(),
            description,
            metadata,
            state,
            client_secret: client_secret.clone(),
            created_at: now,
            updated_at: now,
        })?;

        // The client secret goes out once; a repeat of a known id gets nothing
        if let Some(existing) = existing {
            tracing::warn!(
                intent_id = %existing.id,
                state = %existing.state,
                "Processor returned an already tracked intent; record kept"
            );
            return Err(PaymentError::Duplicate(existing.id.to_string()));
        }

        tracing::info!(
            intent_id = %minted.id,
            amount = amount,
            currency = %currency,
            state = %state,
            "Created payment intent"
        );

        Ok(CreatedIntent {
            id: minted.id,
            client_secret,
        })
    }

    /// Look up an intent's status, reconciling drift with the processor.
    ///
    /// Unknown ids fail with `NotFound` without an outbound call.
    pub async fn get_status(&self, id: &IntentId) -> Result<IntentStatus> {
        let local = self
            .store
            .get(id)?
            .ok_or_else(|| PaymentError::NotFound(id.to_string()))?;

        if !self.refresh_status {
            return Ok(local.status());
        }

        let remote = self.call(self.processor.retrieve_intent(id)).await?;

        let record = match remote.status.implied_state() {
            Some(target) if target != local.state => self
                .apply_transition(id, target)
                .await?
                .map_or(local, |(intent, _)| intent),
            _ => local,
        };

        let mut status = record.status();
        status.processor_status = Some(remote.status.as_str().to_string());
        Ok(status)
    }

    /// Cancel an intent. Terminal intents are returned unchanged.
    pub async fn cancel_intent(&self, id: &IntentId) -> Result<IntentStatus> {
        let local = self
            .store
            .get(id)?
            .ok_or_else(|| PaymentError::NotFound(id.to_string()))?;

        if local.state.is_terminal() {
            tracing::debug!(intent_id = %id, state = %local.state, "Cancel ignored for settled intent");
            return Ok(local.status());
        }

        let remote = self.call(self.processor.cancel_intent(id)).await?;

        let record = self
            .apply_transition(id, IntentState::Canceled)
            .await?
            .map_or(local, |(intent, _)| intent);

        let mut status = record.status();
        status.processor_status = Some(remote.status.as_str().to_string());
        Ok(status)
    }

    /// Local record, if known
    pub fn get(&self, id: &IntentId) -> Result<Option<PaymentIntent>> {
        self.store.get(id)
    }

    /// Apply a transition through the store's per-id serialisation.
    ///
    /// Fulfillment hooks run only when this call is the one that settled the
    /// intent.
    pub async fn apply_transition(
        &self,
        id: &IntentId,
        target: IntentState,
    ) -> Result<Option<(PaymentIntent, Transition)>> {
        let Some((intent, transition)) = self.store.transition(id, target)? else {
            return Ok(None);
        };

        if transition.applied {
            tracing::info!(
                intent_id = %id,
                from = %transition.from,
                to = %transition.to,
                "Payment intent transitioned"
            );

            match transition.to {
                IntentState::Succeeded => self.hook.on_succeeded(&intent).await,
                IntentState::Failed => self.hook.on_failed(&intent).await,
                _ => {}
            }
        } else {
            tracing::debug!(
                intent_id = %id,
                state = %transition.from,
                requested = %target,
                "Transition not applied"
            );
        }

        Ok(Some((intent, transition)))
    }

    /// Bound an outbound call by the configured timeout
    async fn call<T>(&self, request: impl Future<Output = Result<T>>) -> Result<T> {
        tokio::time::timeout(self.timeout, request)
            .await
            .map_err(|_| PaymentError::Processor("Processor request timed out".into()))?
    }
}
