//! Webhook Reconciliation
//!
//! Applies verified processor events to local intent state. Every event is
//! acknowledged so the processor stops retrying; only verification failures
//! (handled upstream in [`crate::signature`]) are rejected.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::intent::{IntentId, IntentState};
use crate::orchestrator::IntentOrchestrator;
use crate::store::IntentStore;

/// Processor event types that drive a transition.
///
/// Anything not listed is acknowledged and ignored, so new processor event
/// types need no code change beyond this table.
pub const EVENT_TRANSITIONS: &[(&str, IntentState)] = &[
    ("payment_intent.succeeded", IntentState::Succeeded),
    ("payment_intent.payment_failed", IntentState::Failed),
    ("payment_intent.requires_action", IntentState::RequiresAction),
];

/// Target state for an event type, if it is one we act on
pub fn target_state(event_type: &str) -> Option<IntentState> {
    EVENT_TRANSITIONS
        .iter()
        .find(|(name, _)| *name == event_type)
        .map(|(_, state)| *state)
}

/// Verified webhook event.
///
/// Only [`crate::signature::SignatureVerifier`] can construct one.
#[derive(Clone, Debug)]
pub struct WebhookEvent {
    id: String,
    event_type: String,

    /// Kept raw: only intent events are interpreted further
    object: serde_json::Value,
}

/// Wire shape of an event body
#[derive(Deserialize)]
struct RawEvent {
    id: String,

    #[serde(rename = "type")]
    event_type: String,

    data: RawEventData,
}

#[derive(Deserialize)]
struct RawEventData {
    object: serde_json::Value,
}

/// The intent embedded in a `payment_intent.*` event
#[derive(Clone, Debug, Deserialize)]
pub struct IntentObject {
    pub id: IntentId,

    #[serde(default)]
    pub amount: Option<i64>,

    #[serde(default)]
    pub currency: Option<String>,

    #[serde(default)]
    pub metadata: Option<HashMap<String, String>>,

    #[serde(default)]
    pub status: Option<String>,
}

impl WebhookEvent {
    /// Parse an already-authenticated body
    pub(crate) fn from_verified_slice(payload: &[u8]) -> serde_json::Result<Self> {
        let raw: RawEvent = serde_json::from_slice(payload)?;

        Ok(Self {
            id: raw.id,
            event_type: raw.event_type,
            object: raw.data.object,
        })
    }

    /// Processor event id
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    /// Embedded object interpreted as a payment intent, if it is one
    pub fn intent_object(&self) -> Option<IntentObject> {
        IntentObject::deserialize(&self.object).ok()
    }
}

/// What reconciling an event did
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// The intent moved `from -> to`
    Applied {
        intent_id: IntentId,
        from: IntentState,
        to: IntentState,
    },

    /// Duplicate, out-of-order, or absorbed by a terminal state
    Unchanged {
        intent_id: IntentId,
        state: IntentState,
    },

    /// No local record; never fabricated into a new intent
    UnknownIntent { intent_id: IntentId },

    /// Amount or currency disagrees with the local record
    Mismatch { intent_id: IntentId },

    /// Event type we do not act on
    Ignored { event_type: String },
}

/// Acknowledgement returned to the transport layer
#[derive(Clone, Debug, Serialize)]
pub struct Ack {
    pub received: bool,

    #[serde(skip)]
    pub outcome: ReconcileOutcome,
}

impl Ack {
    fn new(outcome: ReconcileOutcome) -> Self {
        Self {
            received: true,
            outcome,
        }
    }
}

/// Webhook reconciler
pub struct WebhookReconciler<S: IntentStore> {
    orchestrator: Arc<IntentOrchestrator<S>>,
}

impl<S: IntentStore> WebhookReconciler<S> {
    pub fn new(orchestrator: Arc<IntentOrchestrator<S>>) -> Self {
        Self { orchestrator }
    }

    /// Reconcile a verified event. Idempotent: replays leave state as the
    /// first delivery left it.
    pub async fn reconcile(&self, event: &WebhookEvent) -> Result<Ack> {
        tracing::info!(event_id = %event.id(), event_type = %event.event_type(), "Processing webhook");

        let Some(target) = target_state(event.event_type()) else {
            tracing::debug!(event_type = %event.event_type(), "Unhandled event type");
            return Ok(Ack::new(ReconcileOutcome::Ignored {
                event_type: event.event_type().to_string(),
            }));
        };

        let Some(object) = event.intent_object() else {
            tracing::warn!(event_id = %event.id(), "Event carries no payment intent object");
            return Ok(Ack::new(ReconcileOutcome::Ignored {
                event_type: event.event_type().to_string(),
            }));
        };

        let Some(local) = self.orchestrator.get(&object.id)? else {
            tracing::info!(intent_id = %object.id, "Webhook for unknown payment intent");
            return Ok(Ack::new(ReconcileOutcome::UnknownIntent { intent_id: object.id }));
        };

        let amount_differs = object.amount.is_some_and(|a| a != local.amount);
        let currency_differs = object
            .currency
            .as_deref()
            .is_some_and(|c| !c.eq_ignore_ascii_case(local.currency.as_str()));
        if amount_differs || currency_differs {
            tracing::warn!(
                intent_id = %object.id,
                event_amount = ?object.amount,
                local_amount = local.amount,
                "Webhook payload disagrees with local intent; not applied"
            );
            return Ok(Ack::new(ReconcileOutcome::Mismatch { intent_id: object.id }));
        }

        let outcome = match self.orchestrator.apply_transition(&object.id, target).await? {
            Some((_, transition)) if transition.applied => ReconcileOutcome::Applied {
                intent_id: object.id,
                from: transition.from,
                to: transition.to,
            },
            Some((intent, _)) => ReconcileOutcome::Unchanged {
                intent_id: object.id,
                state: intent.state,
            },
            None => ReconcileOutcome::UnknownIntent { intent_id: object.id },
        };

        Ok(Ack::new(outcome))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PaymentsConfig;
    use crate::orchestrator::CreateIntentRequest;
    use crate::processor::MockProcessor;
    use crate::store::MemoryIntentStore;
    use serde_json::json;

    fn event(event_type: &str, intent_id: &str, amount: i64) -> WebhookEvent {
        let body = json!({
            "id": "evt_test",
            "type": event_type,
            "created": 1_700_000_000,
            "data": { "object": {
                "id": intent_id,
                "object": "payment_intent",
                "amount": amount,
                "currency": "usd",
                "metadata": {}
            }}
        });
        WebhookEvent::from_verified_slice(body.to_string().as_bytes()).unwrap()
    }

    async fn setup() -> (WebhookReconciler<MemoryIntentStore>, IntentId) {
        let orchestrator = Arc::new(IntentOrchestrator::new(
            Arc::new(MemoryIntentStore::new()),
            Arc::new(MockProcessor::new()),
            &PaymentsConfig::default(),
        ));
        let created = orchestrator
            .create_intent(CreateIntentRequest::new(2999, "usd"))
            .await
            .unwrap();
        (WebhookReconciler::new(orchestrator), created.id)
    }

    #[test]
    fn test_event_mapping() {
        assert_eq!(target_state("payment_intent.succeeded"), Some(IntentState::Succeeded));
        assert_eq!(target_state("payment_intent.payment_failed"), Some(IntentState::Failed));
        assert_eq!(target_state("charge.refunded"), None);
    }

    #[tokio::test]
    async fn test_succeeded_event_applies() {
        let (reconciler, id) = setup().await;

        let ack = reconciler
            .reconcile(&event("payment_intent.succeeded", id.as_str(), 2999))
            .await
            .unwrap();

        assert!(ack.received);
        assert_eq!(
            ack.outcome,
            ReconcileOutcome::Applied {
                intent_id: id,
                from: IntentState::Created,
                to: IntentState::Succeeded,
            }
        );
    }

    #[tokio::test]
    async fn test_duplicate_event_is_idempotent() {
        let (reconciler, id) = setup().await;
        let evt = event("payment_intent.payment_failed", id.as_str(), 2999);

        reconciler.reconcile(&evt).await.unwrap();
        let ack = reconciler.reconcile(&evt).await.unwrap();

        assert_eq!(
            ack.outcome,
            ReconcileOutcome::Unchanged {
                intent_id: id,
                state: IntentState::Failed,
            }
        );
    }

    #[tokio::test]
    async fn test_unknown_intent_is_acknowledged() {
        let (reconciler, _) = setup().await;

        let ack = reconciler
            .reconcile(&event("payment_intent.succeeded", "pi_elsewhere", 2999))
            .await
            .unwrap();

        assert!(ack.received);
        assert!(matches!(ack.outcome, ReconcileOutcome::UnknownIntent { .. }));
        assert!(reconciler
            .orchestrator
            .get(&IntentId::new("pi_elsewhere"))
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_unrecognised_event_type_is_acknowledged() {
        let (reconciler, id) = setup().await;

        let ack = reconciler
            .reconcile(&event("payment_intent.created", id.as_str(), 2999))
            .await
            .unwrap();

        assert!(ack.received);
        assert!(matches!(ack.outcome, ReconcileOutcome::Ignored { .. }));
    }

    #[tokio::test]
    async fn test_non_intent_object_is_ignored() {
        let (reconciler, _) = setup().await;
        let body = json!({
            "id": "evt_balance",
            "type": "payment_intent.succeeded",
            "data": { "object": { "object": "balance", "available": [] } }
        });
        let evt = WebhookEvent::from_verified_slice(body.to_string().as_bytes()).unwrap();

        let ack = reconciler.reconcile(&evt).await.unwrap();
        assert!(matches!(ack.outcome, ReconcileOutcome::Ignored { .. }));
    }

    #[tokio::test]
    async fn test_amount_mismatch_not_applied() {
        let (reconciler, id) = setup().await;

        let ack = reconciler
            .reconcile(&event("payment_intent.succeeded", id.as_str(), 1))
            .await
            .unwrap();

        assert!(matches!(ack.outcome, ReconcileOutcome::Mismatch { .. }));
        let local = reconciler.orchestrator.get(&id).unwrap().unwrap();
        assert_eq!(local.state, IntentState::Created);
    }

    #[test]
    fn test_event_parsed_from_wire_shape() {
        let evt = event("payment_intent.succeeded", "pi_1", 2999);
        assert_eq!(evt.id(), "evt_test");
        assert_eq!(evt.event_type(), "payment_intent.succeeded");
        assert_eq!(evt.intent_object().unwrap().amount, Some(2999));

        let missing_data = json!({ "id": "evt_1", "type": "payment_intent.succeeded" });
        assert!(WebhookEvent::from_verified_slice(missing_data.to_string().as_bytes()).is_err());
    }

    #[test]
    fn test_ack_serialises_received_only() {
        let ack = Ack::new(ReconcileOutcome::Ignored {
            event_type: "x".into(),
        });
        assert_eq!(serde_json::to_value(&ack).unwrap(), json!({ "received": true }));
    }
}
